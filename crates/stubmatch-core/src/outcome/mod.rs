//! Outcome of resolving one request: the served stub or a rejection

mod kind;

use std::collections::BTreeMap;

use serde::Serialize;

pub use kind::MismatchKind;

use crate::body::BodyType;
use crate::report::MismatchReport;
use crate::stub::StubDefinition;

/// Content type of the body handed back to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Json,
    Xml,
    /// SOAP envelope or fault
    SoapXml,
    Text,
}

impl ContentType {
    /// Infer from the body's leading character (`{` JSON, `<` XML, else text).
    #[must_use]
    pub fn infer(body: &str) -> Self {
        match BodyType::classify(body) {
            BodyType::Json => Self::Json,
            BodyType::Xml => Self::Xml,
            BodyType::Text => Self::Text,
        }
    }

    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "application/xml",
            Self::SoapXml => "text/xml",
            Self::Text => "text/plain",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime())
    }
}

/// A request satisfied a stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedResponse {
    pub stub: StubDefinition,
    /// Response body, wrapped in an envelope for SOAP stubs
    pub body: String,
    pub status: u16,
    pub content_type: ContentType,
    /// Header elements extracted from the SOAP request, if any
    pub soap_headers: Option<BTreeMap<String, String>>,
}

/// A request was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: MismatchKind,
    pub status: u16,
    /// One-line explanation, e.g. `No matching API found for GET ping`
    pub message: String,
    /// Side-by-side diff, present for content mismatches
    pub report: Option<MismatchReport>,
    /// SOAP Fault document served instead of the plain diagnostic
    pub soap_fault: Option<String>,
    /// The closest stub, when lookup succeeded
    pub stub: Option<StubDefinition>,
}

impl Rejection {
    /// Rejection with the kind's default status.
    pub fn new(kind: MismatchKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: kind.status(),
            message: message.into(),
            report: None,
            soap_fault: None,
            stub: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_report(mut self, report: MismatchReport) -> Self {
        self.report = Some(report);
        self
    }

    #[must_use]
    pub fn with_soap_fault(mut self, fault: String) -> Self {
        self.soap_fault = Some(fault);
        self
    }

    #[must_use]
    pub fn with_stub(mut self, stub: StubDefinition) -> Self {
        self.stub = Some(stub);
        self
    }

    /// Reason label for audit records
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        self.kind.reason()
    }

    /// Diagnostic text: the full report when there is one, else the message.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match &self.report {
            Some(report) => report.render(),
            None => self.message.clone(),
        }
    }

    #[must_use]
    pub const fn is_soap_fault(&self) -> bool {
        self.soap_fault.is_some()
    }
}

/// Final result of resolving one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Matched(MatchedResponse),
    Unmatched(Rejection),
}

impl ValidationOutcome {
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Matched(m) => m.status,
            Self::Unmatched(r) => r.status,
        }
    }

    /// Body to send back; never empty for a rejection.
    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::Matched(m) => m.body.clone(),
            Self::Unmatched(r) => match &r.soap_fault {
                Some(fault) => fault.clone(),
                None => r.diagnostic(),
            },
        }
    }

    #[must_use]
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Matched(m) => m.content_type,
            Self::Unmatched(r) if r.is_soap_fault() => ContentType::SoapXml,
            Self::Unmatched(_) => ContentType::Text,
        }
    }

    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Matched(_) => None,
            Self::Unmatched(r) => Some(r),
        }
    }

    #[must_use]
    pub fn matched(&self) -> Option<&MatchedResponse> {
        match self {
            Self::Matched(m) => Some(m),
            Self::Unmatched(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_inferred_from_leading_char() {
        assert_eq!(ContentType::infer(" {\"ok\":true}"), ContentType::Json);
        assert_eq!(ContentType::infer("<pong/>"), ContentType::Xml);
        assert_eq!(ContentType::infer("pong"), ContentType::Text);
        assert_eq!(ContentType::SoapXml.mime(), "text/xml");
    }

    #[test]
    fn rejection_body_prefers_fault_then_report() {
        let plain = ValidationOutcome::Unmatched(Rejection::new(
            MismatchKind::NotConfigured,
            "No matching API found for GET x",
        ));
        assert_eq!(plain.status(), 404);
        assert_eq!(plain.body(), "No matching API found for GET x");
        assert_eq!(plain.content_type(), ContentType::Text);

        let fault = ValidationOutcome::Unmatched(
            Rejection::new(MismatchKind::SoapEnvelopeError, "Body not found")
                .with_soap_fault("<soapenv:Envelope/>".into()),
        );
        assert_eq!(fault.body(), "<soapenv:Envelope/>");
        assert_eq!(fault.content_type(), ContentType::SoapXml);
        assert!(fault.rejection().is_some_and(Rejection::is_soap_fault));
    }

    #[test]
    fn status_override() {
        let r = Rejection::new(MismatchKind::SoapEnvelopeError, "boom").with_status(500);
        assert_eq!(r.status, 500);
        assert_eq!(r.reason(), "SOAP envelope rejected");
    }
}
