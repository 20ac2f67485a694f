//! REST vs SOAP response shaping, decided once per stub

use std::collections::BTreeMap;

use stubmatch_core::{
    ContentType, MatchedResponse, MismatchKind, MismatchReport, Protocol, Rejection,
    StubDefinition,
};

use crate::soap::{self, SoapError};

/// Fault string served for SOAP content mismatches; the diff goes to audit.
const SOAP_NO_MATCH: &str = "Request does not match any configured record";

/// How a stub's outcomes are rendered for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ResponseShape {
    Rest,
    Soap,
}

impl ResponseShape {
    pub(super) fn of(stub: &StubDefinition) -> Self {
        match stub.protocol {
            Protocol::Rest => Self::Rest,
            Protocol::Soap => Self::Soap,
        }
    }

    /// Served response for a matched stub.
    pub(super) fn matched(
        self,
        stub: &StubDefinition,
        soap_headers: Option<BTreeMap<String, String>>,
    ) -> MatchedResponse {
        let (body, content_type) = match self {
            Self::Rest => (
                stub.response_body.clone(),
                ContentType::infer(&stub.response_body),
            ),
            Self::Soap => {
                let headers = soap_headers.clone().unwrap_or_default();
                (
                    soap::wrap_response(&stub.response_body, &headers),
                    ContentType::SoapXml,
                )
            }
        };

        MatchedResponse {
            stub: stub.clone(),
            body,
            status: stub.status_code,
            content_type,
            soap_headers,
        }
    }

    /// Rejection for a header/body mismatch.
    pub(super) fn content_mismatch(
        self,
        stub: &StubDefinition,
        report: MismatchReport,
    ) -> Rejection {
        let rejection = Rejection::new(
            MismatchKind::ContentMismatch,
            MismatchKind::ContentMismatch.reason(),
        )
        .with_report(report)
        .with_stub(stub.clone());

        match self {
            Self::Rest => rejection,
            Self::Soap => {
                let fault = soap::build_fault(rejection.status, SOAP_NO_MATCH, rejection.reason());
                rejection.with_soap_fault(fault)
            }
        }
    }

    /// Rejection for a failed envelope unwrap; always a SOAP Fault.
    pub(super) fn envelope_error(stub: &StubDefinition, err: &SoapError) -> Rejection {
        let kind = if err.is_internal() {
            MismatchKind::InternalError
        } else {
            MismatchKind::SoapEnvelopeError
        };
        let status = err.status();
        let message = err.to_string();
        let fault = soap::build_fault(status, &message, kind.reason());

        Rejection::new(kind, message)
            .with_status(status)
            .with_soap_fault(fault)
            .with_stub(stub.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_content_type_follows_response_body() {
        let stub = StubDefinition::new("GET", "ping").with_response(201, "<pong/>");
        let matched = ResponseShape::of(&stub).matched(&stub, None);
        assert_eq!(matched.status, 201);
        assert_eq!(matched.content_type, ContentType::Xml);
        assert_eq!(matched.body, "<pong/>");
    }

    #[test]
    fn soap_response_is_wrapped() {
        let stub = StubDefinition::new("POST", "svc")
            .with_protocol(Protocol::Soap)
            .with_response(200, "<pong/>");
        let matched = ResponseShape::of(&stub).matched(&stub, Some(BTreeMap::new()));
        assert_eq!(matched.content_type, ContentType::SoapXml);
        assert!(matched.body.starts_with("<soapenv:Envelope"));
        assert!(matched.body.contains("<pong/>"));
    }

    #[test]
    fn soap_content_mismatch_is_fault_with_400() {
        let stub = StubDefinition::new("POST", "svc").with_protocol(Protocol::Soap);
        let rejection = ResponseShape::Soap.content_mismatch(&stub, MismatchReport::default());
        assert_eq!(rejection.status, 400);
        assert!(rejection.soap_fault.as_deref().is_some_and(|f| f.contains(SOAP_NO_MATCH)));
        assert!(rejection.report.is_some());
    }

    #[test]
    fn envelope_errors_map_status() {
        let stub = StubDefinition::new("POST", "svc");
        let bad = ResponseShape::envelope_error(&stub, &SoapError::InvalidCredentials);
        assert_eq!(bad.kind, MismatchKind::SoapEnvelopeError);
        assert_eq!(bad.status, 400);

        let internal = ResponseShape::envelope_error(&stub, &SoapError::Malformed("eof".into()));
        assert_eq!(internal.kind, MismatchKind::InternalError);
        assert_eq!(internal.status, 500);
        assert!(internal.soap_fault.is_some());
    }
}
