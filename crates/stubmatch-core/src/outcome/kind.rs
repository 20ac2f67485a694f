//! Failure taxonomy for unmatched requests
//!
//! The kind alone decides the HTTP status and the reason label recorded in
//! the audit log.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Why a request was not served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// No stub with this method + path (404)
    NotConfigured,
    /// Expected query parameter missing or different (400)
    QueryMismatch,
    /// Expected cookie missing or different (400)
    CookieMismatch,
    /// Body does not parse as its template's format (400)
    FormatInvalid,
    /// Header or body differs from the stub (400)
    ContentMismatch,
    /// Envelope missing/empty parts or WS-Security failure (400)
    SoapEnvelopeError,
    /// Unexpected failure while processing the payload (500)
    InternalError,
}

impl MismatchKind {
    /// HTTP status returned to the caller
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::NotConfigured => 404,
            Self::QueryMismatch
            | Self::CookieMismatch
            | Self::FormatInvalid
            | Self::ContentMismatch
            | Self::SoapEnvelopeError => 400,
            Self::InternalError => 500,
        }
    }

    /// Reason label recorded with the audit entry
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::NotConfigured => "API not configured",
            Self::QueryMismatch => "Missing/Invalid query parameters",
            Self::CookieMismatch => "Missing/Invalid cookies",
            Self::FormatInvalid => "Request body format invalid",
            Self::ContentMismatch => "Request does not match template",
            Self::SoapEnvelopeError => "SOAP envelope rejected",
            Self::InternalError => "Internal error",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::QueryMismatch => "query_mismatch",
            Self::CookieMismatch => "cookie_mismatch",
            Self::FormatInvalid => "format_invalid",
            Self::ContentMismatch => "content_mismatch",
            Self::SoapEnvelopeError => "soap_envelope_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_stub_is_not_found() {
        assert_eq!(MismatchKind::NotConfigured.status(), 404);
        for kind in [
            MismatchKind::QueryMismatch,
            MismatchKind::CookieMismatch,
            MismatchKind::FormatInvalid,
            MismatchKind::ContentMismatch,
            MismatchKind::SoapEnvelopeError,
        ] {
            assert_eq!(kind.status(), 400, "{kind}");
        }
        assert_eq!(MismatchKind::InternalError.status(), 500);
    }

    #[test]
    fn serde_matches_display() {
        let json = serde_json::to_string(&MismatchKind::ContentMismatch).unwrap();
        assert_eq!(json, format!("\"{}\"", MismatchKind::ContentMismatch));
    }
}
