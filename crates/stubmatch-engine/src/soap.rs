//! SOAP envelope handling
//!
//! Unwraps request envelopes (header map, WS-Security check, body payload),
//! builds SOAP Fault documents and wraps bare response fragments.

use std::collections::BTreeMap;

use quick_xml::escape::escape;
use roxmltree::Node;
use tracing::debug;

use stubmatch_core::WsSecurityCredentials;
use stubmatch_core::xml;

/// SOAP 1.1 envelope namespace, used for generated envelopes and faults
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Header element carrying the WS-Security `UsernameToken`
const SECURITY: &str = "Security";

/// What a successful unwrap extracts from a request envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoapContext {
    /// `Header` children: local name → trimmed text content
    pub headers: BTreeMap<String, String>,
    /// First element child of `Body`, re-serialized without declaration
    pub body: String,
    /// A `Security` header was present and its credentials accepted
    pub authenticated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SoapError {
    #[error("empty body")]
    EmptyBody,

    #[error("Body not found")]
    BodyNotFound,

    #[error("Body is empty")]
    BodyEmpty,

    #[error("Missing WS-Security header")]
    MissingSecurityHeader,

    #[error("Missing WS-Security Username or Password")]
    MissingCredentials,

    #[error("Invalid WS-Security credentials")]
    InvalidCredentials,

    #[error("Malformed SOAP envelope: {0}")]
    Malformed(String),
}

impl SoapError {
    /// HTTP status: 500 when the envelope could not be processed at all,
    /// 400 for every request-shape or credential problem.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Malformed(_) => 500,
            _ => 400,
        }
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Parses request envelopes and enforces the WS-Security check.
#[derive(Debug, Clone, Default)]
pub struct SoapEnvelopeProcessor {
    credentials: Option<WsSecurityCredentials>,
    require_security: bool,
}

impl SoapEnvelopeProcessor {
    /// `credentials = None` rejects every presented token.
    #[must_use]
    pub fn new(credentials: Option<WsSecurityCredentials>, require_security: bool) -> Self {
        Self {
            credentials,
            require_security,
        }
    }

    /// Extract headers and the body payload from a SOAP envelope.
    ///
    /// Element lookup is by local name, any namespace. A `Security` header
    /// child is validated as a WS-Security `UsernameToken`.
    ///
    /// # Errors
    ///
    /// Returns a [`SoapError`] for blank input, an unparsable document, a
    /// missing/empty `Body`, or a failed WS-Security check.
    pub fn unwrap(&self, raw: &str) -> Result<SoapContext, SoapError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SoapError::EmptyBody);
        }

        let doc = xml::parse(raw).map_err(|e| SoapError::Malformed(e.to_string()))?;
        let envelope = doc.root_element();

        let mut ctx = SoapContext::default();
        if let Some(header) = xml::child_by_local_name(envelope, "Header") {
            for child in header.children().filter(Node::is_element) {
                let name = child.tag_name().name();
                if name == SECURITY {
                    self.validate_ws_security(child)?;
                    ctx.authenticated = true;
                }
                ctx.headers.insert(name.to_string(), xml::text_content(child));
            }
        }

        if self.require_security && !ctx.authenticated {
            return Err(SoapError::MissingSecurityHeader);
        }

        let body = xml::child_by_local_name(envelope, "Body").ok_or(SoapError::BodyNotFound)?;
        let payload = body.first_element_child().ok_or(SoapError::BodyEmpty)?;
        ctx.body = xml::render_compact(payload);

        debug!(
            headers = ctx.headers.len(),
            authenticated = ctx.authenticated,
            "unwrapped SOAP envelope"
        );
        Ok(ctx)
    }

    /// Check a `Security` header's `UsernameToken` against the configured pair.
    ///
    /// # Errors
    ///
    /// [`SoapError::MissingCredentials`] if the token lacks a non-blank
    /// username or password, [`SoapError::InvalidCredentials`] if the pair is
    /// not accepted.
    pub fn validate_ws_security(&self, security: Node<'_, '_>) -> Result<(), SoapError> {
        let token = descendant(security, "UsernameToken");
        let field = |local: &str| {
            token
                .and_then(|t| descendant(t, local))
                .map(xml::text_content)
                .filter(|v| !v.is_empty())
        };

        let (Some(username), Some(password)) = (field("Username"), field("Password")) else {
            return Err(SoapError::MissingCredentials);
        };

        match &self.credentials {
            Some(creds) if creds.accepts(&username, &password) => Ok(()),
            _ => Err(SoapError::InvalidCredentials),
        }
    }
}

fn descendant<'a, 'input>(node: Node<'a, 'input>, local: &str) -> Option<Node<'a, 'input>> {
    node.descendants()
        .skip(1)
        .find(|n| n.is_element() && n.tag_name().name() == local)
}

/// Render a SOAP Fault document. All interpolated text is XML-escaped.
#[must_use]
pub fn build_fault(status: u16, fault_string: &str, message: &str) -> String {
    format!(
        r#"<soapenv:Envelope xmlns:soapenv="{SOAP_ENV_NS}">
  <soapenv:Body>
    <soapenv:Fault>
      <faultcode>soapenv:Client</faultcode>
      <faultstring>{}</faultstring>
      <detail>
        <error>
          <code>{status}</code>
          <message>{}</message>
        </error>
      </detail>
    </soapenv:Fault>
  </soapenv:Body>
</soapenv:Envelope>"#,
        escape(fault_string),
        escape(message),
    )
}

/// Wrap a bare response fragment in a `soapenv:Envelope`.
///
/// Extracted request headers are echoed as `soapenv:Header` children,
/// except `Security`. A body that already contains an `Envelope` is
/// returned unchanged.
#[must_use]
pub fn wrap_response(body: &str, headers: &BTreeMap<String, String>) -> String {
    if body.contains("Envelope") {
        return body.to_string();
    }

    let echoed: Vec<String> = headers
        .iter()
        .filter(|(name, _)| name.as_str() != SECURITY)
        .map(|(name, value)| format!("    <{name}>{}</{name}>", escape(value.as_str())))
        .collect();
    let header = if echoed.is_empty() {
        "  <soapenv:Header/>".to_string()
    } else {
        format!(
            "  <soapenv:Header>\n{}\n  </soapenv:Header>",
            echoed.join("\n")
        )
    };

    format!(
        "<soapenv:Envelope xmlns:soapenv=\"{SOAP_ENV_NS}\">\n{header}\n  <soapenv:Body>\n{}\n  </soapenv:Body>\n</soapenv:Envelope>",
        body.trim()
    )
}
