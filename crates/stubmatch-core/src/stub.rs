//! Stub definitions: an expected request shape paired with a canned response

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::body::BodyType;

/// Transport flavour of a stub
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Rest,
    Soap,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Rest => "REST",
            Self::Soap => "SOAP",
        })
    }
}

/// A single expected header / query parameter / cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Collapse duplicate keys, keeping the last value at the position of the
/// first occurrence. Keys compare case-insensitively when `fold_case` is set.
#[must_use]
pub fn last_write_wins(entries: &[KeyValue], fold_case: bool) -> Vec<KeyValue> {
    let same = |a: &str, b: &str| {
        if fold_case {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    };

    let mut out: Vec<KeyValue> = Vec::with_capacity(entries.len());
    for entry in entries {
        match out.iter_mut().find(|e| same(&e.key, &entry.key)) {
            Some(existing) => existing.value.clone_from(&entry.value),
            None => out.push(entry.clone()),
        }
    }
    out
}

/// A registered expected-request / canned-response pair.
///
/// ```yaml
/// - name: create order
///   protocol: REST
///   method: POST
///   path: orders
///   requestBody: '{"id": 1}'
///   responseBody: '{"ok": true}'
///   statusCode: 201
///   headers:
///     - key: X-Key
///       value: abc
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StubDefinition {
    /// Opaque identity, assigned by the store when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Human-readable name used in logs and audit records
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub protocol: Protocol,

    /// HTTP method, compared case-insensitively
    pub method: String,

    /// Path below the mount prefix, compared case-insensitively and exactly
    #[serde(alias = "url")]
    pub path: String,

    /// Declared format of `requestBody`, checked when the stub is saved
    #[serde(default)]
    pub request_format: BodyType,

    /// Declared format of `responseBody`, checked when the stub is saved
    #[serde(default)]
    pub response_format: BodyType,

    /// Template the request body must be equivalent to (blank = any body)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,

    #[serde(default)]
    pub response_body: String,

    #[serde(default = "default_status")]
    pub status_code: u16,

    /// Expected headers: case-insensitive key, exact value
    #[serde(default)]
    pub headers: Vec<KeyValue>,

    /// Expected query parameters: exact key, exact first value
    #[serde(default)]
    pub query_params: Vec<KeyValue>,

    /// Expected cookies: exact key, exact value
    #[serde(default)]
    pub cookies: Vec<KeyValue>,
}

fn default_status() -> u16 {
    200
}

impl StubDefinition {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: None,
            name: String::new(),
            protocol: Protocol::Rest,
            method: method.into(),
            path: path.into(),
            request_format: BodyType::Json,
            response_format: BodyType::Json,
            request_body: None,
            response_body: String::new(),
            status_code: default_status(),
            headers: Vec::new(),
            query_params: Vec::new(),
            cookies: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the request template; the declared format follows its content.
    #[must_use]
    pub fn with_request_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.request_format = BodyType::classify(&body);
        self.request_body = Some(body);
        self
    }

    /// Set the canned response; the declared format follows its content.
    #[must_use]
    pub fn with_response(mut self, status_code: u16, body: impl Into<String>) -> Self {
        self.response_body = body.into();
        self.response_format = BodyType::classify(&self.response_body);
        self.status_code = status_code;
        self
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(KeyValue::new(key, value));
        self
    }

    #[must_use]
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push(KeyValue::new(key, value));
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push(KeyValue::new(key, value));
        self
    }

    /// Exact, case-insensitive method + path lookup key match.
    #[must_use]
    pub fn matches_route(&self, method: &str, path: &str) -> bool {
        self.method.eq_ignore_ascii_case(method) && self.path.eq_ignore_ascii_case(path)
    }

    /// The request template, if one is configured and non-blank.
    #[must_use]
    pub fn request_template(&self) -> Option<&str> {
        self.request_body
            .as_deref()
            .filter(|body| !body.trim().is_empty())
    }

    /// Label used in logs, e.g. `"create order (POST orders)"`.
    #[must_use]
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("{} {}", self.method, self.path)
        } else {
            format!("{} ({} {})", self.name, self.method, self.path)
        }
    }

    /// Expected headers with duplicate keys collapsed (last write wins).
    #[must_use]
    pub fn expected_headers(&self) -> Vec<KeyValue> {
        last_write_wins(&self.headers, true)
    }

    #[must_use]
    pub fn expected_query(&self) -> Vec<KeyValue> {
        last_write_wins(&self.query_params, false)
    }

    #[must_use]
    pub fn expected_cookies(&self) -> Vec<KeyValue> {
        last_write_wins(&self.cookies, false)
    }

    /// Check that non-blank request/response payloads parse as their
    /// declared formats.
    ///
    /// # Errors
    ///
    /// Returns a [`PayloadError`] naming the first payload that does not
    /// parse.
    pub fn validate_payloads(&self) -> Result<(), PayloadError> {
        if let Some(body) = self.request_template() {
            check_payload("requestBody", body, self.request_format)?;
        }
        if !self.response_body.trim().is_empty() {
            check_payload("responseBody", &self.response_body, self.response_format)?;
        }
        Ok(())
    }
}

/// A stub payload does not parse as its declared format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} is not valid {format}: {message}")]
pub struct PayloadError {
    pub field: &'static str,
    pub format: BodyType,
    pub message: String,
}

fn check_payload(field: &'static str, text: &str, format: BodyType) -> Result<(), PayloadError> {
    let result = match format {
        BodyType::Json => serde_json::from_str::<serde_json::Value>(text)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        BodyType::Xml => crate::xml::parse(text.trim())
            .map(|_| ())
            .map_err(|e| e.to_string()),
        BodyType::Text => Ok(()),
    };
    result.map_err(|message| PayloadError {
        field,
        format,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_match_is_case_insensitive_and_exact() {
        let stub = StubDefinition::new("GET", "Orders/List");
        assert!(stub.matches_route("get", "orders/list"));
        assert!(!stub.matches_route("GET", "orders/list/1"));
        assert!(!stub.matches_route("POST", "orders/list"));
    }

    #[test]
    fn blank_template_is_absent() {
        let stub = StubDefinition::new("POST", "x").with_request_body("  \n");
        assert_eq!(stub.request_template(), None);
        let stub = stub.with_request_body("{}");
        assert_eq!(stub.request_template(), Some("{}"));
    }

    #[test]
    fn duplicate_keys_last_write_wins() {
        let stub = StubDefinition::new("GET", "x")
            .with_header("X-Key", "a")
            .with_header("Accept", "json")
            .with_header("x-key", "b")
            .with_query_param("q", "1")
            .with_query_param("Q", "2")
            .with_query_param("q", "3");

        assert_eq!(
            stub.expected_headers(),
            vec![KeyValue::new("X-Key", "b"), KeyValue::new("Accept", "json")]
        );
        assert_eq!(
            stub.expected_query(),
            vec![KeyValue::new("q", "3"), KeyValue::new("Q", "2")]
        );
    }

    #[test]
    fn yaml_uses_camel_case_and_url_alias() {
        let yaml = r#"
- name: ping
  method: GET
  url: ping
  responseBody: '{"ok":true}'
- name: soap
  protocol: SOAP
  method: POST
  path: svc
  requestFormat: xml
  requestBody: <ping/>
  statusCode: 202
  queryParams:
    - key: a
      value: "1"
"#;
        let stubs: Vec<StubDefinition> = serde_yml::from_str(yaml).unwrap();
        assert_eq!(stubs[0].path, "ping");
        assert_eq!(stubs[0].status_code, 200);
        assert_eq!(stubs[0].protocol, Protocol::Rest);
        assert_eq!(stubs[1].protocol, Protocol::Soap);
        assert_eq!(stubs[1].request_format, BodyType::Xml);
        assert_eq!(stubs[1].status_code, 202);
        assert_eq!(stubs[1].query_params, vec![KeyValue::new("a", "1")]);
    }

    #[test]
    fn payload_validation_follows_declared_format() {
        let ok = StubDefinition::new("POST", "x")
            .with_request_body(r#"{"id":1}"#)
            .with_response(200, "<ok/>");
        assert!(ok.validate_payloads().is_ok());

        let mut bad = ok.clone();
        bad.response_format = BodyType::Json;
        let err = bad.validate_payloads().unwrap_err();
        assert_eq!(err.field, "responseBody");
        assert_eq!(err.format, BodyType::Json);

        let mut text = ok;
        text.request_format = BodyType::Text;
        text.request_body = Some("{ not json".into());
        assert!(text.validate_payloads().is_ok());
    }

    #[test]
    fn label_prefers_name() {
        let stub = StubDefinition::new("GET", "ping");
        assert_eq!(stub.label(), "GET ping");
        assert_eq!(stub.with_name("health").label(), "health (GET ping)");
    }
}
