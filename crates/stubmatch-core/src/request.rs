//! Inbound request as delivered by the transport layer

use std::collections::BTreeMap;

/// A request to resolve. Built once by the transport, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingRequest {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    cookies: BTreeMap<String, String>,
    body: String,
}

impl IncomingRequest {
    /// Create a request from a method and a raw URI (`/mount/orders?id=1`).
    ///
    /// The query string is form-decoded (`%XX` escapes, `+` as space) into
    /// the query multimap.
    pub fn new(method: impl Into<String>, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (uri, Vec::new()),
        };
        Self {
            method: method.into(),
            path: path.to_string(),
            query,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Add every `name=value` pair of a raw `Cookie:` header.
    #[must_use]
    pub fn with_cookie_header(mut self, raw: &str) -> Self {
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    self.cookies
                        .insert(name.to_string(), value.trim().trim_matches('"').to_string());
                }
            }
        }
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the body from raw bytes; invalid UTF-8 is replaced.
    #[must_use]
    pub fn with_body_bytes(mut self, body: &[u8]) -> Self {
        self.body = String::from_utf8_lossy(body).into_owned();
        self
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Raw path, mount prefix included, query string excluded.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of a header, name compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// First value of a query parameter.
    #[must_use]
    pub fn query_first(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Path used for stub lookup: see [`route_path`].
    #[must_use]
    pub fn route_path(&self, mount_prefix: &str) -> String {
        route_path(&self.path, mount_prefix)
    }

    /// Raw path with the query string re-attached, for audit records.
    #[must_use]
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .finish();
        format!("{}?{query}", self.path)
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Strip everything up to and including the last `<mount_prefix>/`, then
/// any leading `/`.
///
/// `route_path("/app/mock.api/orders/1", "/mock.api")` → `"orders/1"`.
/// A path without the mount segment only loses its leading slashes.
#[must_use]
pub fn route_path(raw: &str, mount_prefix: &str) -> String {
    let segment = mount_prefix.trim_matches('/');
    let rest = if segment.is_empty() {
        raw
    } else {
        let marker = format!("/{segment}/");
        match raw.rfind(&marker) {
            Some(at) => &raw[at + marker.len()..],
            None => raw,
        }
    };
    rest.trim_start_matches('/').to_string()
}
