//! Recorded request files for `stubmatch check`
//!
//! ```toml
//! method = "POST"
//! path = "/mock.api/orders?trace=1"
//! body_file = "order.json"
//!
//! [headers]
//! Content-Type = "application/json"
//!
//! [cookies]
//! session = "s1"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use stubmatch_core::IncomingRequest;

/// One HTTP request as written on disk (TOML or JSON).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestFile {
    pub method: String,

    /// Raw request path, optionally with a query string
    pub path: String,

    pub headers: BTreeMap<String, String>,

    /// Appended after any parameters already present in `path`
    pub query: BTreeMap<String, String>,

    pub cookies: BTreeMap<String, String>,

    /// Inline body
    pub body: Option<String>,

    /// Body read from a file, relative to the request file
    pub body_file: Option<PathBuf>,
}

impl Default for RequestFile {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            path: "/".to_string(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            cookies: BTreeMap::new(),
            body: None,
            body_file: None,
        }
    }
}

impl RequestFile {
    /// Parse a request file; `.json` is JSON, anything else TOML.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or names both
    /// `body` and `body_file`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read request file {}", path.display()))?;

        let mut file: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid request file {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Invalid request file {}", path.display()))?
        };

        if let Some(body_file) = file.body_file.take() {
            if file.body.is_some() {
                bail!("{}: set either body or body_file, not both", path.display());
            }
            let body_path = path.parent().unwrap_or(Path::new(".")).join(&body_file);
            let bytes = std::fs::read(&body_path)
                .with_context(|| format!("Cannot read body file {}", body_path.display()))?;
            file.body = Some(String::from_utf8_lossy(&bytes).into_owned());
            file.body_file = Some(body_file);
        }

        Ok(file)
    }

    #[must_use]
    pub fn to_request(&self) -> IncomingRequest {
        let mut request = IncomingRequest::new(self.method.to_ascii_uppercase(), &self.path);
        for (name, value) in &self.headers {
            request = request.with_header(name.clone(), value.clone());
            if name.eq_ignore_ascii_case("cookie") {
                request = request.with_cookie_header(value);
            }
        }
        for (key, value) in &self.query {
            request = request.with_query(key.clone(), value.clone());
        }
        for (name, value) in &self.cookies {
            request = request.with_cookie(name.clone(), value.clone());
        }
        if let Some(body) = &self.body {
            request = request.with_body(body.clone());
        }
        request
    }
}
