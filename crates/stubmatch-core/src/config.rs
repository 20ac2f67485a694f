//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Mount segment stripped from request paths before lookup
    pub mount_prefix: String,

    /// Stub definition file (YAML or JSON)
    pub stubs: PathBuf,

    /// WS-Security credentials accepted on SOAP requests
    pub ws_security: Option<WsSecurityCredentials>,

    /// Reject SOAP requests whose header carries no `Security` element
    pub require_ws_security: bool,

    /// Append audit records to this JSONL file
    pub audit_log: Option<PathBuf>,

    /// Redact credentials and cookies in audit records
    pub mask_sensitive_headers: bool,
}

/// WS-Security `UsernameToken` credential pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsSecurityCredentials {
    pub username: String,
    pub password: String,
}

impl WsSecurityCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Whether a presented username/password pair is accepted.
    #[must_use]
    pub fn accepts(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

impl std::fmt::Debug for WsSecurityCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSecurityCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Supplier of the WS-Security credentials checked on SOAP requests.
pub trait CredentialSource: Send + Sync {
    /// The accepted pair; `None` rejects every presented token.
    fn ws_security(&self) -> Option<WsSecurityCredentials>;
}

impl CredentialSource for EngineConfig {
    fn ws_security(&self) -> Option<WsSecurityCredentials> {
        self.ws_security.clone()
    }
}

impl CredentialSource for WsSecurityCredentials {
    fn ws_security(&self) -> Option<WsSecurityCredentials> {
        Some(self.clone())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mount_prefix: "/mock.api".to_string(),
            stubs: PathBuf::from("stubs.yaml"),
            ws_security: None,
            require_ws_security: true,
            audit_log: None,
            mask_sensitive_headers: true,
        }
    }
}

impl EngineConfig {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.stubmatch.toml)
    ///
    /// # Errors
    ///
    /// Returns error if a candidate file exists but cannot be parsed
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_default_in(Path::new("."))
    }

    /// Load the first default candidate found in `dir`, else defaults.
    ///
    /// # Errors
    ///
    /// Returns error if a candidate file exists but cannot be parsed
    pub fn load_default_in(dir: &Path) -> Result<Self, ConfigError> {
        let candidates = [".stubmatch.toml", ".stubmatch.json", "stubmatch.toml"];

        for name in candidates {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        // No config file, return default
        Ok(Self::default())
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# stubmatch configuration

# Mount segment stripped from request paths before stub lookup
# ("/mock.api/orders" is looked up as "orders")
mount_prefix = "/mock.api"

# Stub definitions (YAML or JSON list)
stubs = "stubs.yaml"

# Reject SOAP requests without a WS-Security header (default: true)
# require_ws_security = true

# Append one JSON line per resolved request
# audit_log = ".stubmatch/audit.jsonl"

# Redact Authorization / Cookie / API key headers in the audit log (default: true)
# mask_sensitive_headers = true

# Credentials accepted in SOAP UsernameToken headers
[ws_security]
username = "admin"
password = "change-me"
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}
