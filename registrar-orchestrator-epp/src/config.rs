//! Registry connection configuration
//!
//! Loaded from TOML, e.g.:
//!
//! ```toml
//! registry = "nominet"
//! hostname = "testbed-epp.nominet.org.uk"
//! port = 700
//! debug = true
//!
//! [credentials]
//! username = "EXAMPLE-TAG"
//! password = "secret"
//!
//! [tls]
//! client_certificate = "/etc/epp/client.pem"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registries::RegistryKind;
use crate::transport::Endpoint;

/// Default EPP port (RFC 5734).
pub const DEFAULT_PORT: u16 = 700;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config field '{field}': {detail}")]
    Invalid { field: &'static str, detail: String },
}

/// EPP login credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Sent as `<newPW>` at login to rotate the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("new_password", &self.new_password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// TLS options. All paths point to PEM files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TlsSettings {
    /// Client certificate chain for mutual TLS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<PathBuf>,
    /// Private key; read from `client_certificate` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<PathBuf>,
    /// Extra trust anchor, added to the webpki roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_certificate: Option<PathBuf>,
    /// SNI / verification name when it differs from `hostname`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    60
}

fn default_language() -> String {
    "en".to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Everything needed to open and authenticate one registry session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegistryConfig {
    pub registry: RegistryKind,
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub credentials: Credentials,
    #[serde(default)]
    pub tls: TlsSettings,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Include redacted request/response XML in trace logs.
    #[serde(default)]
    pub debug: bool,
    /// clTRID prefix; defaults to the registry tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_prefix: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Send `<hello/>` from `connect()` when the session has been idle this long.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe_after_secs: Option<u64>,
}

impl RegistryConfig {
    /// Minimal config with defaults for everything optional.
    pub fn new(
        registry: RegistryKind,
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            hostname: hostname.into(),
            port: DEFAULT_PORT,
            credentials: Credentials {
                username: username.into(),
                password: password.into(),
                new_password: None,
            },
            tls: TlsSettings::default(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            debug: false,
            transaction_prefix: None,
            language: default_language(),
            version: default_version(),
            liveness_probe_after_secs: None,
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, detail: &str| {
            Err(ConfigError::Invalid {
                field,
                detail: detail.to_string(),
            })
        };
        if self.hostname.trim().is_empty() {
            return invalid("hostname", "must not be empty");
        }
        if self.port == 0 {
            return invalid("port", "must be between 1 and 65535");
        }
        if self.credentials.username.trim().is_empty() {
            return invalid("credentials.username", "must not be empty");
        }
        if self.credentials.password.is_empty() {
            return invalid("credentials.password", "must not be empty");
        }
        if self.connect_timeout_secs == 0 {
            return invalid("connect_timeout_secs", "must be greater than zero");
        }
        if self.read_timeout_secs == 0 {
            return invalid("read_timeout_secs", "must be greater than zero");
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.hostname.clone(),
            port: self.port,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn liveness_probe_after(&self) -> Option<Duration> {
        self.liveness_probe_after_secs.map(Duration::from_secs)
    }

    /// Prefix for generated clTRIDs.
    pub fn transaction_prefix(&self) -> String {
        self.transaction_prefix
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| self.registry.to_string())
    }
}
