use serde::{Deserialize, Serialize};

use crate::result_code::ResultCategory;

/// Sub-classification of a [`EppError::Connection`] failure.
///
/// Registries usually reject unknown client IPs by resetting the TLS handshake,
/// and an abrupt close right after `<login>` usually means bad credentials, so
/// both are reported separately from a plain network failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionFailureKind {
    /// TCP connect, TLS handshake or frame read exceeded its timeout.
    Timeout,
    /// The registry actively refused the TCP connection.
    Refused,
    /// The TLS handshake failed in a way that usually means the client IP is not whitelisted.
    IpWhitelist,
    /// The connection dropped during login; the credentials are the likely cause.
    CredentialSuspect,
    /// The peer closed the connection (short read, reset, EOF).
    Closed,
    /// A command was issued on a session that is not connected or not logged in.
    NotConnected,
    /// Any other network or TLS failure.
    Generic,
}

impl ConnectionFailureKind {
    /// Operator-facing hint appended to the error message, if the kind has one.
    pub fn hint(self) -> Option<&'static str> {
        match self {
            Self::IpWhitelist => Some(
                "the registry may not have whitelisted this server's IP address; check the registry IP whitelist",
            ),
            Self::CredentialSuspect => Some(
                "the registry closed the connection during login; check the EPP username and password",
            ),
            Self::Timeout
            | Self::Refused
            | Self::Closed
            | Self::NotConnected
            | Self::Generic => None,
        }
    }
}

impl std::fmt::Display for ConnectionFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Refused => "connection refused",
            Self::IpWhitelist => "IP whitelist suspected",
            Self::CredentialSuspect => "credentials suspected",
            Self::Closed => "connection closed",
            Self::NotConnected => "not connected",
            Self::Generic => "network failure",
        };
        f.write_str(s)
    }
}

/// Unified error type for all EPP session operations.
///
/// Each variant includes a `registry` field identifying which registry binding produced
/// the error. Errors raised from a registry response keep the numeric result code and
/// the raw response XML (already redacted) for operator debugging.
///
/// Nothing here is retried automatically: only the connect/login sequence is re-run,
/// through the idempotent [`EppSession::connect`](crate::EppSession::connect) guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum EppError {
    /// Network or TLS failure, or a command on a session that is not usable.
    Connection {
        /// Registry that produced the error.
        registry: String,
        /// Failure sub-classification.
        kind: ConnectionFailureKind,
        /// Error details.
        detail: String,
    },

    /// Login was rejected. Retrying with the same credentials will not help.
    Authentication {
        /// Registry that produced the error.
        registry: String,
        /// EPP result code, when the registry answered.
        result_code: Option<u16>,
        /// Human-readable message.
        message: String,
        /// Raw response XML, if available.
        raw_response: Option<String>,
    },

    /// The registry sent something that is not a well-formed EPP document.
    Protocol {
        /// Registry that produced the error.
        registry: String,
        /// What was wrong with the document.
        detail: String,
        /// Raw response XML, if available.
        raw_response: Option<String>,
    },

    /// The command was rejected as syntactically or semantically invalid (2001-2005).
    Validation {
        /// Registry that produced the error.
        registry: String,
        /// EPP result code.
        result_code: u16,
        /// Human-readable message.
        message: String,
        /// Raw response XML, if available.
        raw_response: Option<String>,
    },

    /// The client is not allowed to act on the object (2201, 2202).
    Permission {
        /// Registry that produced the error.
        registry: String,
        /// EPP result code.
        result_code: u16,
        /// Human-readable message.
        message: String,
        /// Raw response XML, if available.
        raw_response: Option<String>,
    },

    /// Any other non-success result code.
    Registry {
        /// Registry that produced the error.
        registry: String,
        /// EPP result code.
        result_code: u16,
        /// Category the code falls into.
        category: ResultCategory,
        /// Human-readable message.
        message: String,
        /// Raw response XML, if available.
        raw_response: Option<String>,
    },

    /// The registry configuration is unusable (missing files, bad certificate, invalid field).
    Config {
        /// Registry that produced the error.
        registry: String,
        /// Error details.
        detail: String,
    },
}

impl EppError {
    pub(crate) fn connection(
        registry: &str,
        kind: ConnectionFailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self::Connection {
            registry: registry.to_string(),
            kind,
            detail: detail.into(),
        }
    }

    pub(crate) fn protocol(
        registry: &str,
        detail: impl Into<String>,
        raw_response: Option<String>,
    ) -> Self {
        Self::Protocol {
            registry: registry.to_string(),
            detail: detail.into(),
            raw_response,
        }
    }

    pub(crate) fn config(registry: &str, detail: impl Into<String>) -> Self {
        Self::Config {
            registry: registry.to_string(),
            detail: detail.into(),
        }
    }

    /// Registry tag carried by every variant.
    pub fn registry(&self) -> &str {
        match self {
            Self::Connection { registry, .. }
            | Self::Authentication { registry, .. }
            | Self::Protocol { registry, .. }
            | Self::Validation { registry, .. }
            | Self::Permission { registry, .. }
            | Self::Registry { registry, .. }
            | Self::Config { registry, .. } => registry,
        }
    }

    /// EPP result code, when the error came from a registry response.
    pub fn result_code(&self) -> Option<u16> {
        match self {
            Self::Authentication { result_code, .. } => *result_code,
            Self::Validation { result_code, .. }
            | Self::Permission { result_code, .. }
            | Self::Registry { result_code, .. } => Some(*result_code),
            Self::Connection { .. } | Self::Protocol { .. } | Self::Config { .. } => None,
        }
    }

    /// Raw (redacted) response XML, when available.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Authentication { raw_response, .. }
            | Self::Protocol { raw_response, .. }
            | Self::Validation { raw_response, .. }
            | Self::Permission { raw_response, .. }
            | Self::Registry { raw_response, .. } => raw_response.as_deref(),
            Self::Connection { .. } | Self::Config { .. } => None,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Whether the session can no longer be used and must reconnect before the next command.
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Self::Connection { .. } => true,
            Self::Authentication { result_code, .. } => {
                result_code.is_some_and(|code| (2500..2600).contains(&code))
            }
            Self::Registry { category, .. } => category.closes_session(),
            Self::Protocol { .. }
            | Self::Validation { .. }
            | Self::Permission { .. }
            | Self::Config { .. } => false,
        }
    }

    /// Whether this is an expected outcome (bad input, missing object, policy refusal),
    /// used for log levels.
    ///
    /// Returns `true` when `warn` is appropriate, `false` when `error` is.
    /// **Keep this in sync when adding variants.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::Authentication { .. } | Self::Validation { .. } | Self::Permission { .. } => {
                true
            }
            Self::Registry { category, .. } => !matches!(
                category,
                ResultCategory::CommandFailed
                    | ResultCategory::SessionClosing
                    | ResultCategory::Unknown
            ),
            Self::Connection { .. } | Self::Protocol { .. } | Self::Config { .. } => false,
        }
    }
}

impl std::fmt::Display for EppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection {
                registry,
                kind,
                detail,
            } => {
                if let Some(hint) = kind.hint() {
                    write!(f, "[{registry}] Connection error ({kind}): {detail}; {hint}")
                } else {
                    write!(f, "[{registry}] Connection error ({kind}): {detail}")
                }
            }
            Self::Authentication {
                registry, message, ..
            } => {
                write!(f, "[{registry}] Login rejected: {message}")
            }
            Self::Protocol {
                registry, detail, ..
            } => {
                write!(f, "[{registry}] Protocol error: {detail}")
            }
            Self::Validation {
                registry,
                result_code,
                message,
                ..
            } => {
                write!(f, "[{registry}] Validation error {result_code}: {message}")
            }
            Self::Permission {
                registry,
                result_code,
                message,
                ..
            } => {
                write!(f, "[{registry}] Permission denied {result_code}: {message}")
            }
            Self::Registry {
                registry,
                result_code,
                message,
                ..
            } => {
                write!(f, "[{registry}] Registry error {result_code}: {message}")
            }
            Self::Config { registry, detail } => {
                write!(f, "[{registry}] Configuration error: {detail}")
            }
        }
    }
}

impl std::error::Error for EppError {}

/// Convenience type alias for `Result<T, EppError>`.
pub type Result<T> = std::result::Result<T, EppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_connection_error_without_hint() {
        let e = EppError::connection("generic", ConnectionFailureKind::Refused, "epp.example:700");
        assert_eq!(
            e.to_string(),
            "[generic] Connection error (connection refused): epp.example:700"
        );
    }

    #[test]
    fn display_connection_error_with_whitelist_hint() {
        let e = EppError::connection(
            "nominet",
            ConnectionFailureKind::IpWhitelist,
            "TLS handshake with epp.nominet.org.uk:700 failed",
        );
        let text = e.to_string();
        assert!(text.starts_with("[nominet] Connection error (IP whitelist suspected)"));
        assert!(text.contains("whitelisted"));
    }

    #[test]
    fn display_authentication_error() {
        let e = EppError::Authentication {
            registry: "sidn".to_string(),
            result_code: Some(2200),
            message: "Authentication error; check credentials and whitelisted IPs".to_string(),
            raw_response: None,
        };
        assert_eq!(
            e.to_string(),
            "[sidn] Login rejected: Authentication error; check credentials and whitelisted IPs"
        );
    }

    #[test]
    fn display_registry_error() {
        let e = EppError::Registry {
            registry: "eurid".to_string(),
            result_code: 2302,
            category: ResultCategory::ObjectExists,
            message: "Object exists".to_string(),
            raw_response: None,
        };
        assert_eq!(e.to_string(), "[eurid] Registry error 2302: Object exists");
    }

    #[test]
    fn display_validation_and_permission() {
        let v = EppError::Validation {
            registry: "t".into(),
            result_code: 2005,
            message: "Parameter value syntax error".into(),
            raw_response: None,
        };
        assert_eq!(
            v.to_string(),
            "[t] Validation error 2005: Parameter value syntax error"
        );

        let p = EppError::Permission {
            registry: "t".into(),
            result_code: 2201,
            message: "Authorization error".into(),
            raw_response: None,
        };
        assert_eq!(p.to_string(), "[t] Permission denied 2201: Authorization error");
    }

    #[test]
    fn result_code_and_raw_response_accessors() {
        let e = EppError::Registry {
            registry: "t".into(),
            result_code: 2303,
            category: ResultCategory::ObjectNotFound,
            message: "Object does not exist".into(),
            raw_response: Some("<epp/>".into()),
        };
        assert_eq!(e.result_code(), Some(2303));
        assert_eq!(e.raw_response(), Some("<epp/>"));
        assert_eq!(e.registry(), "t");

        let c = EppError::connection("t", ConnectionFailureKind::Closed, "eof");
        assert_eq!(c.result_code(), None);
        assert_eq!(c.raw_response(), None);
    }

    #[test]
    fn session_fatal_classification() {
        assert!(EppError::connection("t", ConnectionFailureKind::Timeout, "x").is_session_fatal());
        assert!(
            EppError::Registry {
                registry: "t".into(),
                result_code: 2502,
                category: ResultCategory::SessionClosing,
                message: "limit exceeded".into(),
                raw_response: None,
            }
            .is_session_fatal()
        );
        assert!(
            !EppError::Registry {
                registry: "t".into(),
                result_code: 2400,
                category: ResultCategory::CommandFailed,
                message: "failed".into(),
                raw_response: None,
            }
            .is_session_fatal()
        );
        assert!(!EppError::protocol("t", "bad", None).is_session_fatal());
    }

    #[test]
    fn expected_errors() {
        assert!(
            EppError::Registry {
                registry: "t".into(),
                result_code: 2303,
                category: ResultCategory::ObjectNotFound,
                message: "missing".into(),
                raw_response: None,
            }
            .is_expected()
        );
        assert!(!EppError::connection("t", ConnectionFailureKind::Generic, "x").is_expected());
        assert!(!EppError::protocol("t", "bad xml", None).is_expected());
    }

    #[test]
    fn serialize_json_tagged() {
        let e = EppError::connection("hexonet", ConnectionFailureKind::IpWhitelist, "reset");
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"code\":\"Connection\""));
        assert!(json.contains("\"kind\":\"ip_whitelist\""));
    }

    #[test]
    fn deserialize_all_variants() {
        let variants = vec![
            EppError::connection("t", ConnectionFailureKind::NotConnected, "x"),
            EppError::Authentication {
                registry: "t".into(),
                result_code: None,
                message: "m".into(),
                raw_response: None,
            },
            EppError::protocol("t", "d", Some("<x/>".into())),
            EppError::Validation {
                registry: "t".into(),
                result_code: 2001,
                message: "m".into(),
                raw_response: None,
            },
            EppError::Permission {
                registry: "t".into(),
                result_code: 2202,
                message: "m".into(),
                raw_response: None,
            },
            EppError::Registry {
                registry: "t".into(),
                result_code: 2400,
                category: ResultCategory::CommandFailed,
                message: "m".into(),
                raw_response: None,
            },
            EppError::config("t", "d"),
        ];

        for v in &variants {
            let json = serde_json::to_string(v).unwrap();
            let back: EppError = serde_json::from_str(&json).unwrap();
            assert_eq!(back.to_string(), v.to_string());
        }
    }
}
