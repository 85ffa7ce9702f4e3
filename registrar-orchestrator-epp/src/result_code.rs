//! EPP result code mapping
//!
//! Reference: RFC 5730 section 3, "Result Codes".

use serde::{Deserialize, Serialize};

use crate::error::EppError;

/// Coarse category of an EPP result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCategory {
    /// 1000
    Success,
    /// 1001: action pending
    Pending,
    /// 1300: poll queue empty
    NoMessages,
    /// 1301: poll message returned
    MessageQueued,
    /// 1500: logout acknowledged
    EndingSession,
    /// 2000-2005
    Syntax,
    /// 2100-2103, 2307
    Unimplemented,
    /// 2104
    Billing,
    /// 2105, 2106
    NotEligible,
    /// 2200
    Authentication,
    /// 2201
    Authorization,
    /// 2202
    InvalidAuthInfo,
    /// 2300, 2301
    TransferState,
    /// 2302
    ObjectExists,
    /// 2303
    ObjectNotFound,
    /// 2304, 2305
    StatusProhibitsOperation,
    /// 2306, 2308
    PolicyViolation,
    /// 2400
    CommandFailed,
    /// 2500-2502: the server is closing the connection
    SessionClosing,
    Unknown,
}

impl ResultCategory {
    pub fn from_code(code: u16) -> Self {
        match code {
            1000 => Self::Success,
            1001 => Self::Pending,
            1300 => Self::NoMessages,
            1301 => Self::MessageQueued,
            1500 => Self::EndingSession,
            2000..=2005 => Self::Syntax,
            2100..=2103 | 2307 => Self::Unimplemented,
            2104 => Self::Billing,
            2105 | 2106 => Self::NotEligible,
            2200 => Self::Authentication,
            2201 => Self::Authorization,
            2202 => Self::InvalidAuthInfo,
            2300 | 2301 => Self::TransferState,
            2302 => Self::ObjectExists,
            2303 => Self::ObjectNotFound,
            2304 | 2305 => Self::StatusProhibitsOperation,
            2306 | 2308 => Self::PolicyViolation,
            2400 => Self::CommandFailed,
            2500..=2502 => Self::SessionClosing,
            _ => Self::Unknown,
        }
    }

    /// The server closes the connection after sending a code in this category.
    pub fn closes_session(self) -> bool {
        matches!(self, Self::SessionClosing | Self::EndingSession)
    }
}

/// Whether a result code means the command succeeded (1xxx).
pub fn is_success(code: u16) -> bool {
    (1000..2000).contains(&code)
}

/// Human-readable text for a result code.
pub fn describe(code: u16) -> &'static str {
    match code {
        1000 => "Command completed successfully",
        1001 => "Command completed successfully; action pending",
        1300 => "Command completed successfully; no messages",
        1301 => "Command completed successfully; ack to dequeue",
        1500 => "Command completed successfully; ending session",
        2000 => "Unknown command",
        2001 => "Invalid data; the registry rejected the command syntax",
        2002 => "Command use error",
        2003 => "Required parameter missing",
        2004 => "Parameter value range error",
        2005 => "Parameter value syntax error",
        2100 => "Unimplemented protocol version",
        2101 => "Unimplemented command",
        2102 => "Unimplemented option",
        2103 => "Unimplemented extension",
        2104 => "Billing failure; check the registrar account balance",
        2105 => "Object is not eligible for renewal",
        2106 => "Object is not eligible for transfer",
        2200 => "Authentication error; check credentials and whitelisted IPs",
        2201 => "Authorization error; the object is sponsored by another registrar",
        2202 => "Invalid authorization information; check the auth code",
        2300 => "Object pending transfer",
        2301 => "Object not pending transfer",
        2302 => "Object exists",
        2303 => "Object does not exist",
        2304 => "Object status prohibits operation",
        2305 => "Object association prohibits operation",
        2306 => "Parameter value policy error",
        2307 => "Unimplemented object service",
        2308 => "Data management policy violation",
        2400 => "Command failed; the registry hit an internal error",
        2500 => "Command failed; server closing connection",
        2501 => "Authentication error; server closing connection",
        2502 => "Session limit exceeded; server closing connection",
        _ => "Unrecognized result code",
    }
}

/// Result block extracted from a response (internal).
#[derive(Debug, Clone)]
pub(crate) struct RawResult {
    pub code: u16,
    /// `<msg>` text
    pub message: String,
    /// `<extValue><reason>` text, if any
    pub reason: Option<String>,
    /// Registry-specific detail collected by the binding's enricher, if any
    pub detail: Option<String>,
}

/// Context for mapping a result (internal).
#[derive(Debug, Clone, Default)]
pub(crate) struct ResultContext {
    /// Action that produced the result, for messages
    pub action: String,
    /// Raw response XML, already redacted
    pub raw_response: Option<String>,
}

fn compose_message(raw: &RawResult) -> String {
    let mut message = describe(raw.code).to_string();
    if !raw.message.is_empty() && raw.message != message {
        message.push_str(" (");
        message.push_str(&raw.message);
        message.push(')');
    }
    if let Some(reason) = raw.reason.as_deref().filter(|r| !r.is_empty()) {
        message.push_str(": ");
        message.push_str(reason);
    }
    if let Some(detail) = raw.detail.as_deref().filter(|d| !d.is_empty()) {
        message.push_str(" [");
        message.push_str(detail);
        message.push(']');
    }
    message
}

/// Map a result code to success or a categorized error.
pub(crate) fn map_result(
    registry: &str,
    raw: &RawResult,
    context: &ResultContext,
) -> Result<(), EppError> {
    if is_success(raw.code) {
        return Ok(());
    }

    let message = compose_message(raw);
    let raw_response = context.raw_response.clone();
    let registry = registry.to_string();

    let error = match ResultCategory::from_code(raw.code) {
        // 2200: Authentication error
        // 2501 outside of login falls through to the session-closing registry arm
        ResultCategory::Authentication => EppError::Authentication {
            registry,
            result_code: Some(raw.code),
            message,
            raw_response,
        },

        // 2001: Command syntax error
        // 2002: Command use error
        // 2003: Required parameter missing
        // 2004: Parameter value range error
        // 2005: Parameter value syntax error
        ResultCategory::Syntax if raw.code != 2000 => EppError::Validation {
            registry,
            result_code: raw.code,
            message,
            raw_response,
        },

        // 2201: Authorization error
        // 2202: Invalid authorization information
        ResultCategory::Authorization | ResultCategory::InvalidAuthInfo => EppError::Permission {
            registry,
            result_code: raw.code,
            message,
            raw_response,
        },

        category => EppError::Registry {
            registry,
            result_code: raw.code,
            category,
            message,
            raw_response,
        },
    };

    if error.is_expected() {
        log::warn!("[{}] {} failed: {error}", error.registry(), context.action);
    } else {
        log::error!("[{}] {} failed: {error}", error.registry(), context.action);
    }
    Err(error)
}

/// Map a login result. Anything other than 1000 is an authentication failure.
pub(crate) fn map_login_result(
    registry: &str,
    raw: &RawResult,
    context: &ResultContext,
) -> Result<(), EppError> {
    if raw.code == 1000 {
        return Ok(());
    }
    let error = EppError::Authentication {
        registry: registry.to_string(),
        result_code: Some(raw.code),
        message: compose_message(raw),
        raw_response: context.raw_response.clone(),
    };
    log::warn!("[{registry}] {error}");
    Err(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(code: u16, message: &str) -> RawResult {
        RawResult {
            code,
            message: message.to_string(),
            reason: None,
            detail: None,
        }
    }

    fn ctx() -> ResultContext {
        ResultContext {
            action: "domain:info".to_string(),
            raw_response: Some("<epp/>".to_string()),
        }
    }

    #[test]
    fn success_codes_pass_through() {
        for code in [1000, 1001, 1300, 1301, 1500] {
            assert!(map_result("t", &raw(code, ""), &ctx()).is_ok(), "{code}");
        }
    }

    #[test]
    fn authentication_codes() {
        let err = map_result("t", &raw(2200, "Authentication error"), &ctx()).unwrap_err();
        assert!(matches!(err, EppError::Authentication { result_code: Some(2200), .. }));
        assert!(
            err.to_string()
                .contains("Authentication error; check credentials and whitelisted IPs")
        );

    }

    #[test]
    fn closing_auth_code_on_ordinary_command_is_not_a_login_failure() {
        let err = map_result("t", &raw(2501, "closing"), &ctx()).unwrap_err();
        assert!(matches!(
            err,
            EppError::Registry {
                result_code: 2501,
                category: ResultCategory::SessionClosing,
                ..
            }
        ));
        assert!(err.is_session_fatal());
        let message = err.to_string();
        assert!(!message.contains("Login rejected"), "{message}");
        assert!(message.contains("Registry error 2501"), "{message}");

        let err = map_login_result("t", &raw(2501, "closing"), &ctx()).unwrap_err();
        assert!(matches!(err, EppError::Authentication { result_code: Some(2501), .. }));
    }

    #[test]
    fn validation_codes() {
        for code in [2001, 2003, 2005] {
            let err = map_result("t", &raw(code, "bad"), &ctx()).unwrap_err();
            assert!(matches!(err, EppError::Validation { .. }), "{code}");
        }
        let err = map_result("t", &raw(2000, "unknown command"), &ctx()).unwrap_err();
        assert!(matches!(
            err,
            EppError::Registry {
                category: ResultCategory::Syntax,
                ..
            }
        ));
    }

    #[test]
    fn permission_codes() {
        for code in [2201, 2202] {
            let err = map_result("t", &raw(code, "no"), &ctx()).unwrap_err();
            assert!(matches!(err, EppError::Permission { .. }), "{code}");
        }
    }

    #[test]
    fn registry_codes_keep_category_and_raw_xml() {
        let err = map_result("t", &raw(2303, "Object does not exist"), &ctx()).unwrap_err();
        match err {
            EppError::Registry {
                result_code,
                category,
                raw_response,
                ..
            } => {
                assert_eq!(result_code, 2303);
                assert_eq!(category, ResultCategory::ObjectNotFound);
                assert_eq!(raw_response.as_deref(), Some("<epp/>"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = map_result("t", &raw(2304, "locked"), &ctx()).unwrap_err();
        assert!(matches!(
            err,
            EppError::Registry {
                category: ResultCategory::StatusProhibitsOperation,
                ..
            }
        ));
    }

    #[test]
    fn message_includes_reason_and_detail() {
        let result = RawResult {
            code: 2306,
            message: "Parameter value policy error".to_string(),
            reason: Some("period too long".to_string()),
            detail: Some("D101: invalid period (period)".to_string()),
        };
        let err = map_result("sidn", &result, &ctx()).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("period too long"));
        assert!(text.contains("D101"));
    }

    #[test]
    fn login_requires_exactly_1000() {
        assert!(map_login_result("t", &raw(1000, "ok"), &ctx()).is_ok());
        let err = map_login_result("t", &raw(1001, "pending"), &ctx()).unwrap_err();
        assert!(matches!(err, EppError::Authentication { result_code: Some(1001), .. }));
        let err = map_login_result("t", &raw(2400, "failed"), &ctx()).unwrap_err();
        assert!(matches!(err, EppError::Authentication { result_code: Some(2400), .. }));
    }

    #[test]
    fn session_closing_categories() {
        assert!(ResultCategory::from_code(2500).closes_session());
        assert!(ResultCategory::from_code(2502).closes_session());
        assert!(ResultCategory::from_code(1500).closes_session());
        assert!(!ResultCategory::from_code(2400).closes_session());
        assert!(!ResultCategory::from_code(1000).closes_session());
    }
}
