//! Utility modules.

/// Timestamp parsing and serde helpers for registry date formats.
pub mod datetime;

/// Secret redaction and log truncation.
pub mod log_sanitizer;
