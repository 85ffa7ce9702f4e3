//! Log sanitization utilities
//!
//! Prevents credentials (login passwords, domain/contact auth codes, key/value
//! secrets) from reaching trace logs, and keeps large payloads from flooding
//! debug/error output.

use regex::Regex;

/// Maximum number of characters to include in truncated log output.
const TRUNCATE_LIMIT: usize = 256;

/// Replacement for masked values.
pub const REDACTED: &str = "[REDACTED]";

/// Elements masked by every binding: login password, new password and the
/// `<pw>` child of domain/contact `<authInfo>`.
pub const DEFAULT_SECRET_ELEMENTS: &[&str] = &["pw", "newPW"];

/// MSRV-compatible replacement for `str::floor_char_boundary` (stable since 1.91.0).
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        s.len()
    } else {
        let mut i = index;
        while i > 0 && !s.is_char_boundary(i) {
            i -= 1;
        }
        i
    }
}

/// Truncate a string for safe logging.
///
/// Returns the original string if it's within the limit,
/// otherwise returns the first `TRUNCATE_LIMIT` characters with a suffix
/// indicating the total length.
pub fn truncate_for_log(s: &str) -> String {
    if s.len() <= TRUNCATE_LIMIT {
        s.to_string()
    } else {
        format!(
            "{}... [truncated, total {} bytes]",
            &s[..floor_char_boundary(s, TRUNCATE_LIMIT)],
            s.len()
        )
    }
}

/// Masks secret values inside serialized EPP XML while leaving the structure intact.
///
/// Two kinds of rules:
/// - element rules mask everything between `<x:name ...>` and `</x:name>` for any
///   namespace prefix, CDATA sections included
/// - key/value rules mask the `value` attribute of elements whose `key` attribute
///   matches (the Hexonet `keyvalue` extension style)
#[derive(Debug, Clone)]
pub struct Redactor {
    element_pattern: Option<Regex>,
    key_value_patterns: Vec<Regex>,
    broken: bool,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET_ELEMENTS, &[] as &[&str])
    }
}

impl Redactor {
    pub fn new<E, K>(elements: &[E], keys: &[K]) -> Self
    where
        E: AsRef<str>,
        K: AsRef<str>,
    {
        let mut broken = false;

        let element_pattern = if elements.is_empty() {
            None
        } else {
            let names = alternation(elements);
            let pattern = format!(
                r"(?s)(<(?:[A-Za-z_][\w.-]*:)?(?:{names})(?:\s[^>]*)?>)(.*?)(</(?:[A-Za-z_][\w.-]*:)?(?:{names})\s*>)"
            );
            compile(&pattern, &mut broken)
        };

        let key_value_patterns = if keys.is_empty() {
            Vec::new()
        } else {
            let keys = alternation(keys);
            [
                format!(r#"(<[^>]*\bkey="(?i:{keys})"[^>]*?\bvalue=")([^"]*)(")"#),
                format!(r#"(<[^>]*?\bvalue=")([^"]*)("[^>]*\bkey="(?i:{keys})")"#),
            ]
            .iter()
            .filter_map(|pattern| compile(pattern, &mut broken))
            .collect()
        };

        Self {
            element_pattern,
            key_value_patterns,
            broken,
        }
    }

    /// Return `xml` with every secret value replaced by [`REDACTED`].
    pub fn redact(&self, xml: &str) -> String {
        if self.broken {
            // A rule failed to compile; never risk logging a secret.
            return format!("[XML elided, {} bytes]", xml.len());
        }

        let mut out = match &self.element_pattern {
            Some(pattern) => pattern
                .replace_all(xml, format!("${{1}}{REDACTED}${{3}}").as_str())
                .into_owned(),
            None => xml.to_string(),
        };
        for pattern in &self.key_value_patterns {
            out = pattern
                .replace_all(&out, format!("${{1}}{REDACTED}${{3}}").as_str())
                .into_owned();
        }
        out
    }
}

fn alternation<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|name| regex::escape(name.as_ref()))
        .collect::<Vec<_>>()
        .join("|")
}

fn compile(pattern: &str, broken: &mut bool) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            log::error!("Failed to compile redaction rule: {e}");
            *broken = true;
            None
        }
    }
}
