//! Date/time parsing and serde helpers
//!
//! Registries disagree on timestamp formats:
//! - RFC 5731 elements (`crDate`, `exDate`, `qDate`): RFC 3339, often with a
//!   fractional second (`2024-05-01T10:00:00.0Z`)
//! - Hexonet key/value properties (`CREATEDDATE`): `2023-01-01 00:00:00`, UTC
//! - Some registries omit the time entirely: `2023-01-01`
//!
//! Use with `#[serde(with = "crate::utils::datetime")]` on `Option<DateTime<Utc>>` fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Parse any timestamp format seen on the wire, assuming UTC when no offset is given.
pub fn parse_epp_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Serialize `Option<DateTime<Utc>>` as an optional RFC 3339 string.
pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match dt {
        Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
        None => serializer.serialize_none(),
    }
}

/// Deserialize from any format accepted by [`parse_epp_datetime`].
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<String>::deserialize(deserializer)? {
        Some(s) => parse_epp_datetime(&s)
            .map(Some)
            .ok_or_else(|| Error::custom(format!("Invalid EPP timestamp: {s}"))),
        None => Ok(None),
    }
}
