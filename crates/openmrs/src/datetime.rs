//! Serde helpers for the REST API's timestamp format.
//!
//! The REST API writes timestamps as `2021-05-20T08:12:01.000+0000`: ISO 8601 with
//! milliseconds and an offset without a colon, which RFC 3339 parsers reject.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serializer};

const REST_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Parse a REST API timestamp, also accepting RFC 3339.
pub fn parse(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
}

pub fn format(value: &DateTime<FixedOffset>) -> String {
    value.format(REST_FORMAT).to_string()
}

pub fn serialize<S>(value: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

/// The same format for nullable timestamps.
pub mod option {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(
        value: &Option<DateTime<FixedOffset>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_str(&super::format(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse(&raw).map(Some).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid timestamp '{raw}'"))
            }),
            None => Ok(None),
        }
    }
}
