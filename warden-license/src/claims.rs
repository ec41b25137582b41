//! Helpers shared by license and attestation claims.

use chrono::Utc;

use crate::error::{ClaimError, ClaimResult};

/// Tolerated clock difference between issuer and verifier, in seconds.
pub const CLOCK_SKEW_SECS: i64 = 30;

pub(crate) fn now() -> i64 {
    Utc::now().timestamp()
}

pub(crate) fn require(field: &'static str, value: &str) -> ClaimResult<()> {
    if value.is_empty() {
        return Err(ClaimError::EmptyField(field));
    }
    Ok(())
}

pub(crate) fn require_audience(audience: &[String]) -> ClaimResult<()> {
    if audience.is_empty() || audience.iter().all(String::is_empty) {
        return Err(ClaimError::EmptyField("audience"));
    }
    Ok(())
}

pub(crate) fn check_issued_at(issued_at: i64, now: i64) -> ClaimResult<()> {
    if issued_at <= 0 {
        return Err(ClaimError::MissingIssuedAt);
    }
    if issued_at > now + CLOCK_SKEW_SECS {
        return Err(ClaimError::IssuedInFuture(issued_at));
    }
    Ok(())
}

pub(crate) fn contains_ignore_case(values: &[String], needle: &str) -> bool {
    values.iter().any(|v| v.eq_ignore_ascii_case(needle))
}

/// Serde adapter for the `aud` claim: always written as an array, read from
/// either a single string or an array.
pub(crate) mod audience {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    pub fn serialize<S: Serializer>(audience: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        audience.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        })
    }
}
