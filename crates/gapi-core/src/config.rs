//! Dynamic configuration contract
//!
//! Tunables (energy caps, recovery periods, multipliers, fee percentages) are
//! read through a [`ConfigProvider`]. Lookups are typed and may fail; callers
//! never propagate those failures. Every read site supplies its own fallback,
//! which is used when the key is missing, mistyped, unreadable or zero.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single typed lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("setting not found: {0}")]
    Missing(String),

    #[error("setting {key} is not a {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("setting {key} could not be parsed: {reason}")]
    Parse { key: String, reason: String },

    /// Backing store unreachable
    #[error("config store unavailable: {0}")]
    Unavailable(String),
}

/// Typed key lookup over the live settings store
///
/// Implementations may cache; the economy service re-reads per call and
/// treats every value as possibly stale.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn get_bool(&self, key: &str) -> Result<bool, ConfigError>;

    async fn get_string(&self, key: &str) -> Result<String, ConfigError>;

    async fn get_float64(&self, key: &str) -> Result<f64, ConfigError>;

    async fn get_int(&self, key: &str) -> Result<i64, ConfigError>;

    async fn get_int32(&self, key: &str) -> Result<i32, ConfigError>;

    async fn get_json(&self, key: &str) -> Result<serde_json::Value, ConfigError>;

    async fn get_duration(&self, key: &str) -> Result<Duration, ConfigError>;
}

/// Parse a duration setting: integer seconds, or `<n>` followed by `s`, `m`, `h` or `d`
pub fn parse_duration(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    let parse_err = |reason: &str| ConfigError::Parse {
        key: key.to_string(),
        reason: format!("{reason}: {raw:?}"),
    };

    if raw.is_empty() {
        return Err(parse_err("empty duration"));
    }

    let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = digits.parse().map_err(|_| parse_err("expected a number"))?;
    let scale: u64 = match unit.trim() {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => return Err(parse_err("unknown unit")),
    };
    let seconds = value
        .checked_mul(scale)
        .ok_or_else(|| parse_err("duration out of range"))?;
    Ok(Duration::from_secs(seconds))
}
