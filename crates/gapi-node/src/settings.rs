//! Live settings store
//!
//! Admin-editable typed key/value pairs backing [`ConfigProvider`]. Lookups
//! are lenient about representation: an integer stored as the string `"5"`
//! (as environment overrides produce) still reads as an integer.

use async_trait::async_trait;
use gapi_core::config::{parse_duration, ConfigError, ConfigProvider};
use gapi_core::error::{EconomyError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// One stored value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Whole seconds
    Duration(u64),
    Json(serde_json::Value),
}

impl SettingValue {
    /// Map a loosely typed JSON value onto the narrowest variant
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        Ok(match value {
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::Text(s),
            Value::Null => {
                return Err(EconomyError::InvalidParameter(
                    "setting value must not be null".to_string(),
                ))
            }
            other => Self::Json(other),
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::Duration(_) => "duration",
            Self::Json(_) => "json",
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Duration(secs) => write!(f, "{secs}s"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

/// Thread-safe settings map
#[derive(Debug, Default)]
pub struct LiveSettings {
    values: RwLock<BTreeMap<String, SettingValue>>,
}

impl LiveSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from loosely typed values, e.g. the `[settings]` config section
    pub fn from_json_map(values: &BTreeMap<String, serde_json::Value>) -> Result<Self> {
        let settings = Self::new();
        for (key, value) in values {
            settings.set(key, SettingValue::from_json(value.clone())?)?;
        }
        Ok(settings)
    }

    pub fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.read().get(key).cloned()
    }

    /// Add or replace; returns the previous value
    pub fn set(&self, key: &str, value: SettingValue) -> Result<Option<SettingValue>> {
        let key = normalize_key(key)?;
        tracing::info!(key = %key, value = %value, "setting updated");
        Ok(self.values.write().insert(key, value))
    }

    pub fn delete(&self, key: &str) -> Option<SettingValue> {
        let removed = self.values.write().remove(key.trim());
        if removed.is_some() {
            tracing::info!(key, "setting deleted");
        }
        removed
    }

    /// All settings, ordered by key
    pub fn list(&self) -> Vec<(String, SettingValue)> {
        self.values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn lookup(&self, key: &str) -> std::result::Result<SettingValue, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }
}

fn normalize_key(key: &str) -> Result<String> {
    let key = key.trim();
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return Err(EconomyError::InvalidParameter(format!(
            "invalid setting key {key:?}"
        )));
    }
    Ok(key.to_string())
}

fn wrong_type(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::WrongType {
        key: key.to_string(),
        expected,
    }
}

fn parse_text<T: std::str::FromStr>(key: &str, raw: &str) -> std::result::Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Parse {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ConfigProvider for LiveSettings {
    async fn get_bool(&self, key: &str) -> std::result::Result<bool, ConfigError> {
        match self.lookup(key)? {
            SettingValue::Bool(b) => Ok(b),
            SettingValue::Text(s) => parse_text(key, &s),
            _ => Err(wrong_type(key, "bool")),
        }
    }

    async fn get_string(&self, key: &str) -> std::result::Result<String, ConfigError> {
        match self.lookup(key)? {
            SettingValue::Json(_) => Err(wrong_type(key, "string")),
            other => Ok(other.to_string()),
        }
    }

    async fn get_float64(&self, key: &str) -> std::result::Result<f64, ConfigError> {
        match self.lookup(key)? {
            SettingValue::Float(x) => Ok(x),
            SettingValue::Int(i) => Ok(i as f64),
            SettingValue::Text(s) => parse_text(key, &s),
            _ => Err(wrong_type(key, "float")),
        }
    }

    async fn get_int(&self, key: &str) -> std::result::Result<i64, ConfigError> {
        match self.lookup(key)? {
            SettingValue::Int(i) => Ok(i),
            SettingValue::Float(x) if x.fract() == 0.0 && x.abs() < i64::MAX as f64 => Ok(x as i64),
            SettingValue::Text(s) => parse_text(key, &s),
            _ => Err(wrong_type(key, "int")),
        }
    }

    async fn get_int32(&self, key: &str) -> std::result::Result<i32, ConfigError> {
        let wide = self.get_int(key).await?;
        i32::try_from(wide).map_err(|e| ConfigError::Parse {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    async fn get_json(&self, key: &str) -> std::result::Result<serde_json::Value, ConfigError> {
        Ok(match self.lookup(key)? {
            SettingValue::Json(v) => v,
            SettingValue::Bool(b) => serde_json::Value::Bool(b),
            SettingValue::Int(i) => serde_json::Value::from(i),
            SettingValue::Float(x) => serde_json::Value::from(x),
            SettingValue::Duration(secs) => serde_json::Value::from(secs),
            SettingValue::Text(s) => {
                serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s))
            }
        })
    }

    async fn get_duration(&self, key: &str) -> std::result::Result<Duration, ConfigError> {
        match self.lookup(key)? {
            SettingValue::Duration(secs) => Ok(Duration::from_secs(secs)),
            SettingValue::Int(i) if i >= 0 => Ok(Duration::from_secs(i as u64)),
            SettingValue::Text(s) => parse_duration(key, &s),
            _ => Err(wrong_type(key, "duration")),
        }
    }
}
