//! Node configuration types
//!
//! Loaded from `gapi.toml` (optional) with `GAPI_` environment overrides,
//! e.g. `GAPI_SERVICE__TX_TIMEOUT_MS=2000` or
//! `GAPI_SETTINGS__ENERGY_FULL=5`.

use gapi_core::types::{Difficulty, DropChances};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::error::NodeError;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "GAPI";

/// Complete node configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Timeouts and generator seeding
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Initial live settings, keyed by tunable name
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,

    /// Pack catalogue seeded at startup
    #[serde(default)]
    pub packs: Vec<PackSeed>,

    #[serde(default)]
    pub characters: Vec<CharacterSeed>,

    /// Per-difficulty game config blobs, keyed by `easy|medium|hard` or `1..3`
    #[serde(default)]
    pub game_configs: BTreeMap<String, serde_json::Value>,
}

impl NodeConfig {
    /// Load `path` (if it exists) and apply `GAPI_` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, NodeError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml_str(raw: &str) -> Result<Self, NodeError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Render as TOML, e.g. to print a starter file
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Seed(e.to_string()))
    }

    /// Game config seeds with their keys resolved to difficulties
    pub fn resolved_game_configs(&self) -> Result<Vec<(Difficulty, serde_json::Value)>, NodeError> {
        self.game_configs
            .iter()
            .map(|(key, blob)| Ok((parse_difficulty(key)?, blob.clone())))
            .collect()
    }
}

fn parse_difficulty(key: &str) -> Result<Difficulty, NodeError> {
    if let Ok(level) = key.trim().parse::<i32>() {
        return Difficulty::try_from(level).map_err(|e| NodeError::Seed(e.to_string()));
    }
    Difficulty::ALL
        .into_iter()
        .find(|d| d.name().eq_ignore_ascii_case(key.trim()))
        .ok_or_else(|| NodeError::Seed(format!("unknown difficulty {key:?}")))
}

/// Request-path limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Longest wait for a ledger transaction; exceeds `payment_timeout_ms`
    /// so a request can outwait a payment of the same player
    #[serde(default = "default_tx_timeout_ms")]
    pub tx_timeout_ms: u64,

    /// Longest wait for any payment service call
    #[serde(default = "default_payment_timeout_ms")]
    pub payment_timeout_ms: u64,

    /// Fixed seed for NFT draws; entropy when unset
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

fn default_tx_timeout_ms() -> u64 {
    15_000
}

fn default_payment_timeout_ms() -> u64 {
    10_000
}

impl ServiceConfig {
    pub fn tx_timeout(&self) -> Duration {
        Duration::from_millis(self.tx_timeout_ms)
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_timeout_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tx_timeout_ms: default_tx_timeout_ms(),
            payment_timeout_ms: default_payment_timeout_ms(),
            rng_seed: None,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Pack catalogue entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PackSeed {
    /// Stable id; generated when omitted
    #[serde(default)]
    pub id: Option<Uuid>,

    pub name: String,

    #[serde(default)]
    pub price: f64,

    pub drop_chances: DropChances,
}

/// Character catalogue entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterSeed {
    pub id: i32,
    pub name: String,
}
