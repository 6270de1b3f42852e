//! Typed access to the economy tunables
//!
//! Every tunable has a hard-coded fallback. A missing key, a lookup error or
//! a zero value all resolve to that fallback, so no operation ever fails
//! because a tunable is unset. Values are re-read on every call.

use gapi_core::config::{ConfigError, ConfigProvider};
use gapi_core::payment::FeeDistribution;
use gapi_core::types::NftType;
use gapi_economics::constants::*;
use gapi_economics::{ElectricityMode, ViewersBucket, ViewersTable};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Setting keys
pub mod keys {
    pub const ENERGY_FULL: &str = "energy_full";
    pub const ENERGY_RECOVERY_PERIOD: &str = "energy_recovery_period";
    pub const MIN_REWARDS_TO_CLAIM: &str = "min_rewards_to_claim";
    pub const CRAFT_STEP_AMOUNT: &str = "craft_step_amount";
    pub const ELECTRICITY_MAX_GAMES: &str = "electricity_max_games";
    pub const ELECTRICITY_PERCENT_MODE: &str = "electricity_percent_mode";
    pub const VIEWERS_MULTIPLIER: &str = "viewers_multiplier";
    pub const CONVERT_COMMISSION: &str = "convert_commission";
    pub const CONVERSION_FEE_ACCUMULATOR: &str = "conversion_fee_accumulator";

    use gapi_core::types::NftType;
    use gapi_economics::ViewersBucket;

    pub fn electricity_percent(tier: NftType) -> String {
        format!("electricity_percent_{}", tier.as_str())
    }

    pub fn viewers(tier: NftType, bucket: ViewersBucket) -> String {
        format!("viewers_{}_{}", tier.as_str(), bucket.as_str())
    }
}

/// Tunables read through a [`ConfigProvider`]
#[derive(Clone)]
pub struct Tunables {
    provider: Arc<dyn ConfigProvider>,
}

impl Tunables {
    pub fn new(provider: Arc<dyn ConfigProvider>) -> Self {
        Self { provider }
    }

    pub async fn energy_full(&self) -> i32 {
        match self.provider.get_int32(keys::ENERGY_FULL).await {
            Ok(v) if v > 0 => v,
            other => fallback(keys::ENERGY_FULL, other.err(), DEFAULT_ENERGY_FULL),
        }
    }

    pub async fn energy_recovery_period(&self) -> Duration {
        match self.provider.get_duration(keys::ENERGY_RECOVERY_PERIOD).await {
            Ok(v) if !v.is_zero() => v,
            other => fallback(
                keys::ENERGY_RECOVERY_PERIOD,
                other.err(),
                DEFAULT_RECOVERY_PERIOD,
            ),
        }
    }

    pub async fn min_rewards_to_claim(&self) -> f64 {
        self.float_or(keys::MIN_REWARDS_TO_CLAIM, DEFAULT_MIN_REWARDS_TO_CLAIM)
            .await
    }

    pub async fn craft_step_amount(&self) -> f64 {
        self.float_or(keys::CRAFT_STEP_AMOUNT, DEFAULT_CRAFT_STEP_AMOUNT)
            .await
    }

    pub async fn electricity_max_games(&self) -> i32 {
        match self.provider.get_int32(keys::ELECTRICITY_MAX_GAMES).await {
            Ok(v) if v > 0 => v,
            other => fallback(
                keys::ELECTRICITY_MAX_GAMES,
                other.err(),
                DEFAULT_ELECTRICITY_MAX_GAMES,
            ),
        }
    }

    pub async fn electricity_mode(&self) -> ElectricityMode {
        match self.provider.get_string(keys::ELECTRICITY_PERCENT_MODE).await {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::debug!(key = keys::ELECTRICITY_PERCENT_MODE, error = %e, "unknown mode, using always");
                ElectricityMode::default()
            }),
            Err(e) => fallback(
                keys::ELECTRICITY_PERCENT_MODE,
                Some(e),
                ElectricityMode::default(),
            ),
        }
    }

    pub async fn electricity_percent(&self, tier: NftType) -> f64 {
        self.float_or(&keys::electricity_percent(tier), DEFAULT_ELECTRICITY_PERCENT)
            .await
    }

    pub async fn viewers(&self, tier: NftType, bucket: ViewersBucket) -> i64 {
        let key = keys::viewers(tier, bucket);
        match self.provider.get_int(&key).await {
            Ok(v) if v != 0 => v,
            other => fallback(&key, other.err(), ViewersTable::default_for(tier, bucket)),
        }
    }

    /// Every `(tier, bucket)` cell, with fallbacks applied
    pub async fn viewers_table(&self) -> ViewersTable {
        let mut table = ViewersTable::default();
        for tier in NftType::ALL {
            for bucket in ViewersBucket::ALL {
                table.set(tier, bucket, self.viewers(tier, bucket).await);
            }
        }
        table
    }

    pub async fn viewers_multiplier(&self) -> f64 {
        self.float_or(keys::VIEWERS_MULTIPLIER, DEFAULT_VIEWERS_MULTIPLIER)
            .await
    }

    /// Claim commission, percent
    pub async fn convert_commission(&self) -> f64 {
        self.float_or(keys::CONVERT_COMMISSION, DEFAULT_CONVERT_COMMISSION)
            .await
    }

    pub async fn fee_accumulator(&self) -> String {
        match self.provider.get_string(keys::CONVERSION_FEE_ACCUMULATOR).await {
            Ok(v) if !v.trim().is_empty() => v,
            other => fallback(
                keys::CONVERSION_FEE_ACCUMULATOR,
                other.err(),
                DEFAULT_FEE_ACCUMULATOR.to_string(),
            ),
        }
    }

    /// The whole claim commission goes to the fee accumulator account
    pub async fn fee_distribution(&self) -> FeeDistribution {
        let mut distribution = FeeDistribution::new();
        distribution.insert(self.fee_accumulator().await, 100.0);
        distribution
    }

    /// Resolve every tunable at once
    pub async fn snapshot(&self) -> TunablesSnapshot {
        let mut electricity_percent = Vec::with_capacity(NftType::ALL.len());
        let mut viewers = Vec::new();
        for tier in NftType::ALL {
            electricity_percent.push((tier, self.electricity_percent(tier).await));
            for bucket in ViewersBucket::ALL {
                viewers.push((keys::viewers(tier, bucket), self.viewers(tier, bucket).await));
            }
        }

        TunablesSnapshot {
            energy_full: self.energy_full().await,
            energy_recovery_period_secs: self.energy_recovery_period().await.as_secs(),
            min_rewards_to_claim: self.min_rewards_to_claim().await,
            craft_step_amount: self.craft_step_amount().await,
            electricity_max_games: self.electricity_max_games().await,
            electricity_mode: self.electricity_mode().await,
            electricity_percent,
            viewers,
            viewers_multiplier: self.viewers_multiplier().await,
            convert_commission: self.convert_commission().await,
            conversion_fee_accumulator: self.fee_accumulator().await,
        }
    }

    /// Energy cap and regeneration period, read together for one request
    pub async fn energy_limits(&self) -> (i32, Duration) {
        (self.energy_full().await, self.energy_recovery_period().await)
    }

    async fn float_or(&self, key: &str, default: f64) -> f64 {
        match self.provider.get_float64(key).await {
            Ok(v) if v.is_finite() && v != 0.0 => v,
            other => fallback(key, other.err(), default),
        }
    }
}

fn fallback<T: std::fmt::Debug>(
    key: &str,
    error: Option<ConfigError>,
    default: T,
) -> T {
    match error {
        Some(e) => tracing::debug!(key, error = %e, fallback = ?default, "tunable unavailable"),
        None => tracing::debug!(key, fallback = ?default, "tunable unset"),
    }
    default
}

/// Effective values of every tunable
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TunablesSnapshot {
    pub energy_full: i32,
    pub energy_recovery_period_secs: u64,
    pub min_rewards_to_claim: f64,
    pub craft_step_amount: f64,
    pub electricity_max_games: i32,
    pub electricity_mode: ElectricityMode,
    pub electricity_percent: Vec<(NftType, f64)>,
    pub viewers: Vec<(String, i64)>,
    pub viewers_multiplier: f64,
    pub convert_commission: f64,
    pub conversion_fee_accumulator: String,
}
