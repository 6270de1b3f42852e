//! # Electricity Tax
//!
//! Every rewarded session may be taxed a share of its payout. The tax
//! accumulates on the player row and is settled later with a single payment.
//!
//! | Mode | Taxed when |
//! |------|------------|
//! | `win` | session won |
//! | `lose` | session lost |
//! | `always` | every session |
//!
//! When the mode does not trigger, the cost is exactly `0.0` so callers
//! treat "no tax" and "zero tax" the same way.

use gapi_core::types::{GameResult, NftType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::DEFAULT_ELECTRICITY_PERCENT;

/// When the electricity tax is charged
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectricityMode {
    WinOnly,
    LoseOnly,
    #[default]
    Always,
}

impl ElectricityMode {
    pub fn triggers(&self, result: GameResult) -> bool {
        match self {
            Self::WinOnly => result == GameResult::Win,
            Self::LoseOnly => result == GameResult::Lose,
            Self::Always => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WinOnly => "win",
            Self::LoseOnly => "lose",
            Self::Always => "always",
        }
    }
}

impl fmt::Display for ElectricityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised mode string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown electricity mode {0:?}")]
pub struct UnknownMode(pub String);

impl FromStr for ElectricityMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" | "win_only" | "win-only" => Ok(Self::WinOnly),
            "lose" | "lose_only" | "lose-only" => Ok(Self::LoseOnly),
            "always" | "" => Ok(Self::Always),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

/// Pure electricity cost math
pub struct ElectricityModel;

impl ElectricityModel {
    /// Tax for one finished session
    ///
    /// `fee_percent_for` resolves the tier's percentage; non-positive or
    /// non-finite answers fall back to 40.
    pub fn cost<F>(
        mode: ElectricityMode,
        nft_type: NftType,
        result: GameResult,
        rewards_amount: f64,
        fee_percent_for: F,
    ) -> f64
    where
        F: FnOnce(NftType) -> f64,
    {
        if !mode.triggers(result) {
            return 0.0;
        }

        let percent = match fee_percent_for(nft_type) {
            p if p.is_finite() && p > 0.0 => p,
            _ => DEFAULT_ELECTRICITY_PERCENT,
        };
        rewards_amount * percent / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("win".parse::<ElectricityMode>().unwrap(), ElectricityMode::WinOnly);
        assert_eq!("LOSE".parse::<ElectricityMode>().unwrap(), ElectricityMode::LoseOnly);
        assert_eq!("always".parse::<ElectricityMode>().unwrap(), ElectricityMode::Always);
        assert!("sometimes".parse::<ElectricityMode>().is_err());
    }

    #[test]
    fn test_always_taxes_both_outcomes() {
        let win = ElectricityModel::cost(
            ElectricityMode::Always,
            NftType::Common,
            GameResult::Win,
            48.0,
            |_| 40.0,
        );
        assert!((win - 19.2).abs() < 1e-9);

        let lose = ElectricityModel::cost(
            ElectricityMode::Always,
            NftType::Common,
            GameResult::Lose,
            10.0,
            |_| 40.0,
        );
        assert!((lose - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_untriggered_mode_is_exactly_zero() {
        let cost = ElectricityModel::cost(
            ElectricityMode::WinOnly,
            NftType::Epic,
            GameResult::Lose,
            100.0,
            |_| 40.0,
        );
        assert_eq!(cost, 0.0);

        let cost = ElectricityModel::cost(
            ElectricityMode::LoseOnly,
            NftType::Epic,
            GameResult::Win,
            100.0,
            |_| 40.0,
        );
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn test_unset_percent_defaults_to_forty() {
        let cost = ElectricityModel::cost(
            ElectricityMode::Always,
            NftType::Rare,
            GameResult::Win,
            50.0,
            |_| 0.0,
        );
        assert!((cost - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_percent_is_looked_up_per_tier() {
        let cost = ElectricityModel::cost(
            ElectricityMode::Always,
            NftType::Legend,
            GameResult::Win,
            200.0,
            |tier| if tier == NftType::Legend { 10.0 } else { 90.0 },
        );
        assert!((cost - 20.0).abs() < 1e-9);
    }
}
