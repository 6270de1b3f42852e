//! # Session Rewards
//!
//! Sessions are an entertainment economy: higher-tier NFTs and harder
//! difficulties attract more viewers, and viewers convert linearly to
//! in-game currency.
//!
//! ```text
//! rewards = viewers(tier, bucket) * viewers_multiplier
//!
//! bucket = difficulty name   on a win
//!        = "lose"            on a loss
//! ```
//!
//! Default viewers (used when a `viewers_<tier>_<bucket>` setting is unset):
//!
//! | Tier | easy | medium | hard | lose |
//! |------|------|--------|------|------|
//! | common | 10 | 15 | 25 | 2 |
//! | rare | 20 | 30 | 50 | 4 |
//! | super_rare | 30 | 45 | 75 | 6 |
//! | epic | 40 | 60 | 100 | 8 |
//! | legend | 50 | 75 | 125 | 10 |

use gapi_core::types::{Difficulty, GameResult, NftType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Column of the viewers table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewersBucket {
    Win(Difficulty),
    Lose,
}

impl ViewersBucket {
    pub const ALL: [ViewersBucket; 4] = [
        ViewersBucket::Win(Difficulty::Easy),
        ViewersBucket::Win(Difficulty::Medium),
        ViewersBucket::Win(Difficulty::Hard),
        ViewersBucket::Lose,
    ];

    pub fn for_outcome(difficulty: Difficulty, result: GameResult) -> Self {
        match result {
            GameResult::Win => Self::Win(difficulty),
            GameResult::Lose => Self::Lose,
        }
    }

    /// Settings-key fragment
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Win(d) => d.name(),
            Self::Lose => "lose",
        }
    }

    fn default_viewers(&self) -> i64 {
        match self {
            Self::Win(Difficulty::Easy) => 10,
            Self::Win(Difficulty::Medium) => 15,
            Self::Win(Difficulty::Hard) => 25,
            Self::Lose => 2,
        }
    }
}

impl fmt::Display for ViewersBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Viewers per `(tier, bucket)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewersTable {
    entries: HashMap<(NftType, ViewersBucket), i64>,
}

impl ViewersTable {
    /// Hard-coded fallback for one cell
    pub fn default_for(tier: NftType, bucket: ViewersBucket) -> i64 {
        bucket.default_viewers() * i64::from(tier.ordinal() + 1)
    }

    pub fn get(&self, tier: NftType, bucket: ViewersBucket) -> i64 {
        self.entries
            .get(&(tier, bucket))
            .copied()
            .unwrap_or_else(|| Self::default_for(tier, bucket))
    }

    pub fn set(&mut self, tier: NftType, bucket: ViewersBucket, viewers: i64) {
        self.entries.insert((tier, bucket), viewers);
    }
}

impl Default for ViewersTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        for tier in NftType::ALL {
            for bucket in ViewersBucket::ALL {
                entries.insert((tier, bucket), Self::default_for(tier, bucket));
            }
        }
        Self { entries }
    }
}

/// Payout of one session
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardOutcome {
    pub rewards_amount: f64,
    pub viewers: i64,
}

/// Pure reward math
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RewardModel {
    pub viewers_multiplier: f64,
}

impl RewardModel {
    pub fn new(viewers_multiplier: f64) -> Self {
        Self { viewers_multiplier }
    }

    pub fn compute(
        &self,
        table: &ViewersTable,
        nft_type: NftType,
        difficulty: Difficulty,
        result: GameResult,
    ) -> RewardOutcome {
        let bucket = ViewersBucket::for_outcome(difficulty, result);
        let viewers = table.get(nft_type, bucket).max(0);
        RewardOutcome {
            rewards_amount: viewers as f64 * self.viewers_multiplier,
            viewers,
        }
    }
}

impl Default for RewardModel {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_VIEWERS_MULTIPLIER)
    }
}
