//! # gapi Economics - Energy, Electricity, Rewards & NFTs
//!
//! Pure economic models of the play-to-earn game. Nothing in this crate
//! performs I/O; the service composes these models with the transactional
//! ledger and the payment collaborator.
//!
//! ## Session Economy
//!
//! ```text
//! ┌──────────┐  -1 energy   ┌────────────┐  viewers × multiplier  ┌──────────────┐
//! │  energy  │ ───────────► │  session   │ ─────────────────────► │ rewards (+)  │
//! │ (regen)  │              │ (win/lose) │                        └──────────────┘
//! └──────────┘              └────────────┘  rewards × fee %       ┌──────────────┐
//!                                  └──────────────────────────────► │ electricity  │
//!                                                                   └──────────────┘
//! ```
//!
//! | Model | Input | Output |
//! |-------|-------|--------|
//! | `EnergyModel` | player, cap, period, now | points regenerated |
//! | `ElectricityModel` | mode, tier, result, rewards | tax owed |
//! | `RewardModel` | tier, difficulty, result | rewards, viewers |
//! | `NftGenerator` | pack / craft inputs | new NFT |

pub mod claim;
pub mod electricity;
pub mod energy;
pub mod generator;
pub mod reward;

// Re-exports
pub use claim::{claimable_balance, validate_claim};
pub use electricity::{ElectricityMode, ElectricityModel, UnknownMode};
pub use energy::{EnergyModel, Refill};
pub use generator::{craft_cost, craft_target, NftGenerator};
pub use reward::{RewardModel, RewardOutcome, ViewersBucket, ViewersTable};

/// Hard-coded fallbacks for every tunable
pub mod constants {
    use std::time::Duration;

    /// Energy cap
    pub const DEFAULT_ENERGY_FULL: i32 = 3;

    /// One energy point per 4 hours
    pub const DEFAULT_RECOVERY_PERIOD: Duration = Duration::from_secs(4 * 3600);

    /// Smallest claimable amount
    pub const DEFAULT_MIN_REWARDS_TO_CLAIM: f64 = 10.0;

    /// Craft price per tier step
    pub const DEFAULT_CRAFT_STEP_AMOUNT: f64 = 10.0;

    /// Taxed sessions allowed before electricity must be paid
    pub const DEFAULT_ELECTRICITY_MAX_GAMES: i32 = 3;

    /// Electricity share of session rewards, percent
    pub const DEFAULT_ELECTRICITY_PERCENT: f64 = 40.0;

    pub const DEFAULT_VIEWERS_MULTIPLIER: f64 = 1.0;

    /// Claim commission, percent
    pub const DEFAULT_CONVERT_COMMISSION: f64 = 5.0;

    /// Account receiving claim commissions
    pub const DEFAULT_FEE_ACCUMULATOR: &str = "fee-accumulator";

    pub const MAX_NFT_LEVEL: u8 = 3;

    pub const MIN_CRAFT_INPUTS: usize = 2;
}
