//! # gapi Core
//!
//! Core data structures for the gapi play-to-earn economy engine.
//!
//! This crate provides the building blocks shared by every other crate:
//! - `Player` - energy, electricity and selection state of one player
//! - `Nft` / `NftPack` - minted items and the pack templates they come from
//! - `GameSession` - one play attempt, `InProgress -> Finished(win|lose)`
//! - `RewardEntry` - append-only rewards ledger row
//! - `ConfigProvider` / `PaymentService` - the external collaborators
//!
//! ## Flow
//!
//! ```text
//!   request ──► GameEconomyService ──► ConfigProvider (tunables)
//!                      │
//!                      ├──► ledger transaction (players, nfts, sessions, rewards)
//!                      │
//!                      └──► PaymentService (debit / claim, before commit)
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod payment;
pub mod types;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use payment::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::{ConfigError, ConfigProvider};
    pub use crate::error::{EconomyError, Result};
    pub use crate::payment::{FeeDistribution, PaymentError, PaymentService, TxRef};
    pub use crate::types::*;
}
