//! # gapi Node
//!
//! Service host for the gapi game economy.
//!
//! - `config` - static `gapi.toml` configuration with `GAPI_` overrides
//! - `settings` - live admin-editable settings, the [`ConfigProvider`] behind every tunable
//! - `tunables` - typed tunable reads with hard-coded fallbacks
//! - `service` - [`GameEconomyService`], the player-facing operations
//! - `admin` - catalogue management and settings pass-through
//! - `payment` - [`LocalPayments`], in-memory wallets for simulation and tests
//!
//! [`ConfigProvider`]: gapi_core::config::ConfigProvider

pub mod admin;
pub mod config;
pub mod error;
pub mod node;
pub mod payment;
pub mod service;
pub mod settings;
pub mod tunables;

pub use admin::{AdminService, PackDraft};
pub use config::NodeConfig;
pub use error::NodeError;
pub use node::EconomyNode;
pub use payment::LocalPayments;
pub use service::{
    ClaimReceipt, ElectricityPayment, EnergyProjection, FinishedGame, GameEconomyService,
    PlayerInfo, PlayerStatus, RewardsBalance, ServiceLimits, StartedGame,
};
pub use settings::{LiveSettings, SettingValue};
pub use tunables::{Tunables, TunablesSnapshot};
