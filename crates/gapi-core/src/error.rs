//! Error types for gapi economy operations

use crate::types::NftType;
use thiserror::Error;

/// Result type alias for economy operations
pub type Result<T> = std::result::Result<T, EconomyError>;

/// Errors surfaced by the economy engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EconomyError {
    // === Lookup ===
    /// Player, session, NFT, pack or character absent
    #[error("Not found: {0}")]
    NotFound(String),

    // === Validation ===
    /// Malformed id or out-of-range argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Session difficulty above the NFT's ceiling
    #[error("NFT max level {max_level} is below complexity {complexity}")]
    LevelMismatch { max_level: u8, complexity: u8 },

    /// Unknown session outcome code
    #[error("Invalid game result code: {0}")]
    InvalidResult(i32),

    // === Economy ===
    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Not enough electricity: {spent} of {max_games} games already played")]
    NotEnoughElectricity { spent: i32, max_games: i32 },

    #[error("Not enough energy")]
    NotEnoughEnergy,

    #[error("Claim of {amount} is below the minimum of {minimum}")]
    ClaimBelowMinimum { amount: f64, minimum: f64 },

    // === Crafting ===
    /// Fewer than two crafting inputs
    #[error("Crafting needs at least 2 NFTs, got {0}")]
    InvalidCraftInput(usize),

    #[error("Cannot craft beyond {0}")]
    CannotCraftFurther(NftType),

    #[error("Not all NFTs found: requested {requested}, found {found}")]
    NotAllNftsFound { requested: usize, found: usize },

    // === Sessions ===
    #[error("A game session is already in progress")]
    SessionInProgress,

    #[error("No game session in progress")]
    NoActiveSession,

    // === Collaborators ===
    /// External payment or claim rejected
    #[error("Settlement failed: {0}")]
    SettlementFailed(String),

    /// Storage-layer commit/rollback failure
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error codes for transport responses
impl EconomyError {
    pub fn code(&self) -> u32 {
        match self {
            Self::NotFound(_) => 1001,
            Self::InvalidParameter(_) => 1002,
            Self::LevelMismatch { .. } => 1003,
            Self::InvalidResult(_) => 1004,
            Self::InsufficientBalance { .. } => 2001,
            Self::NotEnoughElectricity { .. } => 2002,
            Self::NotEnoughEnergy => 2003,
            Self::ClaimBelowMinimum { .. } => 2004,
            Self::InvalidCraftInput(_) => 3001,
            Self::CannotCraftFurther(_) => 3002,
            Self::NotAllNftsFound { .. } => 3003,
            Self::SessionInProgress => 4001,
            Self::NoActiveSession => 4002,
            Self::SettlementFailed(_) => 5001,
            Self::TransactionFailed(_) => 5002,
            Self::Timeout(_) => 5003,
            Self::Config(_) => 9999,
        }
    }

    /// Worth retrying unchanged
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TransactionFailed(_) | Self::Timeout(_) | Self::SettlementFailed(_)
        )
    }

    /// Shown verbatim to the player so the client can act on it
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. }
                | Self::NotEnoughElectricity { .. }
                | Self::NotEnoughEnergy
                | Self::ClaimBelowMinimum { .. }
                | Self::InvalidCraftInput(_)
                | Self::CannotCraftFurther(_)
                | Self::NotAllNftsFound { .. }
                | Self::LevelMismatch { .. }
                | Self::SettlementFailed(_)
        )
    }
}
