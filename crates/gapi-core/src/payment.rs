//! External payment / settlement contract
//!
//! Balances, debits and reward claims are settled by a service outside this
//! workspace. The economy engine only calls it from inside an open ledger
//! transaction and rolls back when it fails.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::error::EconomyError;
use crate::types::UserId;

/// Reference returned by the settlement service for a completed transfer
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxRef(pub String);

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fee recipients and their share of the fee, in percent
pub type FeeDistribution = BTreeMap<String, f64>;

/// Memo attached to debits
pub mod memo {
    pub const NFT_PACK: &str = "nft pack purchase";
    pub const CRAFT: &str = "nft craft";
    pub const ELECTRICITY: &str = "electricity payment";
}

/// Settlement failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("payment rejected: {0}")]
    Rejected(String),

    #[error("payment service unavailable: {0}")]
    Unavailable(String),
}

/// Collaborator failures surface as balance or settlement errors
impl From<PaymentError> for EconomyError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InsufficientFunds {
                required,
                available,
            } => EconomyError::InsufficientBalance {
                required,
                available,
            },
            other => EconomyError::SettlementFailed(other.to_string()),
        }
    }
}

#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait PaymentService: Send + Sync {
    async fn get_balance(&self, user_id: &UserId) -> Result<f64, PaymentError>;

    /// Generic debit
    async fn pay(&self, user_id: &UserId, amount: f64, memo: &str) -> Result<TxRef, PaymentError>;

    /// Pay out claimed rewards, withholding `fee_percent` split per `fee_distribution`
    async fn claim_rewards(
        &self,
        user_id: &UserId,
        amount: f64,
        fee_percent: f64,
        fee_distribution: &FeeDistribution,
    ) -> Result<TxRef, PaymentError>;
}
