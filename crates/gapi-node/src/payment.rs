//! In-process payment service
//!
//! Keeps one wallet per account in memory. Used by the `gapi simulate`
//! command and the end-to-end tests in place of the external settlement
//! service.

use async_trait::async_trait;
use gapi_core::payment::{FeeDistribution, PaymentError, PaymentService, TxRef};
use gapi_core::types::UserId;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Account debits are paid into and claims are paid out of
pub const TREASURY: &str = "treasury";

/// One settled movement of funds
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transfer {
    pub tx_ref: TxRef,
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub memo: String,
}

/// In-memory wallets keyed by account name
#[derive(Debug, Default)]
pub struct LocalPayments {
    wallets: RwLock<HashMap<String, f64>>,
    transfers: RwLock<Vec<Transfer>>,
    next_ref: AtomicU64,
}

impl LocalPayments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a player's wallet
    pub fn fund(&self, user_id: &UserId, amount: f64) {
        *self.wallets.write().entry(user_id.to_string()).or_default() += amount;
    }

    pub fn balance_of(&self, account: &str) -> f64 {
        self.wallets.read().get(account).copied().unwrap_or_default()
    }

    /// Settled transfers, oldest first
    pub fn transfers(&self) -> Vec<Transfer> {
        self.transfers.read().clone()
    }

    fn next_tx_ref(&self) -> TxRef {
        TxRef(format!("local-{}", self.next_ref.fetch_add(1, Ordering::Relaxed) + 1))
    }

    fn record(&self, from: &str, to: &str, amount: f64, memo: &str) -> TxRef {
        let tx_ref = self.next_tx_ref();
        self.transfers.write().push(Transfer {
            tx_ref: tx_ref.clone(),
            from: from.to_string(),
            to: to.to_string(),
            amount,
            memo: memo.to_string(),
        });
        tx_ref
    }
}

fn check_amount(amount: f64) -> Result<(), PaymentError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(PaymentError::Rejected(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

#[async_trait]
impl PaymentService for LocalPayments {
    async fn get_balance(&self, user_id: &UserId) -> Result<f64, PaymentError> {
        Ok(self.balance_of(&user_id.to_string()))
    }

    async fn pay(&self, user_id: &UserId, amount: f64, memo: &str) -> Result<TxRef, PaymentError> {
        check_amount(amount)?;
        let account = user_id.to_string();
        {
            let mut wallets = self.wallets.write();
            let available = wallets.get(&account).copied().unwrap_or_default();
            if available < amount {
                return Err(PaymentError::InsufficientFunds {
                    required: amount,
                    available,
                });
            }
            wallets.insert(account.clone(), available - amount);
            *wallets.entry(TREASURY.to_string()).or_default() += amount;
        }

        let tx_ref = self.record(&account, TREASURY, amount, memo);
        tracing::debug!(user = %user_id, amount, memo, tx = %tx_ref, "local payment settled");
        Ok(tx_ref)
    }

    async fn claim_rewards(
        &self,
        user_id: &UserId,
        amount: f64,
        fee_percent: f64,
        fee_distribution: &FeeDistribution,
    ) -> Result<TxRef, PaymentError> {
        check_amount(amount)?;
        if !(0.0..=100.0).contains(&fee_percent) {
            return Err(PaymentError::Rejected(format!(
                "fee percent out of range: {fee_percent}"
            )));
        }
        let shares: f64 = fee_distribution.values().sum();
        if shares > 100.0 + f64::EPSILON {
            return Err(PaymentError::Rejected(format!(
                "fee distribution exceeds 100%: {shares}"
            )));
        }

        let fee = amount * fee_percent / 100.0;
        let payout = amount - fee;
        let account = user_id.to_string();
        {
            let mut wallets = self.wallets.write();
            *wallets.entry(account.clone()).or_default() += payout;
            for (recipient, share) in fee_distribution {
                *wallets.entry(recipient.clone()).or_default() += fee * share / 100.0;
            }
        }

        for (recipient, share) in fee_distribution {
            self.record(TREASURY, recipient, fee * share / 100.0, "claim fee");
        }
        let tx_ref = self.record(TREASURY, &account, payout, "rewards claim");
        tracing::debug!(user = %user_id, amount, fee, tx = %tx_ref, "local claim settled");
        Ok(tx_ref)
    }
}
