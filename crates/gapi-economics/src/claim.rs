//! Claim validation against the rewards ledger
//!
//! The claimable balance is never stored; it is recomputed from the two
//! ledger aggregates on every claim.

use gapi_core::error::{EconomyError, Result};

/// `deposits - withdrawals`, floored at zero
pub fn claimable_balance(deposited: f64, withdrawn: f64) -> f64 {
    (deposited - withdrawn).max(0.0)
}

/// Accept `amount` only if it is at least `min_claim` and covered by the ledger
pub fn validate_claim(amount: f64, min_claim: f64, deposited: f64, withdrawn: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(EconomyError::InvalidParameter(format!(
            "claim amount must be positive, got {amount}"
        )));
    }
    if amount < min_claim {
        return Err(EconomyError::ClaimBelowMinimum {
            amount,
            minimum: min_claim,
        });
    }

    let claimable = claimable_balance(deposited, withdrawn);
    if amount > claimable {
        return Err(EconomyError::InsufficientBalance {
            required: amount,
            available: claimable,
        });
    }
    Ok(())
}
