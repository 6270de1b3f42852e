//! Reward claims and electricity settlement against real and failing payment backends

mod common;

use common::Harness;
use gapi_core::error::EconomyError;
use gapi_core::payment::{MockPaymentService, PaymentError};
use gapi_core::types::{GameResult, NftType, UserId};
use gapi_node::{LocalPayments, SettingValue};
use std::sync::Arc;

/// Play `wins` easy wins on a fresh common NFT; each pays 50 with the
/// multiplier at 5
async fn earn(h: &Harness, wins: usize) -> UserId {
    h.set("viewers_multiplier", SettingValue::Float(5.0));
    h.set("energy_full", SettingValue::Int(10));
    h.set("electricity_max_games", SettingValue::Int(10));
    let (user, _) = h.player_with_nft(NftType::Common, 1).await;
    for _ in 0..wins {
        h.service.start_game(&user, 1, false).await.unwrap();
        h.service
            .finish_game(&user, GameResult::Win.code(), 3)
            .await
            .unwrap();
    }
    user
}

#[tokio::test]
async fn test_claim_settles_with_commission() {
    let payments = Arc::new(LocalPayments::new());
    let h = Harness::new(payments.clone());
    let user = earn(&h, 2).await;

    let receipt = h.service.claim_rewards(&user, 40.0).await.unwrap();
    assert_eq!(receipt.amount, 40.0);
    assert_eq!(receipt.fee_percent, 5.0);
    assert!((receipt.claimable_after - 60.0).abs() < 1e-9);

    assert!((payments.balance_of(&user.to_string()) - 38.0).abs() < 1e-9);
    assert!((payments.balance_of("fee-accumulator") - 2.0).abs() < 1e-9);

    let balance = h.service.rewards_balance(&user).await.unwrap();
    assert!((balance.withdrawn - 40.0).abs() < 1e-9);
    assert!((balance.claimable - 60.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_claim_limits() {
    let h = Harness::new(Arc::new(LocalPayments::new()));
    let user = earn(&h, 1).await;

    assert!(matches!(
        h.service.claim_rewards(&user, 5.0).await,
        Err(EconomyError::ClaimBelowMinimum { .. })
    ));
    assert!(matches!(
        h.service.claim_rewards(&user, 50.5).await,
        Err(EconomyError::InsufficientBalance { .. })
    ));
    assert!(matches!(
        h.service.claim_rewards(&user, -1.0).await,
        Err(EconomyError::InvalidParameter(_))
    ));

    // the whole balance is claimable, and then nothing is
    h.service.claim_rewards(&user, 50.0).await.unwrap();
    assert!(matches!(
        h.service.claim_rewards(&user, 10.0).await,
        Err(EconomyError::InsufficientBalance { .. })
    ));
}

#[tokio::test]
async fn test_minimum_claim_follows_settings() {
    let h = Harness::new(Arc::new(LocalPayments::new()));
    let user = earn(&h, 1).await;
    h.set("min_rewards_to_claim", SettingValue::Int(60));

    assert!(matches!(
        h.service.claim_rewards(&user, 50.0).await,
        Err(EconomyError::ClaimBelowMinimum { minimum, .. }) if minimum == 60.0
    ));
}

#[tokio::test]
async fn test_failed_claim_keeps_balance() {
    let mut payments = MockPaymentService::new();
    payments.expect_get_balance().never();
    payments
        .expect_claim_rewards()
        .times(1)
        .returning(|_, _, _, _| Err(PaymentError::Unavailable("settlement offline".into())));
    let h = Harness::new(Arc::new(payments));
    let user = earn(&h, 1).await;

    assert!(matches!(
        h.service.claim_rewards(&user, 20.0).await,
        Err(EconomyError::SettlementFailed(_))
    ));
    let balance = h.service.rewards_balance(&user).await.unwrap();
    assert_eq!(balance.withdrawn, 0.0);
    assert!((balance.claimable - 50.0).abs() < 1e-9);
}

/// Balance checks pass, every debit is rejected
fn rejecting_payments() -> Arc<MockPaymentService> {
    let mut payments = MockPaymentService::new();
    payments.expect_get_balance().returning(|_| Ok(100.0));
    payments
        .expect_pay()
        .times(1)
        .returning(|_, _, _| Err(PaymentError::Rejected("card declined".into())));
    Arc::new(payments)
}

#[tokio::test]
async fn test_rejected_craft_payment_keeps_inputs() {
    let h = Harness::new(rejecting_payments());
    let (user, first) = h.player_with_nft(NftType::Common, 1).await;
    let second = h.grant_nft(user, NftType::Common, 2).await;
    let commits = h.ledger.stats().commits();

    assert!(matches!(
        h.service.craft_nft(&user, &[first.clone(), second.clone()]).await,
        Err(EconomyError::SettlementFailed(_))
    ));
    assert_eq!(h.ledger.stats().commits(), commits);

    let mut owned: Vec<_> = h
        .service
        .list_nfts(&user)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    owned.sort();
    let mut inputs = vec![first.clone(), second];
    inputs.sort();
    assert_eq!(owned, inputs);
    assert_eq!(
        h.service.get_player_info(&user).await.unwrap().selected_nft_id,
        Some(first)
    );
}

#[tokio::test]
async fn test_rejected_electricity_payment_keeps_counters() {
    let h = Harness::new(rejecting_payments());
    let user = earn(&h, 1).await;

    assert!(matches!(
        h.service.pay_for_electricity(&user).await,
        Err(EconomyError::SettlementFailed(_))
    ));
    let info = h.service.get_player_info(&user).await.unwrap();
    assert!((info.electricity_costs - 20.0).abs() < 1e-9);
    assert_eq!(info.electricity_spent, 1);
}

#[tokio::test]
async fn test_pay_for_electricity_resets_counters() {
    let payments = Arc::new(LocalPayments::new());
    let h = Harness::new(payments.clone());
    let user = earn(&h, 1).await;
    payments.fund(&user, 25.0);

    // default 40% of 50
    let paid = h.service.pay_for_electricity(&user).await.unwrap();
    assert!((paid.amount - 20.0).abs() < 1e-9);
    assert!(paid.tx_ref.is_some());
    assert!((payments.balance_of(&user.to_string()) - 5.0).abs() < 1e-9);

    let info = h.service.get_player_info(&user).await.unwrap();
    assert_eq!(info.electricity_costs, 0.0);
    assert_eq!(info.electricity_spent, 0);
}

#[tokio::test]
async fn test_unfunded_electricity_payment_rolls_back() {
    let payments = Arc::new(LocalPayments::new());
    let h = Harness::new(payments.clone());
    let user = earn(&h, 1).await;
    payments.fund(&user, 5.0);

    assert!(matches!(
        h.service.pay_for_electricity(&user).await,
        Err(EconomyError::InsufficientBalance { .. })
    ));
    let info = h.service.get_player_info(&user).await.unwrap();
    assert!((info.electricity_costs - 20.0).abs() < 1e-9);
    assert_eq!(info.electricity_spent, 1);
    assert!(payments.transfers().is_empty());
}

#[tokio::test]
async fn test_zero_cost_payment_unblocks_games() {
    let mut payments = MockPaymentService::new();
    payments.expect_get_balance().never();
    payments.expect_pay().never();
    let h = Harness::new(Arc::new(payments));
    h.set("electricity_percent_mode", SettingValue::Text("win".into()));
    h.set("electricity_max_games", SettingValue::Int(1));
    let (user, _) = h.player_with_nft(NftType::Common, 1).await;

    h.service.start_game(&user, 1, false).await.unwrap();
    h.service
        .finish_game(&user, GameResult::Lose.code(), 0)
        .await
        .unwrap();
    assert!(matches!(
        h.service.start_game(&user, 1, false).await,
        Err(EconomyError::NotEnoughElectricity { .. })
    ));

    let paid = h.service.pay_for_electricity(&user).await.unwrap();
    assert_eq!(paid.amount, 0.0);
    assert_eq!(paid.tx_ref, None);
    h.service.start_game(&user, 1, false).await.unwrap();
}

#[tokio::test]
async fn test_paid_pack_debits_buyer() {
    let payments = Arc::new(LocalPayments::new());
    let h = Harness::new(payments.clone());
    let pack = h.pack(30.0).await;
    let user = UserId::new();

    assert!(matches!(
        h.service.buy_nft_pack(&user, &pack).await,
        Err(EconomyError::InsufficientBalance { .. })
    ));
    assert!(h.service.list_nfts(&user).await.unwrap().is_empty());

    payments.fund(&user, 45.0);
    let nft = h.service.buy_nft_pack(&user, &pack).await.unwrap();
    assert_eq!(payments.balance_of(&user.to_string()), 15.0);
    assert_eq!(payments.balance_of("treasury"), 30.0);

    let status = h.service.get_player_status(&user).await.unwrap();
    assert_eq!(status.balance, Some(15.0));
    assert_eq!(status.nfts, vec![nft]);
}
