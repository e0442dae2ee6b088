//! Withdrawal workflow against RocksStorage
//!
//! - Funds reserved at submission, refunded on rejection
//! - Approval dispatches the payout and completes the request
//! - Reviews accepted only once
//! - Failed payout dispatch leaves the request in processing
//! - Text fields longer than the storage encoding allows are refused

#![allow(clippy::disallowed_methods)]

mod common;

use std::sync::Arc;

use common::*;
use distrib_common::{
    serializer::MAX_STRING_SIZE,
    withdrawal::{PayoutAccount, PayoutMethod, WithdrawalStatus},
};
use distrib_daemon::core::{
    config::EngineConfig,
    error::EngineError,
    external::{LoggingRoleGranter, SimulatedPayoutChannel},
    withdrawal::WithdrawalApplication,
};
use tempdir::TempDir;

const BRAND: u64 = 3;
const USER: u64 = 42;
const ADMIN: u64 = 1;

fn application(amount: u64) -> WithdrawalApplication {
    WithdrawalApplication {
        user_id: USER,
        brand_id: BRAND,
        amount,
        account: PayoutAccount {
            method: PayoutMethod::BankCard,
            account_name: "Bob".to_owned(),
            account_number: "6222020000000000".to_owned(),
            bank_name: Some("ICBC".to_owned()),
        },
    }
}

#[tokio::test]
async fn test_reject_restores_balance() {
    let temp_dir = TempDir::new("withdrawal_reject").unwrap();
    let engine = create_test_engine(&temp_dir);
    register_line(&engine, BRAND, &[USER]).await;
    engine.credit(USER, amount("1000.00")).await.unwrap();

    let request = engine
        .apply_withdrawal(application(amount("100.00")))
        .await
        .unwrap();
    assert_eq!(request.status(), WithdrawalStatus::Pending);
    assert_eq!(
        engine.get_balance(USER).await.unwrap().balance,
        amount("900.00")
    );

    let rejected = engine
        .reject_withdrawal(request.id, ADMIN, Some("wrong account".to_owned()))
        .await
        .unwrap();
    assert_eq!(rejected.status(), WithdrawalStatus::Rejected);
    assert_eq!(rejected.reviewer, Some(ADMIN));
    assert_eq!(rejected.review_notes.as_deref(), Some("wrong account"));

    let balance = engine.get_balance(USER).await.unwrap();
    assert_eq!(balance.balance, amount("1000.00"));
    // A refund is not a reward
    assert_eq!(balance.total_reward, amount("1000.00"));
    // Credit, debit then refund
    assert_eq!(balance.version, 3);
}

#[tokio::test]
async fn test_approve_completes_payout() {
    let temp_dir = TempDir::new("withdrawal_approve").unwrap();
    let engine = create_test_engine(&temp_dir);
    register_line(&engine, BRAND, &[USER]).await;
    engine.credit(USER, amount("1000.00")).await.unwrap();

    let request = engine
        .apply_withdrawal(application(amount("100.00")))
        .await
        .unwrap();
    let completed = engine
        .approve_withdrawal(request.id, ADMIN, None)
        .await
        .unwrap();
    assert_eq!(completed.status(), WithdrawalStatus::Completed);
    assert!(completed.trade_no.as_deref().unwrap().starts_with("WD"));
    assert!(completed.paid_at.is_some());

    let stored = engine.get_withdrawal(request.id).await.unwrap().unwrap();
    assert_eq!(stored, completed);
    assert_eq!(
        engine.get_balance(USER).await.unwrap().balance,
        amount("900.00")
    );
}

#[tokio::test]
async fn test_review_only_once() {
    let temp_dir = TempDir::new("withdrawal_once").unwrap();
    let engine = create_test_engine(&temp_dir);
    register_line(&engine, BRAND, &[USER]).await;
    engine.credit(USER, amount("500.00")).await.unwrap();

    let first = engine
        .apply_withdrawal(application(amount("100.00")))
        .await
        .unwrap();
    engine.approve_withdrawal(first.id, ADMIN, None).await.unwrap();

    let result = engine.reject_withdrawal(first.id, ADMIN, None).await;
    assert!(matches!(
        result,
        Err(EngineError::AlreadyProcessed {
            status: WithdrawalStatus::Completed,
            ..
        })
    ));

    let second = engine
        .apply_withdrawal(application(amount("100.00")))
        .await
        .unwrap();
    engine.reject_withdrawal(second.id, ADMIN, None).await.unwrap();
    let result = engine.approve_withdrawal(second.id, ADMIN, None).await;
    assert!(matches!(
        result,
        Err(EngineError::AlreadyProcessed {
            status: WithdrawalStatus::Rejected,
            ..
        })
    ));
    // Rejecting twice does not refund twice
    assert!(engine.reject_withdrawal(second.id, ADMIN, None).await.is_err());
    assert_eq!(
        engine.get_balance(USER).await.unwrap().balance,
        amount("400.00")
    );

    let listed = engine.list_withdrawals_for_user(USER).await.unwrap();
    assert_eq!(
        listed.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );
}

#[tokio::test]
async fn test_insufficient_funds() {
    let temp_dir = TempDir::new("withdrawal_funds").unwrap();
    let engine = create_test_engine(&temp_dir);
    register_line(&engine, BRAND, &[USER]).await;

    // Never credited
    let result = engine.apply_withdrawal(application(amount("1.00"))).await;
    assert!(matches!(
        result,
        Err(EngineError::InsufficientFunds { available: 0, .. })
    ));

    engine.credit(USER, amount("50.00")).await.unwrap();
    let result = engine.apply_withdrawal(application(amount("50.01"))).await;
    assert!(matches!(
        result,
        Err(EngineError::InsufficientFunds {
            user: USER,
            needed: 5001,
            available: 5000
        })
    ));

    // Nothing written by the refused requests
    assert!(engine.list_withdrawals_for_user(USER).await.unwrap().is_empty());
    assert_eq!(engine.get_balance(USER).await.unwrap().version, 1);

    // The whole balance can be withdrawn
    engine
        .apply_withdrawal(application(amount("50.00")))
        .await
        .unwrap();
    assert_eq!(engine.get_balance(USER).await.unwrap().balance, 0);
}

#[tokio::test]
async fn test_invalid_applications() {
    let temp_dir = TempDir::new("withdrawal_invalid").unwrap();
    let config = EngineConfig {
        min_withdrawal_amount: amount("10.00"),
        ..Default::default()
    };
    let engine = create_test_engine_with(
        &temp_dir,
        config,
        Arc::new(LoggingRoleGranter),
        Arc::new(SimulatedPayoutChannel),
    );
    engine.credit(USER, amount("100.00")).await.unwrap();

    // Not a distributor of the brand
    let result = engine.apply_withdrawal(application(amount("20.00"))).await;
    assert!(matches!(
        result,
        Err(EngineError::NotADistributor {
            user: USER,
            brand: BRAND
        })
    ));

    register_line(&engine, BRAND, &[USER]).await;
    assert!(matches!(
        engine.apply_withdrawal(application(0)).await,
        Err(EngineError::InvalidAmount)
    ));
    assert!(matches!(
        engine.apply_withdrawal(application(amount("9.99"))).await,
        Err(EngineError::BelowMinimumWithdrawal { .. })
    ));
    assert!(matches!(
        engine.approve_withdrawal(999, ADMIN, None).await,
        Err(EngineError::WithdrawalNotFound(999))
    ));
    assert_eq!(
        engine.get_balance(USER).await.unwrap().balance,
        amount("100.00")
    );
}

#[tokio::test]
async fn test_failed_dispatch_left_processing() {
    let temp_dir = TempDir::new("withdrawal_dispatch").unwrap();
    let engine = create_test_engine_with(
        &temp_dir,
        EngineConfig::default(),
        Arc::new(LoggingRoleGranter),
        Arc::new(FailingPayoutChannel),
    );
    register_line(&engine, BRAND, &[USER]).await;
    engine.credit(USER, amount("300.00")).await.unwrap();

    let request = engine
        .apply_withdrawal(application(amount("300.00")))
        .await
        .unwrap();
    let processing = engine
        .approve_withdrawal(request.id, ADMIN, Some("ok".to_owned()))
        .await
        .unwrap();
    assert_eq!(processing.status(), WithdrawalStatus::Processing);
    assert_eq!(processing.trade_no, None);

    // Cannot be rejected anymore, funds stay reserved
    assert!(matches!(
        engine.reject_withdrawal(request.id, ADMIN, None).await,
        Err(EngineError::AlreadyProcessed {
            status: WithdrawalStatus::Processing,
            ..
        })
    ));

    let completed = engine
        .complete_withdrawal(request.id, "GW-20240101-0001".to_owned())
        .await
        .unwrap();
    assert_eq!(completed.status(), WithdrawalStatus::Completed);
    assert_eq!(completed.trade_no.as_deref(), Some("GW-20240101-0001"));

    assert!(matches!(
        engine
            .complete_withdrawal(request.id, "GW-20240101-0002".to_owned())
            .await,
        Err(EngineError::InvalidTransition { .. })
    ));
    assert_eq!(engine.get_balance(USER).await.unwrap().balance, 0);
}

#[tokio::test]
async fn test_oversized_fields_refused() {
    let temp_dir = TempDir::new("withdrawal_oversized").unwrap();
    let engine = create_test_engine(&temp_dir);
    register_line(&engine, BRAND, &[USER]).await;
    engine.credit(USER, amount("500.00")).await.unwrap();

    let mut long_account = application(amount("100.00"));
    long_account.account.account_number = "6".repeat(70_000);
    assert!(matches!(
        engine.apply_withdrawal(long_account).await,
        Err(EngineError::InvalidField {
            field: "account_number",
            length: 70_000,
            maximum: MAX_STRING_SIZE,
        })
    ));

    let mut long_bank = application(amount("100.00"));
    long_bank.account.bank_name = Some("B".repeat(MAX_STRING_SIZE + 1));
    assert!(matches!(
        engine.apply_withdrawal(long_bank).await,
        Err(EngineError::InvalidField {
            field: "bank_name",
            ..
        })
    ));

    // Nothing reserved by the refused requests
    assert_eq!(
        engine.get_balance(USER).await.unwrap().balance,
        amount("500.00")
    );
    assert!(engine.list_withdrawals_for_user(USER).await.unwrap().is_empty());

    // The longest accepted value is stored as submitted
    let mut longest = application(amount("100.00"));
    longest.account.account_name = "A".repeat(MAX_STRING_SIZE);
    let request = engine.apply_withdrawal(longest).await.unwrap();
    let stored = engine.get_withdrawal(request.id).await.unwrap().unwrap();
    assert_eq!(stored.account.account_name.len(), MAX_STRING_SIZE);
    assert_eq!(stored, request);

    let notes = Some("n".repeat(MAX_STRING_SIZE + 1));
    assert!(matches!(
        engine.reject_withdrawal(request.id, ADMIN, notes.clone()).await,
        Err(EngineError::InvalidField {
            field: "review_notes",
            ..
        })
    ));
    assert!(matches!(
        engine.approve_withdrawal(request.id, ADMIN, notes).await,
        Err(EngineError::InvalidField {
            field: "review_notes",
            ..
        })
    ));
    let pending = engine.get_withdrawal(request.id).await.unwrap().unwrap();
    assert_eq!(pending.status(), WithdrawalStatus::Pending);
}

#[tokio::test]
async fn test_unrecorded_payout_can_be_completed() {
    let temp_dir = TempDir::new("withdrawal_unrecorded").unwrap();
    let engine = create_test_engine_with(
        &temp_dir,
        EngineConfig::default(),
        Arc::new(LoggingRoleGranter),
        Arc::new(OversizedReceiptChannel),
    );
    register_line(&engine, BRAND, &[USER]).await;
    engine.credit(USER, amount("200.00")).await.unwrap();

    let request = engine
        .apply_withdrawal(application(amount("200.00")))
        .await
        .unwrap();
    // Paid by the channel, but the receipt cannot be recorded
    assert!(matches!(
        engine.approve_withdrawal(request.id, ADMIN, None).await,
        Err(EngineError::InvalidField {
            field: "trade_no",
            ..
        })
    ));

    let stored = engine.get_withdrawal(request.id).await.unwrap().unwrap();
    assert_eq!(stored.status(), WithdrawalStatus::Processing);
    assert_eq!(stored.trade_no, None);

    let completed = engine
        .complete_withdrawal(request.id, "GW-20240102-0001".to_owned())
        .await
        .unwrap();
    assert_eq!(completed.status(), WithdrawalStatus::Completed);
    assert_eq!(engine.get_balance(USER).await.unwrap().balance, 0);
}
