//! Distributor tree against RocksStorage
//!
//! - Chain resolution order, depth bound and early stop
//! - Registration rules and subordinate counts
//! - Auto enrollment outcomes and degraded role grants

#![allow(clippy::disallowed_methods)]

mod common;

use std::sync::Arc;

use common::*;
use distrib_common::distribution::DistributorStatus;
use distrib_daemon::core::{
    config::EngineConfig,
    error::EngineError,
    external::SimulatedPayoutChannel,
    hierarchy::EnrollmentOutcome,
};
use tempdir::TempDir;

const BRAND: u64 = 11;
const OTHER_BRAND: u64 = 12;

#[tokio::test]
async fn test_resolve_chain_order_and_depth() {
    let temp_dir = TempDir::new("hierarchy_chain").unwrap();
    let engine = create_test_engine(&temp_dir);
    let line = register_line(&engine, BRAND, &[1, 2, 3, 4]).await;

    let chain = engine.resolve_chain(line[3].id, 3).await.unwrap();
    assert_eq!(chain, vec![line[3].id, line[2].id, line[1].id]);

    let chain = engine.resolve_chain(line[3].id, 1).await.unwrap();
    assert_eq!(chain, vec![line[3].id]);

    // Never deeper than the global maximum
    let chain = engine.resolve_chain(line[3].id, 10).await.unwrap();
    assert_eq!(chain.len(), 3);

    // Top of the tree
    let chain = engine.resolve_chain(line[0].id, 3).await.unwrap();
    assert_eq!(chain, vec![line[0].id]);

    assert!(engine.resolve_chain(9999, 3).await.unwrap().is_empty());
    assert!(engine.resolve_chain(line[0].id, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resolve_chain_stops_at_inactive() {
    let temp_dir = TempDir::new("hierarchy_inactive").unwrap();
    let engine = create_test_engine(&temp_dir);
    let line = register_line(&engine, BRAND, &[1, 2, 3]).await;

    engine.remove_distributor(line[1].id).await.unwrap();
    let chain = engine.resolve_chain(line[2].id, 3).await.unwrap();
    assert_eq!(chain, vec![line[2].id]);

    // Soft deleted records stay readable
    let removed = engine.get_distributor(line[1].id).await.unwrap().unwrap();
    assert!(removed.deleted);
    assert!(!removed.is_active());
    assert!(matches!(
        engine
            .set_distributor_status(line[1].id, DistributorStatus::Active)
            .await,
        Err(EngineError::DistributorNotFound(_))
    ));

    engine
        .set_distributor_status(line[2].id, DistributorStatus::Pending)
        .await
        .unwrap();
    assert!(engine.resolve_chain(line[2].id, 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_registration_rules() {
    let temp_dir = TempDir::new("hierarchy_registration").unwrap();
    let engine = create_test_engine(&temp_dir);
    let line = register_line(&engine, BRAND, &[1, 2]).await;

    assert_eq!(line[0].parent_id(), None);
    assert_eq!(line[1].parent_id(), Some(line[0].id));
    assert_ne!(line[0].id, line[1].id);

    let top = engine.get_distributor(line[0].id).await.unwrap().unwrap();
    assert_eq!(top.subordinate_count, 1);
    assert_eq!(
        engine.list_subordinates(line[0].id).await.unwrap(),
        vec![line[1].id]
    );

    // One record per user and brand
    let result = engine
        .register_distributor(2, BRAND, None, 1, DistributorStatus::Active)
        .await;
    assert!(matches!(
        result,
        Err(EngineError::DuplicateDistributor { user: 2, brand: BRAND })
    ));

    // Same user in another brand, the referrer has no record there
    let other = engine
        .register_distributor(2, OTHER_BRAND, Some(1), 1, DistributorStatus::Active)
        .await
        .unwrap();
    assert_eq!(other.parent_id(), None);
    assert_eq!(
        engine
            .get_distributor_by_user(2, OTHER_BRAND)
            .await
            .unwrap()
            .unwrap()
            .id,
        other.id
    );

    assert!(matches!(
        engine
            .register_distributor(5, BRAND, None, 4, DistributorStatus::Active)
            .await,
        Err(EngineError::Distribution(_))
    ));
}

#[tokio::test]
async fn test_auto_enroll_outcomes() {
    let temp_dir = TempDir::new("hierarchy_auto_enroll").unwrap();
    let engine = create_test_engine(&temp_dir);
    let line = register_line(&engine, BRAND, &[1]).await;

    let report = engine.auto_enroll(20, BRAND, Some(1), true).await.unwrap();
    let EnrollmentOutcome::Created(created) = &report.outcome else {
        panic!("expected a new distributor");
    };
    assert_eq!(created.parent_id(), Some(line[0].id));
    assert_eq!(created.level, 1);
    assert_eq!(created.status, DistributorStatus::Active);
    assert!(report.role_granted);

    let top = engine.get_distributor(line[0].id).await.unwrap().unwrap();
    assert_eq!(top.subordinate_count, 1);

    // Idempotent, even with another referrer
    let again = engine.auto_enroll(20, BRAND, None, true).await.unwrap();
    assert_eq!(again.outcome, EnrollmentOutcome::Existing(created.clone()));
    assert!(!again.role_granted);

    let disabled = engine.auto_enroll(21, BRAND, Some(1), false).await.unwrap();
    assert_eq!(disabled.outcome, EnrollmentOutcome::NotEligible);
    assert!(engine.get_distributor_by_user(21, BRAND).await.unwrap().is_none());

    // Referrer without an active record in the brand
    let orphan = engine.auto_enroll(22, BRAND, Some(77), true).await.unwrap();
    assert_eq!(orphan.outcome.distributor().unwrap().parent_id(), None);
}

#[tokio::test]
async fn test_auto_enroll_policy() {
    let temp_dir = TempDir::new("hierarchy_policy").unwrap();
    let config = EngineConfig {
        auto_enroll_status: DistributorStatus::Pending,
        auto_enroll_requires_referrer: true,
        ..Default::default()
    };
    let engine = create_test_engine_with(
        &temp_dir,
        config,
        Arc::new(FailingRoleGranter),
        Arc::new(SimulatedPayoutChannel),
    );
    register_line(&engine, BRAND, &[1]).await;

    let report = engine.auto_enroll(30, BRAND, None, true).await.unwrap();
    assert_eq!(report.outcome, EnrollmentOutcome::NotEligible);

    // The role grant fails but the enrollment stays committed
    let report = engine.auto_enroll(31, BRAND, Some(1), true).await.unwrap();
    assert!(!report.role_granted);
    let enrolled = engine.get_distributor_by_user(31, BRAND).await.unwrap().unwrap();
    assert_eq!(enrolled.status, DistributorStatus::Pending);
    assert_eq!(report.outcome, EnrollmentOutcome::Created(enrolled));
}
