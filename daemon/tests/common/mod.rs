// Common helpers for the RocksStorage backed engine tests
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use distrib_common::{
    distribution::{
        Amount, BrandId, CampaignId, CampaignSettings, Distributor, DistributorStatus,
        LevelRewardTable, RateBps, UserId, MAX_DISTRIBUTION_LEVEL,
    },
    serializer::MAX_STRING_SIZE,
    utils::parse_amount,
    withdrawal::WithdrawalRequest,
};
use distrib_daemon::core::{
    config::{EngineConfig, RocksDBConfig},
    engine::DistributionEngine,
    external::{PayoutChannel, PayoutReceipt, RoleGranter},
    storage::rocksdb::{CacheMode, CompressionMode, RocksStorage},
};
use tempdir::TempDir;

/// Create a RocksDBConfig with test defaults
pub fn test_rocksdb_config() -> RocksDBConfig {
    RocksDBConfig {
        parallelism: 2,
        max_background_jobs: 2,
        max_subcompaction_jobs: 1,
        low_priority_background_threads: 1,
        max_open_files: 100,
        keep_max_log_files: 1,
        compression_mode: CompressionMode::None,
        cache_mode: CacheMode::None,
        cache_size: 1024 * 1024,
        write_buffer_size: 1024 * 1024,
        write_buffer_shared: false,
    }
}

/// Create a test RocksStorage instance
pub fn create_test_storage(temp_dir: &TempDir) -> RocksStorage {
    let config = test_rocksdb_config();
    RocksStorage::new(temp_dir.path().to_str().unwrap(), &config).unwrap()
}

pub fn create_test_engine(temp_dir: &TempDir) -> DistributionEngine<RocksStorage> {
    DistributionEngine::with_defaults(create_test_storage(temp_dir), EngineConfig::default())
}

pub fn create_test_engine_with(
    temp_dir: &TempDir,
    config: EngineConfig,
    roles: Arc<dyn RoleGranter>,
    payouts: Arc<dyn PayoutChannel>,
) -> DistributionEngine<RocksStorage> {
    DistributionEngine::new(create_test_storage(temp_dir), config, roles, payouts)
}

/// Amount from a decimal string, such as `200.00`
pub fn amount(value: &str) -> Amount {
    parse_amount(value).unwrap()
}

pub async fn setup_campaign(
    engine: &DistributionEngine<RocksStorage>,
    campaign: CampaignId,
    brand: BrandId,
    max_level: u8,
    flat_rate: Option<RateBps>,
) -> CampaignSettings {
    let settings = CampaignSettings {
        campaign_id: campaign,
        brand_id: brand,
        enable_distribution: true,
        max_distribution_level: max_level,
        flat_reward_rate: flat_rate,
    };
    engine.set_campaign(settings.clone()).await.unwrap();
    settings
}

pub async fn setup_brand_rates(
    engine: &DistributionEngine<RocksStorage>,
    brand: BrandId,
    rates: &[RateBps],
) {
    engine
        .set_brand_level_rewards(brand, LevelRewardTable::new(rates.to_vec()))
        .await
        .unwrap();
}

/// Register active distributors, each one referred by the previous user.
/// Returns the records top of the tree first.
pub async fn register_line(
    engine: &DistributionEngine<RocksStorage>,
    brand: BrandId,
    users: &[UserId],
) -> Vec<Distributor> {
    let mut distributors = Vec::with_capacity(users.len());
    let mut referrer = None;
    for user in users {
        let distributor = engine
            .register_distributor(*user, brand, referrer, 1, DistributorStatus::Active)
            .await
            .unwrap();
        distributors.push(distributor);
        referrer = Some(*user);
    }
    distributors
}

pub const DEFAULT_MAX_LEVEL: u8 = MAX_DISTRIBUTION_LEVEL;

/// Role granter that always fails
pub struct FailingRoleGranter;

#[async_trait]
impl RoleGranter for FailingRoleGranter {
    async fn grant_distributor_role(&self, _: UserId, _: BrandId) -> anyhow::Result<()> {
        anyhow::bail!("permission service unavailable")
    }
}

/// Payout channel that always fails
pub struct FailingPayoutChannel;

#[async_trait]
impl PayoutChannel for FailingPayoutChannel {
    async fn dispatch(&self, request: &WithdrawalRequest) -> anyhow::Result<PayoutReceipt> {
        anyhow::bail!("gateway timeout for withdrawal {}", request.id)
    }
}

/// Payout channel that pays but answers with an unusable trade number
pub struct OversizedReceiptChannel;

#[async_trait]
impl PayoutChannel for OversizedReceiptChannel {
    async fn dispatch(&self, _: &WithdrawalRequest) -> anyhow::Result<PayoutReceipt> {
        Ok(PayoutReceipt {
            trade_no: "T".repeat(MAX_STRING_SIZE + 1),
            paid_at: 1,
        })
    }
}
