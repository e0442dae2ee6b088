mod providers;

pub mod rocksdb;
pub mod snapshot;

pub use self::{providers::*, rocksdb::RocksStorage};

use crate::core::error::EngineError;
use async_trait::async_trait;

#[async_trait]
pub trait Storage:
    DistributorProvider
    + RewardProvider
    + BalanceProvider
    + WithdrawalProvider
    + CampaignProvider
    + SequenceProvider
    + SnapshotProvider
    + Sync
    + Send
    + 'static
{
    // Open a new session over the same database
    // Sessions share the committed state but never the pending snapshot
    fn new_session(&self) -> Self
    where
        Self: Sized;

    // Get the size of the DB on disk in bytes
    async fn get_size_on_disk(&self) -> Result<u64, EngineError>;

    // Compact and flush the inner DB
    async fn flush(&mut self) -> Result<(), EngineError>;
}
