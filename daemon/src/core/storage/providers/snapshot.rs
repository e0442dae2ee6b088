use crate::core::error::EngineError;
use async_trait::async_trait;

#[async_trait]
pub trait SnapshotProvider {
    // Start a snapshot
    // Every write until `end_snapshot` is kept in memory
    async fn start_snapshot(&mut self) -> Result<(), EngineError>;

    // Apply the batch to the storage, or discard it
    // Applying fails with a commit conflict if a tracked read is stale
    async fn end_snapshot(&mut self, apply: bool) -> Result<(), EngineError>;
}
