use crate::core::{
    error::EngineError,
    storage::{rocksdb::Snapshot, RocksStorage, SnapshotProvider},
};
use async_trait::async_trait;
use log::{debug, trace};

#[async_trait]
impl SnapshotProvider for RocksStorage {
    async fn start_snapshot(&mut self) -> Result<(), EngineError> {
        trace!("starting snapshot");
        if self.snapshot.is_some() {
            return Err(EngineError::SnapshotAlreadyStarted);
        }

        self.snapshot = Some(Snapshot::new());
        Ok(())
    }

    async fn end_snapshot(&mut self, apply: bool) -> Result<(), EngineError> {
        trace!("end snapshot");
        let snapshot = self
            .snapshot
            .take()
            .ok_or(EngineError::SnapshotNotStarted)?;

        if apply {
            trace!("applying snapshot");
            self.commit_snapshot(snapshot).await?;
        } else {
            debug!("discarding snapshot");
        }

        Ok(())
    }
}
