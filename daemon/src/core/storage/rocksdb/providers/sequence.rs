use crate::core::{
    error::EngineError,
    storage::{rocksdb::Column, RocksStorage, SequenceProvider},
};
use anyhow::Context;
use async_trait::async_trait;
use log::trace;

#[async_trait]
impl SequenceProvider for RocksStorage {
    async fn next_id(&mut self, key: &'static [u8]) -> Result<u64, EngineError> {
        // Two sessions allocating from the same sequence conflict at commit
        let id = self
            .load_tracked::<_, u64>(Column::Common, key)?
            .unwrap_or(1);
        if log::log_enabled!(log::Level::Trace) {
            trace!("next id {} for {}", id, String::from_utf8_lossy(key));
        }

        let next = id
            .checked_add(1)
            .with_context(|| format!("Sequence {} exhausted", String::from_utf8_lossy(key)))?;
        self.insert_into_disk(Column::Common, key, &next)?;
        Ok(id)
    }
}
