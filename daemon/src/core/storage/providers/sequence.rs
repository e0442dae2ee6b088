use crate::core::error::EngineError;
use async_trait::async_trait;

#[async_trait]
pub trait SequenceProvider {
    // Allocate the next id of a sequence, starting at 1
    // Must be called within a snapshot
    async fn next_id(&mut self, key: &'static [u8]) -> Result<u64, EngineError>;
}
