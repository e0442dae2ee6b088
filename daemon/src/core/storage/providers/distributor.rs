use crate::core::error::EngineError;
use async_trait::async_trait;
use distrib_common::distribution::{BrandId, Distributor, DistributorId, UserId};

/// Storage provider for distributor records and the parent tree
#[async_trait]
pub trait DistributorProvider {
    /// Get a distributor by its id, soft deleted records included
    async fn get_distributor(
        &self,
        id: DistributorId,
    ) -> Result<Option<Distributor>, EngineError>;

    /// Same as `get_distributor`, but the read is validated when the
    /// snapshot is committed. Use it before updating the record.
    async fn get_distributor_for_update(
        &mut self,
        id: DistributorId,
    ) -> Result<Option<Distributor>, EngineError>;

    /// Get the distributor of a user within a brand
    async fn get_distributor_by_user(
        &self,
        user: UserId,
        brand: BrandId,
    ) -> Result<Option<Distributor>, EngineError>;

    /// Store a new distributor and index it by user and by parent.
    ///
    /// # Errors
    /// * `DuplicateDistributor` - the user already has a record in this brand
    async fn create_distributor(&mut self, distributor: &Distributor) -> Result<(), EngineError>;

    /// Overwrite an existing distributor record.
    /// The parent link is never rewritten by callers, only counters and status.
    async fn update_distributor(&mut self, distributor: &Distributor) -> Result<(), EngineError>;

    /// Ids of the direct subordinates of a distributor, in id order
    async fn list_subordinates(
        &self,
        parent: DistributorId,
    ) -> Result<Vec<DistributorId>, EngineError>;
}
