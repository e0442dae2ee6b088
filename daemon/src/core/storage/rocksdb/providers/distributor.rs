use crate::core::{
    error::EngineError,
    storage::{rocksdb::Column, DistributorProvider, RocksStorage},
};
use async_trait::async_trait;
use distrib_common::distribution::{BrandId, Distributor, DistributorId, UserId};
use log::trace;

#[async_trait]
impl DistributorProvider for RocksStorage {
    async fn get_distributor(
        &self,
        id: DistributorId,
    ) -> Result<Option<Distributor>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get distributor {}", id);
        }
        self.load_optional_from_disk(Column::Distributors, &id.to_be_bytes())
    }

    async fn get_distributor_for_update(
        &mut self,
        id: DistributorId,
    ) -> Result<Option<Distributor>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get distributor {} for update", id);
        }
        self.load_tracked(Column::Distributors, &id.to_be_bytes())
    }

    async fn get_distributor_by_user(
        &self,
        user: UserId,
        brand: BrandId,
    ) -> Result<Option<Distributor>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get distributor of user {} in brand {}", user, brand);
        }

        let key = Self::get_pair_key(user, brand);
        let id: Option<DistributorId> =
            self.load_optional_from_disk(Column::DistributorsByUser, &key)?;
        match id {
            Some(id) => self.get_distributor(id).await,
            None => Ok(None),
        }
    }

    async fn create_distributor(&mut self, distributor: &Distributor) -> Result<(), EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!(
                "create distributor {} for user {} in brand {}",
                distributor.id,
                distributor.user_id,
                distributor.brand_id
            );
        }

        // Tracked so that two concurrent enrollments of the same user conflict
        let index_key = Self::get_pair_key(distributor.user_id, distributor.brand_id);
        let existing: Option<DistributorId> =
            self.load_tracked(Column::DistributorsByUser, &index_key)?;
        if existing.is_some() {
            return Err(EngineError::DuplicateDistributor {
                user: distributor.user_id,
                brand: distributor.brand_id,
            });
        }

        self.insert_into_disk(Column::DistributorsByUser, index_key, &distributor.id)?;
        self.insert_into_disk(
            Column::Distributors,
            distributor.id.to_be_bytes(),
            distributor,
        )?;

        if let Some(parent) = distributor.parent_id() {
            self.insert_into_disk(
                Column::DistributorChildren,
                Self::get_pair_key(parent, distributor.id),
                &(),
            )?;
        }

        Ok(())
    }

    async fn update_distributor(&mut self, distributor: &Distributor) -> Result<(), EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("update distributor {}", distributor.id);
        }
        self.insert_into_disk(
            Column::Distributors,
            distributor.id.to_be_bytes(),
            distributor,
        )
    }

    async fn list_subordinates(
        &self,
        parent: DistributorId,
    ) -> Result<Vec<DistributorId>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("list subordinates of {}", parent);
        }

        let entries = self.scan_prefix::<()>(Column::DistributorChildren, &parent.to_be_bytes())?;
        entries
            .iter()
            .map(|(key, _)| Self::get_suffix_id(key))
            .collect()
    }
}
