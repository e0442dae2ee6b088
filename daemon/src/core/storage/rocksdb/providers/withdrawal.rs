use crate::core::{
    error::{DiskContext, EngineError},
    storage::{rocksdb::Column, RocksStorage, WithdrawalProvider},
};
use async_trait::async_trait;
use distrib_common::{
    distribution::UserId,
    withdrawal::{WithdrawalId, WithdrawalRequest},
};
use log::trace;

#[async_trait]
impl WithdrawalProvider for RocksStorage {
    async fn get_withdrawal(
        &self,
        id: WithdrawalId,
    ) -> Result<Option<WithdrawalRequest>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get withdrawal {}", id);
        }
        self.load_optional_from_disk(Column::Withdrawals, &id.to_be_bytes())
    }

    async fn get_withdrawal_for_update(
        &mut self,
        id: WithdrawalId,
    ) -> Result<Option<WithdrawalRequest>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get withdrawal {} for update", id);
        }
        self.load_tracked(Column::Withdrawals, &id.to_be_bytes())
    }

    async fn set_withdrawal(&mut self, request: &WithdrawalRequest) -> Result<(), EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!(
                "set withdrawal {} with status {}",
                request.id,
                request.status()
            );
        }

        self.insert_into_disk(Column::Withdrawals, request.id.to_be_bytes(), request)?;
        self.insert_into_disk(
            Column::WithdrawalsByUser,
            Self::get_pair_key(request.user_id, request.id),
            &(),
        )
    }

    async fn list_withdrawals_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<WithdrawalRequest>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("list withdrawals of user {}", user);
        }

        let entries = self.scan_prefix::<()>(Column::WithdrawalsByUser, &user.to_be_bytes())?;

        let mut requests = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            let id = Self::get_suffix_id(&key)?;
            let request = self
                .load_optional_from_disk(Column::Withdrawals, &id.to_be_bytes())?
                .ok_or(EngineError::NotFoundOnDisk(DiskContext::Withdrawal(id)))?;
            requests.push(request);
        }

        Ok(requests)
    }
}
