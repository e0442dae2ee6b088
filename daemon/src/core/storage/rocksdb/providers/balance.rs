use crate::core::{
    error::EngineError,
    storage::{rocksdb::Column, BalanceProvider, RocksStorage},
};
use async_trait::async_trait;
use distrib_common::{
    account::{attempt_write, BalanceMutation, UserBalance, WriteOutcome},
    distribution::UserId,
};
use log::trace;

#[async_trait]
impl BalanceProvider for RocksStorage {
    async fn get_user_balance(&self, user: UserId) -> Result<Option<UserBalance>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get balance of user {}", user);
        }
        self.load_optional_from_disk(Column::Balances, &user.to_be_bytes())
    }

    async fn write_user_balance(
        &mut self,
        user: UserId,
        expected_version: u64,
        mutation: BalanceMutation,
    ) -> Result<WriteOutcome, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!(
                "write balance of user {} at version {}: {:?}",
                user,
                expected_version,
                mutation
            );
        }

        let key = user.to_be_bytes();
        let current: Option<UserBalance> = self.load_tracked(Column::Balances, &key)?;
        let outcome = attempt_write(current.as_ref(), user, expected_version, mutation)
            .map_err(|e| EngineError::from_balance(user, e))?;

        if let WriteOutcome::Applied(balance) = &outcome {
            self.insert_into_disk(Column::Balances, key, balance)?;
        }

        Ok(outcome)
    }
}
