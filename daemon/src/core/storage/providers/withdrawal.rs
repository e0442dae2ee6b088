use crate::core::error::EngineError;
use async_trait::async_trait;
use distrib_common::{
    distribution::UserId,
    withdrawal::{WithdrawalId, WithdrawalRequest},
};

#[async_trait]
pub trait WithdrawalProvider {
    async fn get_withdrawal(
        &self,
        id: WithdrawalId,
    ) -> Result<Option<WithdrawalRequest>, EngineError>;

    // Tracked read, a concurrent review of the same request makes the commit fail
    async fn get_withdrawal_for_update(
        &mut self,
        id: WithdrawalId,
    ) -> Result<Option<WithdrawalRequest>, EngineError>;

    // Insert or update a request
    async fn set_withdrawal(&mut self, request: &WithdrawalRequest) -> Result<(), EngineError>;

    // Requests of a user, oldest first
    async fn list_withdrawals_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<WithdrawalRequest>, EngineError>;
}
