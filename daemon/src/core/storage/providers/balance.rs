use crate::core::error::EngineError;
use async_trait::async_trait;
use distrib_common::{
    account::{BalanceMutation, UserBalance, WriteOutcome},
    distribution::UserId,
};

#[async_trait]
pub trait BalanceProvider {
    // Get the balance row of a user, None if never credited
    async fn get_user_balance(&self, user: UserId) -> Result<Option<UserBalance>, EngineError>;

    /// Conditional write of a balance row.
    ///
    /// The mutation is applied only if the stored version still equals
    /// `expected_version`, otherwise `WriteOutcome::Conflict` is returned and
    /// nothing is written. A refused debit is an `InsufficientFunds` error.
    async fn write_user_balance(
        &mut self,
        user: UserId,
        expected_version: u64,
        mutation: BalanceMutation,
    ) -> Result<WriteOutcome, EngineError>;
}
