use distrib_common::{
    account::BalanceError,
    distribution::{
        Amount, BrandId, CampaignId, DistributionError, DistributorId, UserId,
    },
    serializer::ReaderError,
    withdrawal::{WithdrawalError, WithdrawalId, WithdrawalStatus},
};
use strum::Display;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Display)]
pub enum DiskContext {
    LoadData,
    Withdrawal(WithdrawalId),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Data not found on disk: {0}")]
    NotFoundOnDisk(DiskContext),
    #[error("Snapshot already started")]
    SnapshotAlreadyStarted,
    #[error("Snapshot not started")]
    SnapshotNotStarted,
    // Another writer committed a key read by the transaction
    #[error("Commit conflict on column {0}")]
    CommitConflict(String),
    #[error("Concurrency exhausted on {resource} after {attempts} attempts")]
    ConcurrencyExhausted { resource: String, attempts: usize },
    #[error("Insufficient funds for user {user}: needed {needed}, available {available}")]
    InsufficientFunds {
        user: UserId,
        needed: Amount,
        available: Amount,
    },
    #[error("Balance overflow for user {0}")]
    BalanceOverflow(UserId),
    #[error("Withdrawal {id} already processed (status: {status})")]
    AlreadyProcessed {
        id: WithdrawalId,
        status: WithdrawalStatus,
    },
    #[error("Withdrawal {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: WithdrawalId,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },
    #[error("Distributor {0} not found")]
    DistributorNotFound(DistributorId),
    #[error("User {user} is not a distributor of brand {brand}")]
    NotADistributor { user: UserId, brand: BrandId },
    #[error("User {user} is already a distributor of brand {brand}")]
    DuplicateDistributor { user: UserId, brand: BrandId },
    #[error("Withdrawal {0} not found")]
    WithdrawalNotFound(WithdrawalId),
    #[error("Campaign {0} not found")]
    CampaignNotFound(CampaignId),
    #[error("Field {field} is {length} bytes long, maximum is {maximum}")]
    InvalidField {
        field: &'static str,
        length: usize,
        maximum: usize,
    },
    #[error("Invalid amount")]
    InvalidAmount,
    #[error("Withdrawal amount {amount} is below the minimum {minimum}")]
    BelowMinimumWithdrawal { amount: Amount, minimum: Amount },
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}

impl EngineError {
    // Transient faults, the whole operation can be run again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CommitConflict(_) | Self::ConcurrencyExhausted { .. }
        )
    }

    pub fn from_balance(user: UserId, error: BalanceError) -> Self {
        match error {
            BalanceError::InsufficientFunds { needed, available } => Self::InsufficientFunds {
                user,
                needed,
                available,
            },
            BalanceError::Overflow => Self::BalanceOverflow(user),
        }
    }
}

impl From<WithdrawalError> for EngineError {
    fn from(error: WithdrawalError) -> Self {
        match error {
            WithdrawalError::AlreadyProcessed { id, status } => {
                Self::AlreadyProcessed { id, status }
            }
            WithdrawalError::InvalidTransition { id, from, to } => {
                Self::InvalidTransition { id, from, to }
            }
        }
    }
}
