use crate::{
    config::NEXT_WITHDRAWAL_ID_KEY,
    core::{
        error::EngineError,
        ledger,
        storage::{BalanceProvider, DistributorProvider, SequenceProvider, WithdrawalProvider},
    },
};
use distrib_common::{
    distribution::{Amount, BrandId, UserId},
    serializer::MAX_STRING_SIZE,
    time::TimestampMillis,
    withdrawal::{PayoutAccount, WithdrawalId, WithdrawalRequest},
};
use log::trace;

/// Withdrawal submitted by a distributor
#[derive(Debug, Clone)]
pub struct WithdrawalApplication {
    pub user_id: UserId,
    pub brand_id: BrandId,
    pub amount: Amount,
    pub account: PayoutAccount,
}

// Text stored on disk must fit the length prefix of the encoding
fn check_field(field: &'static str, value: &str) -> Result<(), EngineError> {
    if value.len() > MAX_STRING_SIZE {
        return Err(EngineError::InvalidField {
            field,
            length: value.len(),
            maximum: MAX_STRING_SIZE,
        });
    }
    Ok(())
}

fn check_account(account: &PayoutAccount) -> Result<(), EngineError> {
    check_field("account_name", &account.account_name)?;
    check_field("account_number", &account.account_number)?;
    if let Some(bank_name) = &account.bank_name {
        check_field("bank_name", bank_name)?;
    }
    Ok(())
}

/// Reserve the funds and store the request as pending.
/// Must be called within a snapshot.
pub async fn apply<S>(
    storage: &mut S,
    application: WithdrawalApplication,
    min_amount: Amount,
    now: TimestampMillis,
) -> Result<WithdrawalRequest, EngineError>
where
    S: DistributorProvider + BalanceProvider + SequenceProvider + WithdrawalProvider + ?Sized,
{
    let WithdrawalApplication {
        user_id,
        brand_id,
        amount,
        account,
    } = application;

    if amount == 0 {
        return Err(EngineError::InvalidAmount);
    }

    if amount < min_amount {
        return Err(EngineError::BelowMinimumWithdrawal {
            amount,
            minimum: min_amount,
        });
    }

    check_account(&account)?;

    let distributor = storage
        .get_distributor_by_user(user_id, brand_id)
        .await?
        .filter(|d| !d.deleted)
        .ok_or(EngineError::NotADistributor {
            user: user_id,
            brand: brand_id,
        })?;

    // Funds are reserved at submission
    ledger::debit(storage, user_id, amount).await?;

    let id = storage.next_id(NEXT_WITHDRAWAL_ID_KEY).await?;
    let request = WithdrawalRequest::new(
        id,
        user_id,
        brand_id,
        distributor.id,
        amount,
        account,
        now,
    );
    storage.set_withdrawal(&request).await?;

    Ok(request)
}

async fn load_for_update<S: WithdrawalProvider + ?Sized>(
    storage: &mut S,
    id: WithdrawalId,
) -> Result<WithdrawalRequest, EngineError> {
    storage
        .get_withdrawal_for_update(id)
        .await?
        .ok_or(EngineError::WithdrawalNotFound(id))
}

/// Approve a pending request and hand it to the payout channel.
/// The returned request is in `processing`.
pub async fn approve<S: WithdrawalProvider + ?Sized>(
    storage: &mut S,
    id: WithdrawalId,
    reviewer: UserId,
    notes: Option<String>,
    now: TimestampMillis,
) -> Result<WithdrawalRequest, EngineError> {
    if let Some(notes) = &notes {
        check_field("review_notes", notes)?;
    }

    let mut request = load_for_update(storage, id).await?;
    request.approve(reviewer, notes, now)?;
    request.mark_processing()?;
    storage.set_withdrawal(&request).await?;

    trace!("withdrawal {} approved by {}", id, reviewer);
    Ok(request)
}

/// Reject a pending request and give the reserved funds back
pub async fn reject<S: WithdrawalProvider + BalanceProvider + ?Sized>(
    storage: &mut S,
    id: WithdrawalId,
    reviewer: UserId,
    reason: Option<String>,
    now: TimestampMillis,
) -> Result<WithdrawalRequest, EngineError> {
    if let Some(reason) = &reason {
        check_field("review_notes", reason)?;
    }

    let mut request = load_for_update(storage, id).await?;
    request.reject(reviewer, reason, now)?;

    ledger::refund(storage, request.user_id, request.amount).await?;
    storage.set_withdrawal(&request).await?;

    trace!("withdrawal {} rejected by {}", id, reviewer);
    Ok(request)
}

/// Record the payment of a request in `processing`
pub async fn complete<S: WithdrawalProvider + ?Sized>(
    storage: &mut S,
    id: WithdrawalId,
    trade_no: String,
    paid_at: TimestampMillis,
) -> Result<WithdrawalRequest, EngineError> {
    check_field("trade_no", &trade_no)?;

    let mut request = load_for_update(storage, id).await?;
    request.complete(trade_no, paid_at)?;
    storage.set_withdrawal(&request).await?;

    Ok(request)
}
