// Withdrawal requests and their approval state machine
//
// pending -> approved -> processing -> completed
// pending -> rejected
//
// Only a pending request can be approved or rejected. Completed and rejected
// are terminal.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::distribution::{Amount, BrandId, DistributorId, UserId};
use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use crate::time::TimestampMillis;

pub type WithdrawalId = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalError {
    #[error("Withdrawal {id} was already processed (status: {status})")]
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
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Processing,
    Completed,
    Rejected,
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    fn id(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Approved => 1,
            Self::Processing => 2,
            Self::Completed => 3,
            Self::Rejected => 4,
        }
    }
}

impl Serializer for WithdrawalStatus {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.id());
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => Self::Pending,
            1 => Self::Approved,
            2 => Self::Processing,
            3 => Self::Completed,
            4 => Self::Rejected,
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn size(&self) -> usize {
        1
    }
}

/// Where the funds are sent
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PayoutMethod {
    BankCard,
    Alipay,
    Wechat,
}

impl Serializer for PayoutMethod {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(match self {
            Self::BankCard => 0,
            Self::Alipay => 1,
            Self::Wechat => 2,
        });
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => Self::BankCard,
            1 => Self::Alipay,
            2 => Self::Wechat,
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn size(&self) -> usize {
        1
    }
}

/// Destination account details of a payout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayoutAccount {
    pub method: PayoutMethod,
    pub account_name: String,
    pub account_number: String,
    pub bank_name: Option<String>,
}

impl Serializer for PayoutAccount {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            method: PayoutMethod::read(reader)?,
            account_name: reader.read_string()?,
            account_number: reader.read_string()?,
            bank_name: reader.read()?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.method.write(writer);
        writer.write_string(&self.account_name);
        writer.write_string(&self.account_number);
        self.bank_name.write(writer);
    }
}

/// A cash-out of accumulated balance. The amount is debited on creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub user_id: UserId,
    pub brand_id: BrandId,
    pub distributor_id: DistributorId,
    pub amount: Amount,
    status: WithdrawalStatus,
    pub account: PayoutAccount,
    pub created_at: TimestampMillis,
    pub reviewer: Option<UserId>,
    pub reviewed_at: Option<TimestampMillis>,
    pub review_notes: Option<String>,
    /// External payment reference
    pub trade_no: Option<String>,
    pub paid_at: Option<TimestampMillis>,
}

impl WithdrawalRequest {
    pub fn new(
        id: WithdrawalId,
        user_id: UserId,
        brand_id: BrandId,
        distributor_id: DistributorId,
        amount: Amount,
        account: PayoutAccount,
        created_at: TimestampMillis,
    ) -> Self {
        Self {
            id,
            user_id,
            brand_id,
            distributor_id,
            amount,
            status: WithdrawalStatus::Pending,
            account,
            created_at,
            reviewer: None,
            reviewed_at: None,
            review_notes: None,
            trade_no: None,
            paid_at: None,
        }
    }

    pub fn status(&self) -> WithdrawalStatus {
        self.status
    }

    fn ensure_pending(&self) -> Result<(), WithdrawalError> {
        if self.status != WithdrawalStatus::Pending {
            return Err(WithdrawalError::AlreadyProcessed {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    fn transition(
        &mut self,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    ) -> Result<(), WithdrawalError> {
        if self.status != from {
            return Err(WithdrawalError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn approve(
        &mut self,
        reviewer: UserId,
        notes: Option<String>,
        now: TimestampMillis,
    ) -> Result<(), WithdrawalError> {
        self.ensure_pending()?;
        self.status = WithdrawalStatus::Approved;
        self.reviewer = Some(reviewer);
        self.reviewed_at = Some(now);
        self.review_notes = notes;
        Ok(())
    }

    pub fn reject(
        &mut self,
        reviewer: UserId,
        reason: Option<String>,
        now: TimestampMillis,
    ) -> Result<(), WithdrawalError> {
        self.ensure_pending()?;
        self.status = WithdrawalStatus::Rejected;
        self.reviewer = Some(reviewer);
        self.reviewed_at = Some(now);
        self.review_notes = reason;
        Ok(())
    }

    /// Funds handed to the payout channel
    pub fn mark_processing(&mut self) -> Result<(), WithdrawalError> {
        self.transition(WithdrawalStatus::Approved, WithdrawalStatus::Processing)
    }

    pub fn complete(
        &mut self,
        trade_no: String,
        paid_at: TimestampMillis,
    ) -> Result<(), WithdrawalError> {
        self.transition(WithdrawalStatus::Processing, WithdrawalStatus::Completed)?;
        self.trade_no = Some(trade_no);
        self.paid_at = Some(paid_at);
        Ok(())
    }
}

impl Serializer for WithdrawalRequest {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            id: reader.read_u64()?,
            user_id: reader.read_u64()?,
            brand_id: reader.read_u64()?,
            distributor_id: reader.read_u64()?,
            amount: reader.read_u64()?,
            status: WithdrawalStatus::read(reader)?,
            account: PayoutAccount::read(reader)?,
            created_at: reader.read_u64()?,
            reviewer: reader.read()?,
            reviewed_at: reader.read()?,
            review_notes: reader.read()?,
            trade_no: reader.read()?,
            paid_at: reader.read()?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.id);
        writer.write_u64(self.user_id);
        writer.write_u64(self.brand_id);
        writer.write_u64(self.distributor_id);
        writer.write_u64(self.amount);
        self.status.write(writer);
        self.account.write(writer);
        writer.write_u64(self.created_at);
        self.reviewer.write(writer);
        self.reviewed_at.write(writer);
        self.review_notes.write(writer);
        self.trade_no.write(writer);
        self.paid_at.write(writer);
    }
}
