// Distribution record data structures

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::{
    Amount, BrandId, CampaignId, DistributionError, DistributorId, OrderId, RateBps, UserId,
    MAX_DISTRIBUTION_LEVEL,
};
use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use crate::time::TimestampMillis;

/// Standing of a distributor within its brand program
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DistributorStatus {
    Pending,
    Active,
    Suspended,
}

impl DistributorStatus {
    fn id(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Active => 1,
            Self::Suspended => 2,
        }
    }
}

impl Serializer for DistributorStatus {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.id());
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => Self::Pending,
            1 => Self::Active,
            2 => Self::Suspended,
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn size(&self) -> usize {
        1
    }
}

/// One user's enrollment in one brand's referral program
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Distributor {
    pub id: DistributorId,

    /// Owning user, unique together with the brand
    pub user_id: UserId,

    pub brand_id: BrandId,

    /// Position assigned at enrollment, never recomputed from the parent depth
    pub level: u8,

    /// Referrer, assigned once at creation
    parent_id: Option<DistributorId>,

    pub status: DistributorStatus,

    /// Cumulative earnings, only ever increased
    pub total_earnings: Amount,

    /// Cached count of direct subordinates
    pub subordinate_count: u32,

    /// Soft delete flag
    pub deleted: bool,

    pub created_at: TimestampMillis,
}

impl Distributor {
    /// Create a new distributor record. The parent cannot be changed afterward.
    pub fn new(
        id: DistributorId,
        user_id: UserId,
        brand_id: BrandId,
        level: u8,
        parent_id: Option<DistributorId>,
        status: DistributorStatus,
        created_at: TimestampMillis,
    ) -> Result<Self, DistributionError> {
        if level == 0 || level > MAX_DISTRIBUTION_LEVEL {
            return Err(DistributionError::InvalidLevel(level));
        }

        if parent_id == Some(id) {
            return Err(DistributionError::SelfParent(id));
        }

        Ok(Self {
            id,
            user_id,
            brand_id,
            level,
            parent_id,
            status,
            total_earnings: 0,
            subordinate_count: 0,
            deleted: false,
            created_at,
        })
    }

    pub fn parent_id(&self) -> Option<DistributorId> {
        self.parent_id
    }

    /// Active and not soft deleted
    pub fn is_active(&self) -> bool {
        !self.deleted && self.status == DistributorStatus::Active
    }

    /// Add a settled reward to the cumulative earnings
    pub fn add_earnings(&mut self, amount: Amount) -> Result<(), DistributionError> {
        self.total_earnings = self
            .total_earnings
            .checked_add(amount)
            .ok_or(DistributionError::EarningsOverflow(self.id))?;
        Ok(())
    }

    pub fn increment_subordinate_count(&mut self) {
        self.subordinate_count = self.subordinate_count.saturating_add(1);
    }
}

impl Serializer for Distributor {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let id = reader.read_u64()?;
        let user_id = reader.read_u64()?;
        let brand_id = reader.read_u64()?;
        let level = reader.read_u8()?;
        let parent_id = Option::<DistributorId>::read(reader)?;
        let status = DistributorStatus::read(reader)?;
        let total_earnings = reader.read_u64()?;
        let subordinate_count = reader.read_u32()?;
        let deleted = reader.read_bool()?;
        let created_at = reader.read_u64()?;

        if level == 0 || level > MAX_DISTRIBUTION_LEVEL || parent_id == Some(id) {
            return Err(ReaderError::InvalidValue);
        }

        Ok(Self {
            id,
            user_id,
            brand_id,
            level,
            parent_id,
            status,
            total_earnings,
            subordinate_count,
            deleted,
            created_at,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.id);
        writer.write_u64(self.user_id);
        writer.write_u64(self.brand_id);
        writer.write_u8(self.level);
        self.parent_id.write(writer);
        self.status.write(writer);
        writer.write_u64(self.total_earnings);
        writer.write_u32(self.subordinate_count);
        writer.write_bool(self.deleted);
        writer.write_u64(self.created_at);
    }

    fn size(&self) -> usize {
        8 + 8 + 8 + 1 + self.parent_id.size() + 1 + 8 + 4 + 1 + 8
    }
}

/// Settlement state of a reward entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RewardStatus {
    Settled,
}

impl Serializer for RewardStatus {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(0);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        match reader.read_u8()? {
            0 => Ok(Self::Settled),
            _ => Err(ReaderError::InvalidValue),
        }
    }

    fn size(&self) -> usize {
        1
    }
}

/// Immutable commission entry for one (order, distributor) pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardRecord {
    pub distributor_id: DistributorId,

    /// User credited with the reward
    pub beneficiary: UserId,

    pub order_id: OrderId,

    pub campaign_id: CampaignId,

    /// Position in the chain at settlement time (1 = direct referrer)
    pub level: u8,

    pub rate: RateBps,

    pub amount: Amount,

    pub status: RewardStatus,

    pub settled_at: TimestampMillis,

    /// User who placed the order
    pub purchaser: Option<UserId>,
}

impl Serializer for RewardRecord {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            distributor_id: reader.read_u64()?,
            beneficiary: reader.read_u64()?,
            order_id: reader.read_u64()?,
            campaign_id: reader.read_u64()?,
            level: reader.read_u8()?,
            rate: reader.read_u16()?,
            amount: reader.read_u64()?,
            status: RewardStatus::read(reader)?,
            settled_at: reader.read_u64()?,
            purchaser: reader.read()?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.distributor_id);
        writer.write_u64(self.beneficiary);
        writer.write_u64(self.order_id);
        writer.write_u64(self.campaign_id);
        writer.write_u8(self.level);
        writer.write_u16(self.rate);
        writer.write_u64(self.amount);
        self.status.write(writer);
        writer.write_u64(self.settled_at);
        self.purchaser.write(writer);
    }

    fn size(&self) -> usize {
        8 + 8 + 8 + 8 + 1 + 2 + 8 + 1 + 8 + self.purchaser.size()
    }
}

/// Written once per order when its settlement commits with at least one entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettlementMarker {
    pub order_id: OrderId,
    pub campaign_id: CampaignId,
    pub entries: u8,
    pub total_amount: Amount,
    pub settled_at: TimestampMillis,
}

impl Serializer for SettlementMarker {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            order_id: reader.read_u64()?,
            campaign_id: reader.read_u64()?,
            entries: reader.read_u8()?,
            total_amount: reader.read_u64()?,
            settled_at: reader.read_u64()?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.order_id);
        writer.write_u64(self.campaign_id);
        writer.write_u8(self.entries);
        writer.write_u64(self.total_amount);
        writer.write_u64(self.settled_at);
    }

    fn size(&self) -> usize {
        8 + 8 + 1 + 8 + 8
    }
}

/// Distribution settings of a campaign, as supplied by the campaign subsystem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignSettings {
    pub campaign_id: CampaignId,

    pub brand_id: BrandId,

    pub enable_distribution: bool,

    /// Deepest chain position paid for orders of this campaign
    pub max_distribution_level: u8,

    /// Rate paid to a single direct referrer when the brand has no level table
    pub flat_reward_rate: Option<RateBps>,
}

impl CampaignSettings {
    pub fn validate(&self) -> Result<(), DistributionError> {
        if self.max_distribution_level == 0 || self.max_distribution_level > MAX_DISTRIBUTION_LEVEL
        {
            return Err(DistributionError::InvalidMaxLevel(
                self.max_distribution_level,
            ));
        }

        if let Some(rate) = self.flat_reward_rate {
            if rate > super::MAX_RATE_BPS {
                return Err(DistributionError::RateTooHigh { level: 1, rate });
            }
        }

        Ok(())
    }

    /// Positions actually paid, never above the global maximum
    pub fn effective_max_level(&self) -> u8 {
        self.max_distribution_level.min(MAX_DISTRIBUTION_LEVEL)
    }
}

impl Serializer for CampaignSettings {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            campaign_id: reader.read_u64()?,
            brand_id: reader.read_u64()?,
            enable_distribution: reader.read_bool()?,
            max_distribution_level: reader.read_u8()?,
            flat_reward_rate: reader.read()?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.campaign_id);
        writer.write_u64(self.brand_id);
        writer.write_bool(self.enable_distribution);
        writer.write_u8(self.max_distribution_level);
        self.flat_reward_rate.write(writer);
    }

    fn size(&self) -> usize {
        8 + 8 + 1 + 1 + self.flat_reward_rate.size()
    }
}
