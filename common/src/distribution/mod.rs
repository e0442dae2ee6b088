// Multi-level distribution domain types
//
// Key Features:
// - Distributor records forming a parent-pointer forest per brand
// - Immutable reward ledger entries, one per (order, distributor)
// - Per-brand payout schedule keyed by chain position
// - Reward arithmetic on atomic currency units

mod error;
mod record;

pub use error::*;
pub use record::*;

use crate::config::DEFAULT_LEVEL_RATES;
use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use serde::{Deserialize, Serialize};

pub type DistributorId = u64;
pub type UserId = u64;
pub type BrandId = u64;
pub type OrderId = u64;
pub type CampaignId = u64;

/// Monetary amount in atomic units (1 = 0.01)
pub type Amount = u64;

/// Rate in basis points (100 = 1%, 10000 = 100%)
pub type RateBps = u16;

/// Decimals of the currency
pub const CURRENCY_DECIMALS: u32 = 2;

/// 100% expressed in basis points
pub const MAX_RATE_BPS: RateBps = 10_000;

/// Deepest chain position that can ever receive a reward
pub const MAX_DISTRIBUTION_LEVEL: u8 = 3;

/// Payout schedule of a brand, in basis points per chain position
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LevelRewardTable {
    /// Rates for each position (index 0 = position 1, the direct referrer)
    pub rates: Vec<RateBps>,
}

impl Default for LevelRewardTable {
    fn default() -> Self {
        Self {
            rates: DEFAULT_LEVEL_RATES.to_vec(),
        }
    }
}

impl LevelRewardTable {
    pub fn new(rates: Vec<RateBps>) -> Self {
        Self { rates }
    }

    /// Get the number of levels
    pub fn levels(&self) -> u8 {
        self.rates.len() as u8
    }

    /// Rate for a 1-indexed chain position
    pub fn rate_for(&self, position: u8) -> Option<RateBps> {
        if position == 0 {
            return None;
        }
        self.rates.get(position as usize - 1).copied()
    }

    /// Calculate total rate (should not exceed 10000 = 100%)
    pub fn total_rate(&self) -> u32 {
        self.rates.iter().map(|&r| r as u32).sum()
    }

    pub fn validate(&self) -> Result<(), DistributionError> {
        if self.rates.len() > MAX_DISTRIBUTION_LEVEL as usize {
            return Err(DistributionError::TooManyLevels {
                max: MAX_DISTRIBUTION_LEVEL,
                requested: self.rates.len(),
            });
        }

        if let Some((index, rate)) = self
            .rates
            .iter()
            .enumerate()
            .find(|(_, rate)| **rate > MAX_RATE_BPS)
        {
            return Err(DistributionError::RateTooHigh {
                level: index as u8 + 1,
                rate: *rate,
            });
        }

        let total = self.total_rate();
        if total > MAX_RATE_BPS as u32 {
            return Err(DistributionError::RatesTooHigh { total });
        }

        Ok(())
    }
}

impl Serializer for LevelRewardTable {
    fn write(&self, writer: &mut Writer) {
        self.rates.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            rates: reader.read()?,
        })
    }

    fn size(&self) -> usize {
        self.rates.size()
    }
}

/// Reward owed for an order amount at the given rate.
///
/// `amount × rate / 100%`, rounded half-up to the currency precision.
pub fn compute_reward(order_amount: Amount, rate: RateBps) -> Amount {
    let numerator = order_amount as u128 * rate as u128 + (MAX_RATE_BPS as u128 / 2);
    (numerator / MAX_RATE_BPS as u128) as Amount
}
