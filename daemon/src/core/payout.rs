use crate::core::{error::EngineError, storage::CampaignProvider};
use distrib_common::distribution::{BrandId, CampaignSettings, LevelRewardTable, RateBps};
use log::debug;

// Level table of a brand, or the default schedule when the brand has none
pub async fn level_table<P: CampaignProvider + ?Sized>(
    provider: &P,
    brand: BrandId,
) -> Result<LevelRewardTable, EngineError> {
    Ok(provider
        .get_brand_level_rewards(brand)
        .await?
        .unwrap_or_default())
}

/// Rate paid at a chain position (1-indexed) for a brand.
///
/// A position without any configured rate yields 0, which callers treat as
/// "skip this position".
pub async fn reward_rate<P: CampaignProvider + ?Sized>(
    provider: &P,
    brand: BrandId,
    position: u8,
) -> Result<RateBps, EngineError> {
    let table = level_table(provider, brand).await?;
    match table.rate_for(position) {
        Some(rate) => Ok(rate),
        None => {
            if log::log_enabled!(log::Level::Debug) {
                debug!(
                    "no reward rate configured for brand {} at position {}",
                    brand, position
                );
            }
            Ok(0)
        }
    }
}

/// Rate paid to the direct referrer of an order that carries no chain.
///
/// The brand's level 1 rate is used when the brand has a level table,
/// then the campaign's flat rate, then the default level 1 rate.
pub async fn direct_referrer_rate<P: CampaignProvider + ?Sized>(
    provider: &P,
    campaign: &CampaignSettings,
) -> Result<RateBps, EngineError> {
    if let Some(table) = provider.get_brand_level_rewards(campaign.brand_id).await? {
        return Ok(table.rate_for(1).unwrap_or(0));
    }

    Ok(campaign
        .flat_reward_rate
        .or_else(|| LevelRewardTable::default().rate_for(1))
        .unwrap_or(0))
}
