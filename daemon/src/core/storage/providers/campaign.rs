use crate::core::error::EngineError;
use async_trait::async_trait;
use distrib_common::distribution::{BrandId, CampaignId, CampaignSettings, LevelRewardTable};

#[async_trait]
pub trait CampaignProvider {
    // Distribution settings of a campaign
    async fn get_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<Option<CampaignSettings>, EngineError>;

    async fn set_campaign(&mut self, settings: &CampaignSettings) -> Result<(), EngineError>;

    // Per level reward table configured for a brand
    async fn get_brand_level_rewards(
        &self,
        brand: BrandId,
    ) -> Result<Option<LevelRewardTable>, EngineError>;

    async fn set_brand_level_rewards(
        &mut self,
        brand: BrandId,
        table: &LevelRewardTable,
    ) -> Result<(), EngineError>;
}
