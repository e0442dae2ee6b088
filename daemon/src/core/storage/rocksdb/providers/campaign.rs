use crate::core::{
    error::EngineError,
    storage::{rocksdb::Column, CampaignProvider, RocksStorage},
};
use async_trait::async_trait;
use distrib_common::distribution::{BrandId, CampaignId, CampaignSettings, LevelRewardTable};
use log::trace;

#[async_trait]
impl CampaignProvider for RocksStorage {
    async fn get_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<Option<CampaignSettings>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get campaign {}", campaign);
        }
        self.load_optional_from_disk(Column::Campaigns, &campaign.to_be_bytes())
    }

    async fn set_campaign(&mut self, settings: &CampaignSettings) -> Result<(), EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("set campaign {}", settings.campaign_id);
        }
        self.insert_into_disk(
            Column::Campaigns,
            settings.campaign_id.to_be_bytes(),
            settings,
        )
    }

    async fn get_brand_level_rewards(
        &self,
        brand: BrandId,
    ) -> Result<Option<LevelRewardTable>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get level rewards of brand {}", brand);
        }
        self.load_optional_from_disk(Column::BrandRewards, &brand.to_be_bytes())
    }

    async fn set_brand_level_rewards(
        &mut self,
        brand: BrandId,
        table: &LevelRewardTable,
    ) -> Result<(), EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("set level rewards of brand {}", brand);
        }
        self.insert_into_disk(Column::BrandRewards, brand.to_be_bytes(), table)
    }
}
