use crate::core::error::EngineError;
use async_trait::async_trait;
use distrib_common::distribution::{DistributorId, OrderId, RewardRecord, SettlementMarker};

#[async_trait]
pub trait RewardProvider {
    // Marker written once an order has been settled
    async fn get_settlement_marker(
        &self,
        order: OrderId,
    ) -> Result<Option<SettlementMarker>, EngineError>;

    // Tracked variant, a concurrent settlement of the same order makes the commit fail
    async fn get_settlement_marker_for_update(
        &mut self,
        order: OrderId,
    ) -> Result<Option<SettlementMarker>, EngineError>;

    async fn set_settlement_marker(&mut self, marker: &SettlementMarker)
        -> Result<(), EngineError>;

    // Check if a reward entry exists for the order and distributor
    async fn has_reward(
        &self,
        order: OrderId,
        distributor: DistributorId,
    ) -> Result<bool, EngineError>;

    // Store a reward entry and index it by distributor
    async fn insert_reward(&mut self, reward: &RewardRecord) -> Result<(), EngineError>;

    // All reward entries of an order, in distributor id order
    async fn get_rewards_for_order(&self, order: OrderId)
        -> Result<Vec<RewardRecord>, EngineError>;

    // All reward entries of a distributor, in order id order
    async fn get_rewards_for_distributor(
        &self,
        distributor: DistributorId,
    ) -> Result<Vec<RewardRecord>, EngineError>;
}
