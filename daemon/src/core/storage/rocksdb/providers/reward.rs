use crate::core::{
    error::EngineError,
    storage::{rocksdb::Column, RewardProvider, RocksStorage},
};
use async_trait::async_trait;
use distrib_common::distribution::{DistributorId, OrderId, RewardRecord, SettlementMarker};
use log::trace;

#[async_trait]
impl RewardProvider for RocksStorage {
    async fn get_settlement_marker(
        &self,
        order: OrderId,
    ) -> Result<Option<SettlementMarker>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get settlement marker of order {}", order);
        }
        self.load_optional_from_disk(Column::SettledOrders, &order.to_be_bytes())
    }

    async fn get_settlement_marker_for_update(
        &mut self,
        order: OrderId,
    ) -> Result<Option<SettlementMarker>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get settlement marker of order {} for update", order);
        }
        self.load_tracked(Column::SettledOrders, &order.to_be_bytes())
    }

    async fn set_settlement_marker(
        &mut self,
        marker: &SettlementMarker,
    ) -> Result<(), EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("set settlement marker of order {}", marker.order_id);
        }
        self.insert_into_disk(Column::SettledOrders, marker.order_id.to_be_bytes(), marker)
    }

    async fn has_reward(
        &self,
        order: OrderId,
        distributor: DistributorId,
    ) -> Result<bool, EngineError> {
        self.contains_data(Column::Rewards, &Self::get_pair_key(order, distributor))
    }

    async fn insert_reward(&mut self, reward: &RewardRecord) -> Result<(), EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!(
                "insert reward of order {} for distributor {}",
                reward.order_id,
                reward.distributor_id
            );
        }

        self.insert_into_disk(
            Column::Rewards,
            Self::get_pair_key(reward.order_id, reward.distributor_id),
            reward,
        )?;
        self.insert_into_disk(
            Column::RewardsByDistributor,
            Self::get_pair_key(reward.distributor_id, reward.order_id),
            &(),
        )
    }

    async fn get_rewards_for_order(
        &self,
        order: OrderId,
    ) -> Result<Vec<RewardRecord>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get rewards of order {}", order);
        }

        let entries = self.scan_prefix::<RewardRecord>(Column::Rewards, &order.to_be_bytes())?;
        Ok(entries.into_iter().map(|(_, reward)| reward).collect())
    }

    async fn get_rewards_for_distributor(
        &self,
        distributor: DistributorId,
    ) -> Result<Vec<RewardRecord>, EngineError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get rewards of distributor {}", distributor);
        }

        let entries =
            self.scan_prefix::<()>(Column::RewardsByDistributor, &distributor.to_be_bytes())?;

        let mut rewards = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            let order = Self::get_suffix_id(&key)?;
            let reward = self.load_from_disk(
                Column::Rewards,
                &Self::get_pair_key(order, distributor),
            )?;
            rewards.push(reward);
        }

        Ok(rewards)
    }
}
