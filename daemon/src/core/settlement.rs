use crate::core::{
    error::EngineError,
    hierarchy, ledger, payout,
    storage::{BalanceProvider, CampaignProvider, DistributorProvider, RewardProvider},
};
use distrib_common::{
    distribution::{
        compute_reward, Amount, CampaignSettings, DistributorId, OrderId, RateBps, RewardRecord,
        RewardStatus, SettlementMarker, UserId,
    },
    time::TimestampMillis,
};
use log::{debug, trace, warn};

/// Paid order to settle
#[derive(Debug, Clone)]
pub struct SettlementOrder<'a> {
    pub order_id: OrderId,
    pub campaign: &'a CampaignSettings,
    pub amount: Amount,
    pub purchaser: Option<UserId>,
    pub settled_at: TimestampMillis,
}

/// Who gets paid for an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementPath {
    // Chain resolved at order time, closest referrer first
    Chain(Vec<DistributorId>),
    // Only the referrer user was recorded with the order
    DirectReferrer(UserId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    Settled { entries: usize, total: Amount },
    // Idempotency short circuit, nothing written
    AlreadySettled,
    // No position qualified for a reward
    NotEligible,
}

impl SettlementOutcome {
    pub fn entries_created(&self) -> usize {
        match self {
            Self::Settled { entries, .. } => *entries,
            Self::AlreadySettled | Self::NotEligible => 0,
        }
    }
}

// Chain positions with the rate to apply at each of them
async fn plan_positions<S>(
    storage: &S,
    order: &SettlementOrder<'_>,
    path: &SettlementPath,
) -> Result<Vec<(u8, DistributorId, RateBps)>, EngineError>
where
    S: DistributorProvider + CampaignProvider + ?Sized,
{
    let campaign = order.campaign;
    match path {
        SettlementPath::Chain(chain) => {
            let max_level = campaign.effective_max_level() as usize;
            if chain.len() > max_level && log::log_enabled!(log::Level::Debug) {
                debug!(
                    "chain of order {} has {} positions, only {} are paid",
                    order.order_id,
                    chain.len(),
                    max_level
                );
            }

            let mut positions = Vec::with_capacity(chain.len().min(max_level));
            for (index, id) in chain.iter().take(max_level).enumerate() {
                let position = index as u8 + 1;
                let rate = payout::reward_rate(storage, campaign.brand_id, position).await?;
                positions.push((position, *id, rate));
            }
            Ok(positions)
        }
        SettlementPath::DirectReferrer(referrer) => {
            match hierarchy::active_distributor_of(storage, *referrer, campaign.brand_id).await? {
                Some(distributor) => {
                    let rate = payout::direct_referrer_rate(storage, campaign).await?;
                    Ok(vec![(1, distributor.id, rate)])
                }
                None => {
                    debug!(
                        "referrer {} of order {} is not an active distributor",
                        referrer, order.order_id
                    );
                    Ok(Vec::new())
                }
            }
        }
    }
}

/// Write the reward entries of a paid order.
///
/// Must be called within a snapshot. The settled marker of the order is read
/// with tracking, so a concurrent settlement of the same order makes one of
/// the two commits fail. Nothing should be committed unless the outcome is
/// `Settled`.
pub async fn settle<S>(
    storage: &mut S,
    order: &SettlementOrder<'_>,
    path: &SettlementPath,
) -> Result<SettlementOutcome, EngineError>
where
    S: DistributorProvider + RewardProvider + BalanceProvider + CampaignProvider + ?Sized,
{
    if storage
        .get_settlement_marker_for_update(order.order_id)
        .await?
        .is_some()
    {
        debug!("order {} settled concurrently", order.order_id);
        return Ok(SettlementOutcome::AlreadySettled);
    }

    let brand = order.campaign.brand_id;
    let positions = plan_positions(&*storage, order, path).await?;

    let mut entries = 0usize;
    let mut total: Amount = 0;
    for (position, id, rate) in positions {
        let Some(mut distributor) = storage.get_distributor_for_update(id).await? else {
            warn!(
                "distributor {} at position {} of order {} not found",
                id, position, order.order_id
            );
            continue;
        };

        if !distributor.is_active() {
            debug!("distributor {} at position {} is not active", id, position);
            continue;
        }

        if distributor.brand_id != brand {
            warn!(
                "distributor {} belongs to brand {}, order {} is for brand {}",
                id, distributor.brand_id, order.order_id, brand
            );
            continue;
        }

        if rate == 0 {
            trace!("no reward at position {}", position);
            continue;
        }

        let amount = compute_reward(order.amount, rate);
        if amount == 0 {
            trace!("reward rounds to zero at position {}", position);
            continue;
        }

        // A distributor listed twice is only paid once
        if storage.has_reward(order.order_id, id).await? {
            debug!(
                "distributor {} already rewarded for order {}",
                id, order.order_id
            );
            continue;
        }

        let reward = RewardRecord {
            distributor_id: id,
            beneficiary: distributor.user_id,
            order_id: order.order_id,
            campaign_id: order.campaign.campaign_id,
            level: position,
            rate,
            amount,
            status: RewardStatus::Settled,
            settled_at: order.settled_at,
            purchaser: order.purchaser,
        };
        storage.insert_reward(&reward).await?;

        ledger::credit(storage, distributor.user_id, amount).await?;

        distributor.add_earnings(amount)?;
        storage.update_distributor(&distributor).await?;

        entries += 1;
        total = total.saturating_add(amount);
    }

    if entries == 0 {
        return Ok(SettlementOutcome::NotEligible);
    }

    storage
        .set_settlement_marker(&SettlementMarker {
            order_id: order.order_id,
            campaign_id: order.campaign.campaign_id,
            entries: entries as u8,
            total_amount: total,
            settled_at: order.settled_at,
        })
        .await?;

    Ok(SettlementOutcome::Settled { entries, total })
}
