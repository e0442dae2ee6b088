use std::collections::HashSet;

use crate::{
    config::NEXT_DISTRIBUTOR_ID_KEY,
    core::{
        error::EngineError,
        storage::{DistributorProvider, SequenceProvider},
    },
};
use distrib_common::{
    distribution::{
        BrandId, Distributor, DistributorId, DistributorStatus, UserId, MAX_DISTRIBUTION_LEVEL,
    },
    time::TimestampMillis,
};
use log::{debug, trace, warn};

/// Result of an auto enrollment attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    // The user was already a distributor of the brand
    Existing(Distributor),
    Created(Distributor),
    // Distribution disabled, or no referrer while one is required
    NotEligible,
}

impl EnrollmentOutcome {
    pub fn distributor(&self) -> Option<&Distributor> {
        match self {
            Self::Existing(d) | Self::Created(d) => Some(d),
            Self::NotEligible => None,
        }
    }
}

/// Walk the parent links from `start` and collect the active distributors,
/// closest referrer first.
///
/// The start distributor is position 1. The walk stops at the first absent or
/// inactive distributor and never returns more than `max_levels` ids, capped
/// at `MAX_DISTRIBUTION_LEVEL`.
pub async fn resolve_chain<P: DistributorProvider + ?Sized>(
    provider: &P,
    start: DistributorId,
    max_levels: u8,
) -> Result<Vec<DistributorId>, EngineError> {
    let depth = max_levels.min(MAX_DISTRIBUTION_LEVEL) as usize;
    if log::log_enabled!(log::Level::Trace) {
        trace!("resolve chain from {} with depth {}", start, depth);
    }

    let mut chain = Vec::with_capacity(depth);
    let mut visited = HashSet::with_capacity(depth);
    let mut next = Some(start);

    while let Some(id) = next {
        if chain.len() >= depth {
            break;
        }

        // Parent links are immutable, a loop means corrupted data
        if !visited.insert(id) {
            warn!("Cycle detected in distributor tree at {}", id);
            break;
        }

        let Some(distributor) = provider.get_distributor(id).await? else {
            debug!("distributor {} not found, chain ends", id);
            break;
        };

        if !distributor.is_active() {
            if log::log_enabled!(log::Level::Debug) {
                debug!(
                    "distributor {} is {} (deleted: {}), chain ends",
                    id, distributor.status, distributor.deleted
                );
            }
            break;
        }

        chain.push(id);
        next = distributor.parent_id();
    }

    Ok(chain)
}

// Active distributor of a user in a brand
pub async fn active_distributor_of<P: DistributorProvider + ?Sized>(
    provider: &P,
    user: UserId,
    brand: BrandId,
) -> Result<Option<Distributor>, EngineError> {
    Ok(provider
        .get_distributor_by_user(user, brand)
        .await?
        .filter(Distributor::is_active))
}

/// Create a distributor record and refresh the subordinate count of its parent.
/// Must be called within a snapshot.
pub async fn enroll<S: DistributorProvider + SequenceProvider + ?Sized>(
    storage: &mut S,
    user: UserId,
    brand: BrandId,
    parent: Option<DistributorId>,
    level: u8,
    status: DistributorStatus,
    now: TimestampMillis,
) -> Result<Distributor, EngineError> {
    let id = storage.next_id(NEXT_DISTRIBUTOR_ID_KEY).await?;
    let distributor = Distributor::new(id, user, brand, level, parent, status, now)?;
    storage.create_distributor(&distributor).await?;

    if let Some(parent) = parent {
        let mut record = storage
            .get_distributor_for_update(parent)
            .await?
            .ok_or(EngineError::DistributorNotFound(parent))?;
        record.increment_subordinate_count();
        storage.update_distributor(&record).await?;
    }

    Ok(distributor)
}

/// Promote a purchaser into a distributor of the brand.
///
/// An existing record is returned as is. Otherwise the parent is the active
/// distributor of the referrer in the same brand, if any, and the new record
/// starts at level 1 with the given status.
/// Must be called within a snapshot.
#[allow(clippy::too_many_arguments)]
pub async fn auto_enroll<S: DistributorProvider + SequenceProvider + ?Sized>(
    storage: &mut S,
    user: UserId,
    brand: BrandId,
    referrer: Option<UserId>,
    distribution_enabled: bool,
    requires_referrer: bool,
    status: DistributorStatus,
    now: TimestampMillis,
) -> Result<EnrollmentOutcome, EngineError> {
    if let Some(existing) = storage.get_distributor_by_user(user, brand).await? {
        return Ok(EnrollmentOutcome::Existing(existing));
    }

    if !distribution_enabled {
        trace!("distribution disabled, user {} not enrolled", user);
        return Ok(EnrollmentOutcome::NotEligible);
    }

    let parent = match referrer.filter(|referrer| *referrer != user) {
        Some(referrer) => active_distributor_of(&*storage, referrer, brand)
            .await?
            .map(|d| d.id),
        None => None,
    };

    if parent.is_none() && requires_referrer {
        debug!("user {} has no active referrer in brand {}", user, brand);
        return Ok(EnrollmentOutcome::NotEligible);
    }

    let distributor = enroll(storage, user, brand, parent, 1, status, now).await?;
    Ok(EnrollmentOutcome::Created(distributor))
}
