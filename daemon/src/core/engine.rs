use std::sync::Arc;

use crate::core::{
    config::EngineConfig,
    error::EngineError,
    external::{LoggingRoleGranter, PayoutChannel, RoleGranter, SimulatedPayoutChannel},
    hierarchy::{self, EnrollmentOutcome},
    ledger, payout,
    settlement::{self, SettlementOrder, SettlementOutcome, SettlementPath},
    storage::{
        BalanceProvider, CampaignProvider, DistributorProvider, RewardProvider, SnapshotProvider,
        Storage, WithdrawalProvider,
    },
    withdrawal::{self, WithdrawalApplication},
};
use distrib_common::{
    account::UserBalance,
    distribution::{
        Amount, BrandId, CampaignId, CampaignSettings, Distributor, DistributorId,
        DistributorStatus, LevelRewardTable, OrderId, RateBps, RewardRecord, UserId,
    },
    time::get_current_time_in_millis,
    utils::format_amount,
    withdrawal::{WithdrawalId, WithdrawalRequest},
};
use log::{debug, info, warn};

// Run a transaction on a fresh session and run it again when the commit
// conflicts with a concurrent writer, up to `max_commit_attempts` times.
// The body evaluates to `Ok((value, apply))`, the snapshot is only
// committed when `apply` is true.
macro_rules! with_commit_retries {
    ($engine: expr, $resource: expr, |$session: ident| $body: block) => {{
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut $session = $engine.storage.new_session();
            $session.start_snapshot().await?;

            let result: Result<_, EngineError> = async { $body }.await;
            match result {
                Ok((value, apply)) => match $session.end_snapshot(apply).await {
                    Ok(()) => break Ok(value),
                    Err(EngineError::CommitConflict(column)) => {
                        if attempt >= $engine.config.max_commit_attempts {
                            break Err(EngineError::ConcurrencyExhausted {
                                resource: $resource,
                                attempts: attempt,
                            });
                        }

                        if log::log_enabled!(log::Level::Debug) {
                            debug!(
                                "commit conflict on {} for {} (attempt {}), retrying",
                                column, $resource, attempt
                            );
                        }
                    }
                    Err(e) => break Err(e),
                },
                Err(e) => {
                    $session.end_snapshot(false).await?;
                    break Err(e);
                }
            }
        }
    }};
}

/// Payment confirmation delivered by the order subsystem.
/// It may be delivered more than once for the same order.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub order_id: OrderId,
    pub campaign_id: CampaignId,
    pub order_amount: Amount,
    pub purchaser: UserId,
    pub referrer: Option<UserId>,
    // Chain resolved when the order was placed
    pub distributor_path: Option<Vec<DistributorId>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentReport {
    pub outcome: EnrollmentOutcome,
    // Only attempted for a newly created distributor
    pub role_granted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReport {
    pub settlement: SettlementOutcome,
    pub enrollment: EnrollmentReport,
}

/// Entry point of the distribution engine.
///
/// Every mutating operation runs in its own storage session, so an engine can
/// be shared between tasks behind an `Arc`.
pub struct DistributionEngine<S: Storage> {
    storage: S,
    roles: Arc<dyn RoleGranter>,
    payouts: Arc<dyn PayoutChannel>,
    config: EngineConfig,
}

impl<S: Storage> DistributionEngine<S> {
    pub fn new(
        storage: S,
        config: EngineConfig,
        roles: Arc<dyn RoleGranter>,
        payouts: Arc<dyn PayoutChannel>,
    ) -> Self {
        Self {
            storage,
            roles,
            payouts,
            config,
        }
    }

    // Engine wired with the logging role granter and the simulated payout channel
    pub fn with_defaults(storage: S, config: EngineConfig) -> Self {
        Self::new(
            storage,
            config,
            Arc::new(LoggingRoleGranter),
            Arc::new(SimulatedPayoutChannel),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // Campaign configuration

    pub async fn set_campaign(&self, settings: CampaignSettings) -> Result<(), EngineError> {
        settings.validate()?;
        with_commit_retries!(
            self,
            format!("campaign {}", settings.campaign_id),
            |session| {
                session.set_campaign(&settings).await?;
                Ok(((), true))
            }
        )?;

        info!(
            "Campaign {} of brand {} set (distribution: {}, max level: {})",
            settings.campaign_id,
            settings.brand_id,
            settings.enable_distribution,
            settings.max_distribution_level
        );
        Ok(())
    }

    pub async fn get_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<Option<CampaignSettings>, EngineError> {
        self.storage.get_campaign(campaign).await
    }

    async fn require_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<CampaignSettings, EngineError> {
        self.get_campaign(campaign)
            .await?
            .ok_or(EngineError::CampaignNotFound(campaign))
    }

    pub async fn set_brand_level_rewards(
        &self,
        brand: BrandId,
        table: LevelRewardTable,
    ) -> Result<(), EngineError> {
        table.validate()?;
        with_commit_retries!(self, format!("level rewards of brand {}", brand), |session| {
            session.set_brand_level_rewards(brand, &table).await?;
            Ok(((), true))
        })?;

        info!("Level rewards of brand {} set to {:?}", brand, table.rates);
        Ok(())
    }

    // Table in effect for a brand, the default one if none was set
    pub async fn get_brand_level_rewards(
        &self,
        brand: BrandId,
    ) -> Result<LevelRewardTable, EngineError> {
        payout::level_table(&self.storage, brand).await
    }

    pub async fn reward_rate(&self, brand: BrandId, position: u8) -> Result<RateBps, EngineError> {
        payout::reward_rate(&self.storage, brand, position).await
    }

    // Distributors

    /// Approve a distributor application.
    ///
    /// The parent is the active distributor of `referrer` in the same brand,
    /// if any. A user can only have one distributor record per brand.
    pub async fn register_distributor(
        &self,
        user: UserId,
        brand: BrandId,
        referrer: Option<UserId>,
        level: u8,
        status: DistributorStatus,
    ) -> Result<Distributor, EngineError> {
        let now = get_current_time_in_millis();
        let distributor = with_commit_retries!(
            self,
            format!("distributor of user {} in brand {}", user, brand),
            |session| {
                let parent = match referrer.filter(|referrer| *referrer != user) {
                    Some(referrer) => {
                        let parent =
                            hierarchy::active_distributor_of(&session, referrer, brand).await?;
                        if parent.is_none() {
                            debug!(
                                "referrer {} is not an active distributor of brand {}",
                                referrer, brand
                            );
                        }
                        parent.map(|d| d.id)
                    }
                    None => None,
                };

                let distributor =
                    hierarchy::enroll(&mut session, user, brand, parent, level, status, now)
                        .await?;
                Ok((distributor, true))
            }
        )?;

        info!(
            "Distributor {} registered for user {} in brand {} (parent: {:?}, status: {})",
            distributor.id,
            user,
            brand,
            distributor.parent_id(),
            distributor.status
        );

        if distributor.is_active() {
            self.grant_role(&distributor).await;
        }

        Ok(distributor)
    }

    pub async fn set_distributor_status(
        &self,
        id: DistributorId,
        status: DistributorStatus,
    ) -> Result<Distributor, EngineError> {
        let distributor = with_commit_retries!(self, format!("distributor {}", id), |session| {
            let mut distributor = session
                .get_distributor_for_update(id)
                .await?
                .filter(|d| !d.deleted)
                .ok_or(EngineError::DistributorNotFound(id))?;
            distributor.status = status;
            session.update_distributor(&distributor).await?;
            Ok((distributor, true))
        })?;

        info!("Distributor {} is now {}", id, status);
        Ok(distributor)
    }

    // Soft delete, the record stays referenced by its rewards
    pub async fn remove_distributor(&self, id: DistributorId) -> Result<(), EngineError> {
        with_commit_retries!(self, format!("distributor {}", id), |session| {
            let mut distributor = session
                .get_distributor_for_update(id)
                .await?
                .ok_or(EngineError::DistributorNotFound(id))?;
            let apply = !distributor.deleted;
            distributor.deleted = true;
            if apply {
                session.update_distributor(&distributor).await?;
            }
            Ok(((), apply))
        })?;

        info!("Distributor {} removed", id);
        Ok(())
    }

    pub async fn get_distributor(
        &self,
        id: DistributorId,
    ) -> Result<Option<Distributor>, EngineError> {
        self.storage.get_distributor(id).await
    }

    pub async fn get_distributor_by_user(
        &self,
        user: UserId,
        brand: BrandId,
    ) -> Result<Option<Distributor>, EngineError> {
        self.storage.get_distributor_by_user(user, brand).await
    }

    pub async fn list_subordinates(
        &self,
        parent: DistributorId,
    ) -> Result<Vec<DistributorId>, EngineError> {
        self.storage.list_subordinates(parent).await
    }

    pub async fn resolve_chain(
        &self,
        start: DistributorId,
        max_levels: u8,
    ) -> Result<Vec<DistributorId>, EngineError> {
        hierarchy::resolve_chain(&self.storage, start, max_levels).await
    }

    /// Chain to record with a new order of the campaign, from the referrer
    /// of the purchaser. Empty when nothing would be paid.
    pub async fn build_distributor_path(
        &self,
        campaign: CampaignId,
        referrer: UserId,
    ) -> Result<Vec<DistributorId>, EngineError> {
        let campaign = self.require_campaign(campaign).await?;
        if !campaign.enable_distribution {
            return Ok(Vec::new());
        }

        match hierarchy::active_distributor_of(&self.storage, referrer, campaign.brand_id).await? {
            Some(distributor) => {
                hierarchy::resolve_chain(
                    &self.storage,
                    distributor.id,
                    campaign.effective_max_level(),
                )
                .await
            }
            None => Ok(Vec::new()),
        }
    }

    async fn grant_role(&self, distributor: &Distributor) -> bool {
        match self
            .roles
            .grant_distributor_role(distributor.user_id, distributor.brand_id)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Distributor {} created but the role grant for user {} failed: {:#}",
                    distributor.id, distributor.user_id, e
                );
                false
            }
        }
    }

    /// Promote a purchaser into a distributor of the brand.
    ///
    /// A failed role grant does not undo the enrollment, it is reported
    /// with `role_granted` set to false.
    pub async fn auto_enroll(
        &self,
        user: UserId,
        brand: BrandId,
        referrer: Option<UserId>,
        distribution_enabled: bool,
    ) -> Result<EnrollmentReport, EngineError> {
        let now = get_current_time_in_millis();
        let outcome = with_commit_retries!(
            self,
            format!("distributor of user {} in brand {}", user, brand),
            |session| {
                let outcome = hierarchy::auto_enroll(
                    &mut session,
                    user,
                    brand,
                    referrer,
                    distribution_enabled,
                    self.config.auto_enroll_requires_referrer,
                    self.config.auto_enroll_status,
                    now,
                )
                .await?;
                let apply = matches!(outcome, EnrollmentOutcome::Created(_));
                Ok((outcome, apply))
            }
        )?;

        let role_granted = match &outcome {
            EnrollmentOutcome::Created(distributor) => {
                info!(
                    "User {} enrolled as distributor {} in brand {} (parent: {:?})",
                    user,
                    distributor.id,
                    brand,
                    distributor.parent_id()
                );
                self.grant_role(distributor).await
            }
            _ => false,
        };

        Ok(EnrollmentReport {
            outcome,
            role_granted,
        })
    }

    // Settlement

    /// Settle a paid order.
    ///
    /// Settling an order twice, even concurrently, writes its rewards once.
    pub async fn settle(
        &self,
        order_id: OrderId,
        campaign: CampaignId,
        order_amount: Amount,
        path: SettlementPath,
        purchaser: Option<UserId>,
    ) -> Result<SettlementOutcome, EngineError> {
        let campaign = self.require_campaign(campaign).await?;
        self.settle_for_campaign(order_id, &campaign, order_amount, path, purchaser)
            .await
    }

    async fn settle_for_campaign(
        &self,
        order_id: OrderId,
        campaign: &CampaignSettings,
        order_amount: Amount,
        path: SettlementPath,
        purchaser: Option<UserId>,
    ) -> Result<SettlementOutcome, EngineError> {
        // Fast path for duplicate deliveries, checked again inside the transaction
        if self.storage.get_settlement_marker(order_id).await?.is_some() {
            debug!("order {} already settled", order_id);
            return Ok(SettlementOutcome::AlreadySettled);
        }

        if !campaign.enable_distribution {
            debug!(
                "distribution disabled for campaign {}, order {} not settled",
                campaign.campaign_id, order_id
            );
            return Ok(SettlementOutcome::NotEligible);
        }

        let order = SettlementOrder {
            order_id,
            campaign,
            amount: order_amount,
            purchaser,
            settled_at: get_current_time_in_millis(),
        };

        let outcome = with_commit_retries!(self, format!("order {}", order_id), |session| {
            let outcome = settlement::settle(&mut session, &order, &path).await?;
            let apply = matches!(outcome, SettlementOutcome::Settled { .. });
            Ok((outcome, apply))
        })?;

        match outcome {
            SettlementOutcome::Settled { entries, total } => info!(
                "Order {} settled: {} rewards for a total of {}",
                order_id,
                entries,
                format_amount(total)
            ),
            SettlementOutcome::AlreadySettled => debug!("order {} already settled", order_id),
            SettlementOutcome::NotEligible => {
                debug!("no reward eligible for order {}", order_id)
            }
        }

        Ok(outcome)
    }

    /// Handle a payment confirmation: settle the order, then enroll the purchaser
    pub async fn on_payment_confirmed(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<PaymentReport, EngineError> {
        let PaymentConfirmation {
            order_id,
            campaign_id,
            order_amount,
            purchaser,
            referrer,
            distributor_path,
        } = confirmation;

        let campaign = self.require_campaign(campaign_id).await?;

        let path = match distributor_path {
            Some(chain) if !chain.is_empty() => Some(SettlementPath::Chain(chain)),
            _ => referrer.map(SettlementPath::DirectReferrer),
        };

        let settlement = match path {
            Some(path) => {
                self.settle_for_campaign(order_id, &campaign, order_amount, path, Some(purchaser))
                    .await?
            }
            None => {
                debug!("order {} has no referrer", order_id);
                SettlementOutcome::NotEligible
            }
        };

        let enrollment = self
            .auto_enroll(
                purchaser,
                campaign.brand_id,
                referrer,
                campaign.enable_distribution,
            )
            .await?;

        Ok(PaymentReport {
            settlement,
            enrollment,
        })
    }

    pub async fn get_rewards_for_order(
        &self,
        order: OrderId,
    ) -> Result<Vec<RewardRecord>, EngineError> {
        self.storage.get_rewards_for_order(order).await
    }

    pub async fn get_rewards_for_distributor(
        &self,
        distributor: DistributorId,
    ) -> Result<Vec<RewardRecord>, EngineError> {
        self.storage.get_rewards_for_distributor(distributor).await
    }

    // Balances

    pub async fn credit(&self, user: UserId, amount: Amount) -> Result<UserBalance, EngineError> {
        with_commit_retries!(self, format!("balance of user {}", user), |session| {
            let balance = ledger::credit(&mut session, user, amount).await?;
            Ok((balance, true))
        })
    }

    pub async fn debit(&self, user: UserId, amount: Amount) -> Result<UserBalance, EngineError> {
        with_commit_retries!(self, format!("balance of user {}", user), |session| {
            let balance = ledger::debit(&mut session, user, amount).await?;
            Ok((balance, true))
        })
    }

    // Balance of a user, an empty one at version 0 if never credited
    pub async fn get_balance(&self, user: UserId) -> Result<UserBalance, EngineError> {
        Ok(self
            .storage
            .get_user_balance(user)
            .await?
            .unwrap_or_else(|| UserBalance::new(user)))
    }

    // Withdrawals

    pub async fn apply_withdrawal(
        &self,
        application: WithdrawalApplication,
    ) -> Result<WithdrawalRequest, EngineError> {
        let now = get_current_time_in_millis();
        let min_amount = self.config.min_withdrawal_amount;
        let request = with_commit_retries!(
            self,
            format!("withdrawal of user {}", application.user_id),
            |session| {
                let request =
                    withdrawal::apply(&mut session, application.clone(), min_amount, now).await?;
                Ok((request, true))
            }
        )?;

        info!(
            "Withdrawal {} of {} submitted by user {}",
            request.id,
            format_amount(request.amount),
            request.user_id
        );
        Ok(request)
    }

    /// Approve a pending withdrawal and dispatch it to the payout channel.
    ///
    /// When the dispatch fails the request stays in `processing`, to be
    /// finalized later with `complete_withdrawal`.
    pub async fn approve_withdrawal(
        &self,
        id: WithdrawalId,
        reviewer: UserId,
        notes: Option<String>,
    ) -> Result<WithdrawalRequest, EngineError> {
        let now = get_current_time_in_millis();
        let request = with_commit_retries!(self, format!("withdrawal {}", id), |session| {
            let request = withdrawal::approve(&mut session, id, reviewer, notes.clone(), now).await?;
            Ok((request, true))
        })?;

        info!("Withdrawal {} approved by {}, dispatching", id, reviewer);

        match self.payouts.dispatch(&request).await {
            Ok(receipt) => {
                let result: Result<WithdrawalRequest, EngineError> = async {
                    with_commit_retries!(self, format!("withdrawal {}", id), |session| {
                        let request = withdrawal::complete(
                            &mut session,
                            id,
                            receipt.trade_no.clone(),
                            receipt.paid_at,
                        )
                        .await?;
                        Ok((request, true))
                    })
                }
                .await;

                // The payout went through, the trade number is needed to finish the request
                if let Err(e) = &result {
                    warn!(
                        "Withdrawal {} paid with trade number {} but not recorded: {}",
                        id, receipt.trade_no, e
                    );
                }
                let request = result?;

                info!(
                    "Withdrawal {} completed with trade number {}",
                    id, receipt.trade_no
                );
                Ok(request)
            }
            Err(e) => {
                warn!(
                    "Payout dispatch of withdrawal {} failed, left in processing: {:#}",
                    id, e
                );
                Ok(request)
            }
        }
    }

    pub async fn reject_withdrawal(
        &self,
        id: WithdrawalId,
        reviewer: UserId,
        reason: Option<String>,
    ) -> Result<WithdrawalRequest, EngineError> {
        let now = get_current_time_in_millis();
        let request = with_commit_retries!(self, format!("withdrawal {}", id), |session| {
            let request = withdrawal::reject(&mut session, id, reviewer, reason.clone(), now).await?;
            Ok((request, true))
        })?;

        info!(
            "Withdrawal {} rejected by {}, {} refunded to user {}",
            id,
            reviewer,
            format_amount(request.amount),
            request.user_id
        );
        Ok(request)
    }

    // Payment gateway callback for a request left in processing
    pub async fn complete_withdrawal(
        &self,
        id: WithdrawalId,
        trade_no: String,
    ) -> Result<WithdrawalRequest, EngineError> {
        let paid_at = get_current_time_in_millis();
        let request = with_commit_retries!(self, format!("withdrawal {}", id), |session| {
            let request = withdrawal::complete(&mut session, id, trade_no.clone(), paid_at).await?;
            Ok((request, true))
        })?;

        info!("Withdrawal {} completed with trade number {}", id, trade_no);
        Ok(request)
    }

    pub async fn get_withdrawal(
        &self,
        id: WithdrawalId,
    ) -> Result<Option<WithdrawalRequest>, EngineError> {
        self.storage.get_withdrawal(id).await
    }

    pub async fn list_withdrawals_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<WithdrawalRequest>, EngineError> {
        self.storage.list_withdrawals_for_user(user).await
    }

    // Maintenance

    pub async fn get_size_on_disk(&self) -> Result<u64, EngineError> {
        self.storage.get_size_on_disk().await
    }

    pub async fn flush(&self) -> Result<(), EngineError> {
        let mut session = self.storage.new_session();
        session.flush().await
    }
}
