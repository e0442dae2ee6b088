use async_trait::async_trait;
use distrib_common::{
    distribution::{BrandId, UserId},
    time::{get_current_time_in_millis, TimestampMillis},
    utils::format_amount,
    withdrawal::WithdrawalRequest,
};
use log::info;
use rand::Rng;

/// Permission subsystem granting roles to users
#[async_trait]
pub trait RoleGranter: Send + Sync {
    async fn grant_distributor_role(&self, user: UserId, brand: BrandId) -> anyhow::Result<()>;
}

/// Proof of a payment made by a payout channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutReceipt {
    pub trade_no: String,
    pub paid_at: TimestampMillis,
}

/// External channel moving the funds of an approved withdrawal
#[async_trait]
pub trait PayoutChannel: Send + Sync {
    async fn dispatch(&self, request: &WithdrawalRequest) -> anyhow::Result<PayoutReceipt>;
}

// Role granter used when no permission subsystem is wired
pub struct LoggingRoleGranter;

#[async_trait]
impl RoleGranter for LoggingRoleGranter {
    async fn grant_distributor_role(&self, user: UserId, brand: BrandId) -> anyhow::Result<()> {
        info!("Granting distributor role to user {} in brand {}", user, brand);
        Ok(())
    }
}

/// Payout channel that pays immediately with a generated trade number
pub struct SimulatedPayoutChannel;

#[async_trait]
impl PayoutChannel for SimulatedPayoutChannel {
    async fn dispatch(&self, request: &WithdrawalRequest) -> anyhow::Result<PayoutReceipt> {
        let paid_at = get_current_time_in_millis();
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
        let trade_no = format!("WD{}{:06}", paid_at, suffix);

        info!(
            "Simulated payout of {} for withdrawal {} to {} ({})",
            format_amount(request.amount),
            request.id,
            request.account.account_name,
            request.account.method
        );

        Ok(PayoutReceipt { trade_no, paid_at })
    }
}
