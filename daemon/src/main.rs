use std::{fs::File, io::Write, path::Path};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use distrib_common::{
    config::VERSION,
    distribution::{
        Amount, BrandId, CampaignId, CampaignSettings, DistributorId, DistributorStatus,
        LevelRewardTable, OrderId, RateBps, RewardRecord, UserId, MAX_DISTRIBUTION_LEVEL,
    },
    get_cli_styles,
    logger::{setup_logger, LoggerOptions},
    utils::{format_amount, format_rate, parse_amount, parse_rate},
    withdrawal::{PayoutAccount, PayoutMethod, WithdrawalId, WithdrawalRequest},
};
use distrib_daemon::core::{
    config::Config,
    engine::{DistributionEngine, PaymentConfirmation},
    storage::RocksStorage,
    withdrawal::WithdrawalApplication,
};
use log::{error, info};

#[derive(Parser)]
#[clap(version = VERSION, about = "Multi-level distribution reward engine")]
#[command(styles = get_cli_styles())]
struct Cli {
    #[clap(flatten)]
    config: Config,
    #[clap(subcommand)]
    command: Option<Command>,
}

fn amount_arg(value: &str) -> Result<Amount, String> {
    parse_amount(value).ok_or_else(|| format!("invalid amount '{}'", value))
}

fn rate_arg(value: &str) -> Result<RateBps, String> {
    parse_rate(value).ok_or_else(|| format!("invalid rate '{}'", value))
}

#[derive(Subcommand)]
enum Command {
    /// Set the distribution settings of a campaign
    SetCampaign {
        campaign: CampaignId,
        brand: BrandId,
        /// Do not pay any reward for orders of this campaign
        #[clap(long)]
        disable_distribution: bool,
        /// Number of chain positions paid
        #[clap(long, default_value_t = MAX_DISTRIBUTION_LEVEL)]
        max_level: u8,
        /// Percentage paid to a lone direct referrer when the brand has no level table
        #[clap(long, value_parser = rate_arg)]
        flat_rate: Option<RateBps>,
    },
    /// Set the per level reward percentages of a brand
    SetBrandRewards {
        brand: BrandId,
        /// Percentages for positions 1, 2 and 3, such as `10 5 3`
        #[clap(value_parser = rate_arg, required = true)]
        rates: Vec<RateBps>,
    },
    /// Approve a distributor application
    RegisterDistributor {
        user: UserId,
        brand: BrandId,
        /// User who referred the applicant
        #[clap(long)]
        referrer: Option<UserId>,
        #[clap(long, default_value_t = 1)]
        level: u8,
        #[clap(long, value_enum, default_value_t = DistributorStatus::Active)]
        status: DistributorStatus,
    },
    /// Change the status of a distributor
    SetDistributorStatus {
        id: DistributorId,
        #[clap(value_enum)]
        status: DistributorStatus,
    },
    /// Handle a payment confirmation
    PaymentConfirmed {
        order: OrderId,
        campaign: CampaignId,
        #[clap(value_parser = amount_arg)]
        amount: Amount,
        purchaser: UserId,
        #[clap(long)]
        referrer: Option<UserId>,
        /// Chain recorded with the order, closest referrer first
        #[clap(long, value_delimiter = ',')]
        path: Vec<DistributorId>,
    },
    /// Show the balance of a user
    Balance { user: UserId },
    /// Submit a withdrawal
    Withdraw {
        user: UserId,
        brand: BrandId,
        #[clap(value_parser = amount_arg)]
        amount: Amount,
        #[clap(long, value_enum)]
        method: PayoutMethod,
        #[clap(long)]
        account_name: String,
        #[clap(long)]
        account_number: String,
        #[clap(long)]
        bank_name: Option<String>,
    },
    /// Approve a pending withdrawal and dispatch the payout
    Approve {
        id: WithdrawalId,
        reviewer: UserId,
        #[clap(long)]
        notes: Option<String>,
    },
    /// Reject a pending withdrawal and refund the user
    Reject {
        id: WithdrawalId,
        reviewer: UserId,
        #[clap(long)]
        reason: Option<String>,
    },
    /// Record the payment of a withdrawal left in processing
    Complete { id: WithdrawalId, trade_no: String },
    /// List rewards of an order or of a distributor
    Rewards {
        #[clap(long, conflicts_with = "distributor", required_unless_present = "distributor")]
        order: Option<OrderId>,
        #[clap(long)]
        distributor: Option<DistributorId>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    if let Some(path) = cli.config.config_file.as_ref() {
        if cli.config.generate_config_template {
            if Path::new(path).exists() {
                eprintln!("Config file already exists at {}", path);
                return Ok(());
            }

            let mut file = File::create(path).context("Error while creating config file")?;
            let json = serde_json::to_string_pretty(&cli.config)
                .context("Error while serializing config file")?;
            file.write_all(json.as_bytes())
                .context("Error while writing config file")?;
            println!("Config file template generated at {}", path);
            return Ok(());
        }

        let file = File::open(path).context("Error while opening config file")?;
        cli.config = serde_json::from_reader(file).context("Error while reading config file")?;
    } else if cli.config.generate_config_template {
        eprintln!(
            "Provided config file path is required to generate the template with --config-file"
        );
        return Ok(());
    }

    let config = cli.config;
    let log_config = &config.log;
    setup_logger(LoggerOptions {
        level: log_config.log_level,
        file_level: log_config.file_log_level,
        logs_path: &log_config.logs_path,
        filename_log: &log_config.filename_log,
        disable_file_logging: log_config.disable_file_logging,
        disable_file_log_date_based: log_config.disable_file_log_date_based,
        disable_log_color: log_config.disable_log_color,
        datetime_format: &log_config.datetime_format,
    })?;

    info!("Distribution engine v{}", VERSION);

    let storage = RocksStorage::new(&config.dir_path, &config.rocksdb)
        .context("Error while opening storage")?;
    let engine = DistributionEngine::with_defaults(storage, config.engine.clone());

    match cli.command {
        Some(command) => {
            if let Err(e) = run_command(&engine, command).await {
                error!("{:#}", e);
                return Err(e);
            }
        }
        None => {
            let size = engine.get_size_on_disk().await?;
            info!("Storage at {} uses {} bytes", config.dir_path, size);
            engine.flush().await.context("Error while flushing storage")?;
        }
    }

    Ok(())
}

fn print_withdrawal(request: &WithdrawalRequest) {
    println!(
        "Withdrawal {}: {} for user {} via {} is {}{}",
        request.id,
        format_amount(request.amount),
        request.user_id,
        request.account.method,
        request.status(),
        request
            .trade_no
            .as_ref()
            .map(|trade_no| format!(" (trade number {})", trade_no))
            .unwrap_or_default()
    );
}

fn print_rewards(rewards: &[RewardRecord]) {
    if rewards.is_empty() {
        println!("No rewards");
        return;
    }

    for reward in rewards {
        println!(
            "Order {} level {}: {} at {} to distributor {} (user {})",
            reward.order_id,
            reward.level,
            format_amount(reward.amount),
            format_rate(reward.rate),
            reward.distributor_id,
            reward.beneficiary
        );
    }
}

async fn run_command(engine: &DistributionEngine<RocksStorage>, command: Command) -> Result<()> {
    match command {
        Command::SetCampaign {
            campaign,
            brand,
            disable_distribution,
            max_level,
            flat_rate,
        } => {
            engine
                .set_campaign(CampaignSettings {
                    campaign_id: campaign,
                    brand_id: brand,
                    enable_distribution: !disable_distribution,
                    max_distribution_level: max_level,
                    flat_reward_rate: flat_rate,
                })
                .await
                .context("Error while setting campaign")?;
        }
        Command::SetBrandRewards { brand, rates } => {
            engine
                .set_brand_level_rewards(brand, LevelRewardTable::new(rates))
                .await
                .context("Error while setting brand rewards")?;
        }
        Command::RegisterDistributor {
            user,
            brand,
            referrer,
            level,
            status,
        } => {
            let distributor = engine
                .register_distributor(user, brand, referrer, level, status)
                .await
                .context("Error while registering distributor")?;
            println!(
                "Distributor {} created for user {} (parent: {:?})",
                distributor.id,
                user,
                distributor.parent_id()
            );
        }
        Command::SetDistributorStatus { id, status } => {
            engine
                .set_distributor_status(id, status)
                .await
                .context("Error while updating distributor")?;
        }
        Command::PaymentConfirmed {
            order,
            campaign,
            amount,
            purchaser,
            referrer,
            path,
        } => {
            let report = engine
                .on_payment_confirmed(PaymentConfirmation {
                    order_id: order,
                    campaign_id: campaign,
                    order_amount: amount,
                    purchaser,
                    referrer,
                    distributor_path: if path.is_empty() { None } else { Some(path) },
                })
                .await
                .context("Error while handling payment confirmation")?;

            println!(
                "Order {}: {:?}, {} reward entries created",
                order,
                report.settlement,
                report.settlement.entries_created()
            );
            if let Some(distributor) = report.enrollment.outcome.distributor() {
                println!("Purchaser {} is distributor {}", purchaser, distributor.id);
            }
        }
        Command::Balance { user } => {
            let balance = engine.get_balance(user).await?;
            println!(
                "User {}: balance {}, total reward {}, version {}",
                user,
                format_amount(balance.balance),
                format_amount(balance.total_reward),
                balance.version
            );
        }
        Command::Withdraw {
            user,
            brand,
            amount,
            method,
            account_name,
            account_number,
            bank_name,
        } => {
            let request = engine
                .apply_withdrawal(WithdrawalApplication {
                    user_id: user,
                    brand_id: brand,
                    amount,
                    account: PayoutAccount {
                        method,
                        account_name,
                        account_number,
                        bank_name,
                    },
                })
                .await
                .context("Error while submitting withdrawal")?;
            print_withdrawal(&request);
        }
        Command::Approve {
            id,
            reviewer,
            notes,
        } => {
            let request = engine
                .approve_withdrawal(id, reviewer, notes)
                .await
                .context("Error while approving withdrawal")?;
            print_withdrawal(&request);
        }
        Command::Reject {
            id,
            reviewer,
            reason,
        } => {
            let request = engine
                .reject_withdrawal(id, reviewer, reason)
                .await
                .context("Error while rejecting withdrawal")?;
            print_withdrawal(&request);
        }
        Command::Complete { id, trade_no } => {
            let request = engine
                .complete_withdrawal(id, trade_no)
                .await
                .context("Error while completing withdrawal")?;
            print_withdrawal(&request);
        }
        Command::Rewards { order, distributor } => {
            let rewards = match (order, distributor) {
                (Some(order), _) => engine.get_rewards_for_order(order).await?,
                (None, Some(distributor)) => engine.get_rewards_for_distributor(distributor).await?,
                (None, None) => Vec::new(),
            };
            print_rewards(&rewards);
        }
    }

    Ok(())
}
