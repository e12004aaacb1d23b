use bigdecimal::BigDecimal;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{mask_password, Config};
use crate::domain::{NewTransaction, TransactionFilter, TransactionStatus, TransitionRequest};
use crate::services::{default_seeds, load_seed_file, LedgerStore, SeedLoader};

#[derive(Parser)]
#[command(name = "payment-ledger")]
#[command(about = "Payment Ledger - durable record of payment gateway transactions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Load example transactions (safe to repeat)
    Seed {
        /// JSON file with an array of seed records; built-in seeds when omitted
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Configuration and connectivity validation
    Check,

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Record a new pending transaction
    Create(CreateArgs),

    /// Settle a pending transaction
    Transition(TransitionArgs),

    /// Show one transaction
    Get {
        #[arg(value_name = "TX_ID")]
        transaction_id: String,
    },

    /// List transactions oldest first
    List(ListArgs),

    /// Show the audit trail of one transaction
    History {
        #[arg(value_name = "TX_ID")]
        transaction_id: String,
    },
}

#[derive(Args)]
pub struct CreateArgs {
    #[arg(long = "id", value_name = "TX_ID")]
    pub transaction_id: String,
    #[arg(long)]
    pub gateway: String,
    #[arg(long = "mode")]
    pub payment_mode: String,
    #[arg(long = "base")]
    pub base_amount: BigDecimal,
    #[arg(long = "fee", default_value = "0.00")]
    pub fee_amount: BigDecimal,
}

#[derive(Args)]
pub struct TransitionArgs {
    #[arg(value_name = "TX_ID")]
    pub transaction_id: String,
    /// success, failed or cancelled
    #[arg(long)]
    pub status: TransactionStatus,
    #[arg(long)]
    pub gateway_transaction_id: Option<String>,
    #[arg(long)]
    pub gateway_response: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long)]
    pub status: Option<TransactionStatus>,
    #[arg(long)]
    pub gateway: Option<String>,
    #[arg(long = "mode")]
    pub payment_mode: Option<String>,
    #[arg(short, long, default_value_t = 20)]
    pub limit: u32,
    /// `next_cursor` from a previous page
    #[arg(long)]
    pub cursor: Option<String>,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate {
        #[arg(long, default_value = "./migrations")]
        dir: PathBuf,
    },

    /// Ping the primary and replica pools
    Health,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn handle_tx(ledger: &LedgerStore, command: TxCommands) -> anyhow::Result<()> {
    match command {
        TxCommands::Create(args) => {
            let tx = ledger
                .create(NewTransaction::new(
                    args.transaction_id,
                    args.gateway,
                    args.payment_mode,
                    args.base_amount,
                    args.fee_amount,
                ))
                .await?;
            print_json(&tx)
        }
        TxCommands::Transition(args) => {
            let tx = ledger
                .transition(
                    &args.transaction_id,
                    TransitionRequest {
                        new_status: args.status,
                        gateway_transaction_id: args.gateway_transaction_id,
                        gateway_response: args.gateway_response,
                    },
                )
                .await?;
            print_json(&tx)
        }
        TxCommands::Get { transaction_id } => print_json(&ledger.get(&transaction_id).await?),
        TxCommands::List(args) => {
            let filter = TransactionFilter {
                status: args.status,
                gateway: args.gateway,
                payment_mode: args.payment_mode,
            };
            let page = ledger
                .list(&filter, args.limit, args.cursor.as_deref())
                .await?;
            print_json(&page)
        }
        TxCommands::History { transaction_id } => {
            print_json(&ledger.history(&transaction_id).await?)
        }
    }
}

pub async fn handle_seed(ledger: &LedgerStore, file: Option<&Path>) -> anyhow::Result<()> {
    let seeds = match file {
        Some(path) => load_seed_file(path)?,
        None => default_seeds(),
    };

    let report = SeedLoader::new(ledger).load(&seeds).await?;
    println!(
        "✓ Seeded {} transaction(s), skipped {} existing",
        report.created.len(),
        report.skipped.len()
    );
    Ok(())
}

pub async fn handle_db_migrate(config: &Config, dir: &Path) -> anyhow::Result<()> {
    let pools = crate::db::create_pool(config).await?;

    tracing::info!(dir = %dir.display(), "Running database migrations...");
    crate::db::run_migrations(pools.primary(), dir).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub async fn handle_db_health(config: &Config) -> anyhow::Result<()> {
    let pools = crate::db::create_pool(config).await?;
    let health = pools.health_check().await;

    println!("Primary: {}", if health.primary { "up" } else { "down" });
    match pools.replica() {
        Some(_) => println!("Replica: {}", if health.replica { "up" } else { "down" }),
        None => println!("Replica: not configured"),
    }

    if !health.is_healthy() {
        anyhow::bail!("Database health check failed");
    }
    Ok(())
}

pub fn handle_config_show(config: &Config) -> anyhow::Result<()> {
    println!("Configuration:");
    println!(
        "  Database URL: {}",
        config
            .database_url
            .as_deref()
            .map(mask_password)
            .unwrap_or_else(|| "<unset>".to_string())
    );
    println!(
        "  Replica URL: {}",
        config
            .database_replica_url
            .as_deref()
            .map(mask_password)
            .unwrap_or_else(|| "<unset>".to_string())
    );
    println!("  Max Connections: {}", config.database_max_connections);
    println!("  Acquire Timeout: {:?}", config.database_acquire_timeout);
    println!("  Operation Timeout: {:?}", config.operation_timeout);
    println!("  List Max Limit: {}", config.list_max_limit);
    println!("  Log Format: {:?}", config.log_format);
    Ok(())
}
