use clap::Parser;

use payment_ledger::cli::{self, Cli, Commands, DbCommands};
use payment_ledger::config::Config;
use payment_ledger::{connect_ledger, startup, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    telemetry::init_tracing(config.log_format);

    match cli.command {
        Commands::Tx(command) => {
            let (ledger, _pools) = connect_ledger(&config).await?;
            cli::handle_tx(&ledger, command).await
        }
        Commands::Seed { file } => {
            let (ledger, _pools) = connect_ledger(&config).await?;
            cli::handle_seed(&ledger, file.as_deref()).await
        }
        Commands::Db(DbCommands::Migrate { dir }) => cli::handle_db_migrate(&config, &dir).await,
        Commands::Db(DbCommands::Health) => cli::handle_db_health(&config).await,
        Commands::Check => {
            let report = startup::validate_environment(&config).await;
            report.print();
            if !report.is_valid() {
                anyhow::bail!("Validation failed");
            }
            Ok(())
        }
        Commands::Config => cli::handle_config_show(&config),
    }
}
