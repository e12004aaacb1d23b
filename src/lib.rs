pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod ports;
pub mod services;
pub mod startup;
pub mod telemetry;
pub mod utils;
pub mod validation;

use std::sync::Arc;

use crate::adapters::PostgresTransactionRepository;
use crate::config::Config;
use crate::db::pool_manager::PoolManager;
use crate::services::{LedgerSettings, LedgerStore};

pub use crate::domain::{NewTransaction, Transaction, TransactionFilter, TransactionStatus, TransitionRequest};
pub use crate::error::{LedgerError, LedgerResult};

impl From<&Config> for LedgerSettings {
    fn from(config: &Config) -> Self {
        LedgerSettings {
            operation_timeout: config.operation_timeout,
            list_max_limit: config.list_max_limit,
        }
    }
}

/// Wires a Postgres-backed ledger from configuration.
pub async fn connect_ledger(config: &Config) -> anyhow::Result<(LedgerStore, PoolManager)> {
    let pools = db::create_pool(config).await?;
    let repository = PostgresTransactionRepository::new(pools.clone());
    let ledger = LedgerStore::new(Arc::new(repository), LedgerSettings::from(config));
    Ok((ledger, pools))
}
