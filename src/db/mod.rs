use sqlx::migrate::Migrator;
use sqlx::PgPool;
use std::path::Path;

use crate::config::Config;

pub mod pool_manager;

use pool_manager::{PoolManager, PoolSettings};

pub async fn create_pool(config: &Config) -> Result<PoolManager, sqlx::Error> {
    let settings = PoolSettings {
        max_connections: config.database_max_connections,
        acquire_timeout: config.database_acquire_timeout,
        statement_timeout: config.operation_timeout,
    };

    PoolManager::new(
        config.require_database_url().map_err(|e| sqlx::Error::Configuration(e.into()))?,
        config.database_replica_url.as_deref(),
        settings,
    )
    .await
}

pub async fn run_migrations(pool: &PgPool, migrations_dir: &Path) -> anyhow::Result<()> {
    let migrator = Migrator::new(migrations_dir).await?;
    migrator.run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}
