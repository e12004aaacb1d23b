use crate::config::Config;
use crate::db::pool_manager::PoolManager;
use anyhow::{Context, Result};
use sqlx::PgPool;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub replica: bool,
    pub schema: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.replica && self.schema
    }

    pub fn print(&self) {
        println!("\n=== Ledger Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Primary Database:      {}", status(self.database));
        println!("Replica Database:      {}", status(self.replica));
        println!("Ledger Schema:         {}", status(self.schema));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

/// Checks configuration, connectivity and that the ledger tables exist.
pub async fn validate_environment(config: &Config) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        database: false,
        replica: false,
        schema: false,
        errors: Vec::new(),
    };

    if let Err(e) = config.validate() {
        report.environment = false;
        report.errors.push(format!("Environment: {:#}", e));
        return report;
    }

    let pools = match crate::db::create_pool(config).await {
        Ok(pools) => pools,
        Err(e) => {
            report.errors.push(format!("Database: {}", e));
            return report;
        }
    };

    let health = pools.health_check().await;
    report.database = health.primary;
    report.replica = health.replica;
    if !health.primary {
        report.errors.push("Database: primary did not answer SELECT 1".to_string());
    }
    if !health.replica {
        report.errors.push("Database: replica did not answer SELECT 1".to_string());
    }

    match validate_schema(&pools).await {
        Ok(()) => report.schema = true,
        Err(e) => report.errors.push(format!("Schema: {:#}", e)),
    }

    report
}

async fn validate_schema(pools: &PoolManager) -> Result<()> {
    let pool: &PgPool = pools.primary();

    for table in ["payment_transactions", "payment_transaction_audit"] {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(table)
            .fetch_one(pool)
            .await
            .with_context(|| format!("Failed to look up table {}", table))?;

        if !exists {
            anyhow::bail!("table {} is missing; run `db migrate`", table);
        }
    }

    Ok(())
}
