use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;

/// Connection limits shared by the primary and replica pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Server-side cap per statement; expiry surfaces as SQLSTATE 57014.
    pub statement_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(3),
            statement_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone)]
pub struct PoolManager {
    primary: Arc<PgPool>,
    replica: Option<Arc<PgPool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    /// Reporting reads that tolerate replica lag.
    Read,
    /// Reads that must observe every committed write, such as status-filtered lists.
    ReadLatest,
    /// Writes and the reads that decide a write.
    Write,
}

impl PoolManager {
    pub async fn new(
        primary_url: &str,
        replica_url: Option<&str>,
        settings: PoolSettings,
    ) -> Result<Self, sqlx::Error> {
        let primary = Arc::new(Self::connect(primary_url, settings).await?);

        let replica = match replica_url {
            Some(url) => Some(Arc::new(Self::connect(url, settings).await?)),
            None => None,
        };

        tracing::info!(
            max_connections = settings.max_connections,
            replica = replica.is_some(),
            "Database pools initialized"
        );

        Ok(Self { primary, replica })
    }

    /// Wraps an existing pool, e.g. one created by a test harness.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            primary: Arc::new(pool),
            replica: None,
        }
    }

    async fn connect(url: &str, settings: PoolSettings) -> Result<PgPool, sqlx::Error> {
        let statement_timeout_ms = settings.statement_timeout.as_millis() as u64;

        PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    let stmt = format!("SET statement_timeout = {}", statement_timeout_ms);
                    sqlx::query(&stmt).execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .connect(url)
            .await
    }

    pub fn get_pool(&self, intent: QueryIntent) -> &PgPool {
        match intent {
            QueryIntent::Write | QueryIntent::ReadLatest => &self.primary,
            QueryIntent::Read => self.replica.as_ref().map(|r| r.as_ref()).unwrap_or(&self.primary),
        }
    }

    pub fn primary(&self) -> &PgPool {
        &self.primary
    }

    pub fn replica(&self) -> Option<&PgPool> {
        self.replica.as_ref().map(|r| r.as_ref())
    }

    pub async fn health_check(&self) -> HealthCheckResult {
        let primary_healthy = sqlx::query("SELECT 1")
            .execute(self.primary.as_ref())
            .await
            .is_ok();

        let replica_healthy = if let Some(replica) = &self.replica {
            sqlx::query("SELECT 1")
                .execute(replica.as_ref())
                .await
                .is_ok()
        } else {
            true // No replica configured, consider healthy
        };

        HealthCheckResult {
            primary: primary_healthy,
            replica: replica_healthy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheckResult {
    pub primary: bool,
    pub replica: bool,
}

impl HealthCheckResult {
    pub fn is_healthy(&self) -> bool {
        self.primary && self.replica
    }
}
