use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_replica_url: Option<String>,
    pub database_max_connections: u32,
    pub database_acquire_timeout: Duration,
    pub operation_timeout: Duration,
    pub list_max_limit: u32,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_replica_url: None,
            database_max_connections: 5,
            database_acquire_timeout: Duration::from_millis(3000),
            operation_timeout: Duration::from_millis(5000),
            list_max_limit: 100,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup, so parsing can be tested without touching the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        Ok(Config {
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            database_replica_url: lookup("DATABASE_REPLICA_URL").filter(|v| !v.trim().is_empty()),
            database_max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            database_acquire_timeout: Duration::from_millis(parse_or(
                &lookup,
                "DATABASE_ACQUIRE_TIMEOUT_MS",
                defaults.database_acquire_timeout.as_millis() as u64,
            )?),
            operation_timeout: Duration::from_millis(parse_or(
                &lookup,
                "LEDGER_OPERATION_TIMEOUT_MS",
                defaults.operation_timeout.as_millis() as u64,
            )?),
            list_max_limit: parse_or(&lookup, "LEDGER_LIST_MAX_LIMIT", defaults.list_max_limit)?,
            log_format: match lookup("LOG_FORMAT") {
                Some(raw) => raw.parse()?,
                None => defaults.log_format,
            },
        })
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set")
    }

    pub fn validate(&self) -> Result<()> {
        let primary = self.require_database_url()?;
        validate_postgres_url("DATABASE_URL", primary)?;
        if let Some(replica) = &self.database_replica_url {
            validate_postgres_url("DATABASE_REPLICA_URL", replica)?;
        }
        if self.database_max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be greater than 0");
        }
        if self.operation_timeout.is_zero() {
            anyhow::bail!("LEDGER_OPERATION_TIMEOUT_MS must be greater than 0");
        }
        if self.list_max_limit == 0 {
            anyhow::bail!("LEDGER_LIST_MAX_LIMIT must be greater than 0");
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

fn validate_postgres_url(key: &str, raw: &str) -> Result<()> {
    let url = url::Url::parse(raw).with_context(|| format!("{} is not a valid URL", key))?;
    if !matches!(url.scheme(), "postgres" | "postgresql") {
        anyhow::bail!("{} must use the postgres:// scheme", key);
    }
    Ok(())
}

/// Hides the password component of a connection string for display.
pub fn mask_password(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("****"));
            url.to_string()
        }
        _ => raw.to_string(),
    }
}
