//! Connection and retry settings read from the environment.

use std::str::FromStr;
use std::time::Duration;

use deadpool_postgres::{Config, PoolConfig, Runtime};
use pgtable_schema::ConfigError;
use tokio_postgres::NoTls;

use crate::{Error, PgPool, Result, RetryPolicy};

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const POOL_SIZE: &str = "PGTABLE_POOL_SIZE";
pub const STATEMENT_TIMEOUT_SECS: &str = "PGTABLE_STATEMENT_TIMEOUT_SECS";
pub const BUSY_RETRIES: &str = "PGTABLE_BUSY_RETRIES";
pub const BUSY_BACKOFF_MS: &str = "PGTABLE_BUSY_BACKOFF_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub pool_size: usize,
    pub statement_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Settings {
    /// Load from the process environment, after applying any `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; real env vars still apply.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup(DATABASE_URL)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingSetting {
                key: DATABASE_URL.to_string(),
            })?;

        let pool_size: usize = parse_or(&lookup, POOL_SIZE, 16)?;
        let timeout_secs: u64 = parse_or(&lookup, STATEMENT_TIMEOUT_SECS, 5)?;
        let attempts: u32 = parse_or(&lookup, BUSY_RETRIES, 5)?;
        let backoff_ms: u64 = parse_or(&lookup, BUSY_BACKOFF_MS, 1000)?;

        if pool_size == 0 {
            return Err(ConfigError::InvalidSetting {
                key: POOL_SIZE.to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                key: STATEMENT_TIMEOUT_SECS.to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Settings {
            database_url,
            pool_size,
            statement_timeout: Duration::from_secs(timeout_secs),
            retry: RetryPolicy {
                attempts,
                backoff: Duration::from_millis(backoff_ms),
            },
        })
    }

    /// Build a connection pool for `database_url`.
    pub fn create_pool(&self) -> Result<PgPool> {
        let cfg = Config {
            url: Some(self.database_url.clone()),
            pool: Some(PoolConfig::new(self.pool_size)),
            ..Config::default()
        };
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| Error::Pool(e.to_string()))?;
        Ok(PgPool::new(pool))
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidSetting {
            key: key.to_string(),
            message: format!("`{raw}`: {e}"),
        }),
    }
}
