//! The statement-execution contract the table runs against.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use pgtable_sql::Value;
use tracing::debug;

use crate::{Error, Result, Row};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can run one statement at a time.
///
/// Every call takes the statement timeout; implementations fail with
/// [`Error::Timeout`] when it elapses.
pub trait Executor: Send + Sync {
    /// Run a query, returning all rows.
    fn fetch_rows<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<Row>>>;

    /// Run a query, returning at most one row.
    fn fetch_one<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<Row>>>;

    /// Run a query, returning the first column of the first row.
    fn fetch_scalar<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<Value>>>;

    /// Run a statement, returning the number of rows affected.
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<u64>>;

    /// Whether the connection is inside a transaction someone else owns.
    fn is_busy(&self) -> bool;
}

/// Hands out executor handles. Dropping a handle releases it.
pub trait ConnectionProvider: Send + Sync {
    type Handle: Executor;

    fn acquire(&self) -> BoxFuture<'_, Result<Self::Handle>>;
}

/// How long to wait for a busy connection before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Poll `handle` until it is no longer busy.
///
/// Sleeps `backoff` between checks, at most `attempts` times, then fails
/// with [`Error::ConnectionBusy`].
pub async fn wait_until_idle<E: Executor + ?Sized>(handle: &E, policy: &RetryPolicy) -> Result<()> {
    for attempt in 1..=policy.attempts {
        if !handle.is_busy() {
            return Ok(());
        }
        debug!(attempt, backoff = ?policy.backoff, "connection busy, waiting");
        tokio::time::sleep(policy.backoff).await;
    }
    if handle.is_busy() {
        return Err(Error::ConnectionBusy {
            attempts: policy.attempts,
        });
    }
    Ok(())
}
