//! tokio-postgres executors.
//!
//! Every statement runs inside a `db.query` / `db.execute` tracing span and
//! under the caller's statement timeout.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pgtable_sql::Value;
use tokio_postgres::Client;
use tokio_postgres::types::ToSql;
use tracing::Instrument;

use crate::row::decode_row;
use crate::{BoxFuture, ConnectionProvider, Error, Executor, Result, Row};

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

async fn query_rows(
    client: &Client,
    sql: &str,
    params: &[Value],
    timeout: Duration,
) -> Result<Vec<Row>> {
    let span = tracing::debug_span!(
        "db.query",
        sql = %sql,
        params = params.len(),
        rows = tracing::field::Empty,
    );
    let refs = param_refs(params);
    let rows = tokio::time::timeout(timeout, client.query(sql, &refs))
        .instrument(span.clone())
        .await
        .map_err(|_| Error::Timeout)??;
    span.record("rows", rows.len());
    rows.iter().map(decode_row).collect()
}

async fn query_opt(
    client: &Client,
    sql: &str,
    params: &[Value],
    timeout: Duration,
) -> Result<Option<Row>> {
    let span = tracing::debug_span!(
        "db.query",
        sql = %sql,
        params = params.len(),
        rows = tracing::field::Empty,
    );
    let refs = param_refs(params);
    let row = tokio::time::timeout(timeout, client.query_opt(sql, &refs))
        .instrument(span.clone())
        .await
        .map_err(|_| Error::Timeout)??;
    span.record("rows", if row.is_some() { 1u64 } else { 0u64 });
    row.as_ref().map(decode_row).transpose()
}

async fn query_scalar(
    client: &Client,
    sql: &str,
    params: &[Value],
    timeout: Duration,
) -> Result<Option<Value>> {
    let row = query_opt(client, sql, params, timeout).await?;
    Ok(row.and_then(|r| r.into_values().into_iter().next().map(|(_, v)| v)))
}

async fn execute(client: &Client, sql: &str, params: &[Value], timeout: Duration) -> Result<u64> {
    let span = tracing::debug_span!(
        "db.execute",
        sql = %sql,
        params = params.len(),
        affected = tracing::field::Empty,
    );
    let refs = param_refs(params);
    let affected = tokio::time::timeout(timeout, client.execute(sql, &refs))
        .instrument(span.clone())
        .await
        .map_err(|_| Error::Timeout)??;
    span.record("affected", affected);
    Ok(affected)
}

/// A deadpool-backed connection provider.
///
/// Each operation checks out its own connection, so pooled handles are
/// never busy.
#[derive(Clone)]
pub struct PgPool {
    inner: deadpool_postgres::Pool,
}

impl PgPool {
    pub fn new(pool: deadpool_postgres::Pool) -> Self {
        Self { inner: pool }
    }

    /// Get the inner pool (for cases where you need the raw pool).
    pub fn inner(&self) -> &deadpool_postgres::Pool {
        &self.inner
    }
}

impl ConnectionProvider for PgPool {
    type Handle = PooledConnection;

    fn acquire(&self) -> BoxFuture<'_, Result<PooledConnection>> {
        Box::pin(async move {
            let conn = self.inner.get().await?;
            Ok(PooledConnection { inner: conn })
        })
    }
}

/// A connection checked out of a [`PgPool`], returned to it on drop.
pub struct PooledConnection {
    inner: deadpool_postgres::Object,
}

impl PooledConnection {
    fn client(&self) -> &Client {
        self.inner.deref()
    }
}

impl Executor for PooledConnection {
    fn fetch_rows<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<Row>>> {
        Box::pin(query_rows(self.client(), sql, params, timeout))
    }

    fn fetch_one<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<Row>>> {
        Box::pin(query_opt(self.client(), sql, params, timeout))
    }

    fn fetch_scalar<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(query_scalar(self.client(), sql, params, timeout))
    }

    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<u64>> {
        Box::pin(execute(self.client(), sql, params, timeout))
    }

    fn is_busy(&self) -> bool {
        false
    }
}

/// One client shared between tables and the code that drives transactions on it.
///
/// Whoever opens a transaction on the client reports it with
/// [`set_in_transaction`](Self::set_in_transaction); table operations wait
/// for the flag to clear before issuing statements.
#[derive(Clone)]
pub struct SharedClient {
    client: Arc<Client>,
    in_transaction: Arc<AtomicBool>,
}

impl SharedClient {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
            in_transaction: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_in_transaction(&self, active: bool) {
        self.in_transaction.store(active, Ordering::SeqCst);
    }

    /// Get the inner client (for cases where you need the raw connection).
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

impl ConnectionProvider for SharedClient {
    type Handle = SharedClient;

    fn acquire(&self) -> BoxFuture<'_, Result<SharedClient>> {
        let handle = self.clone();
        Box::pin(async move { Ok(handle) })
    }
}

impl Executor for SharedClient {
    fn fetch_rows<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<Row>>> {
        Box::pin(query_rows(&self.client, sql, params, timeout))
    }

    fn fetch_one<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<Row>>> {
        Box::pin(query_opt(&self.client, sql, params, timeout))
    }

    fn fetch_scalar<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(query_scalar(&self.client, sql, params, timeout))
    }

    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<u64>> {
        Box::pin(execute(&self.client, sql, params, timeout))
    }

    fn is_busy(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }
}
