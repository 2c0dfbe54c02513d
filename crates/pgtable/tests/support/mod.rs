//! A scripted in-memory executor that records every statement it is given.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pgtable::{BoxFuture, ConnectionProvider, Error, Executor, Result, Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Rows,
    One,
    Scalar,
    Execute,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone)]
pub enum Reply {
    Rows(Vec<Row>),
    Scalar(Option<Value>),
    Affected(u64),
    Fail(String),
}

#[derive(Default)]
struct Script {
    calls: Mutex<Vec<Call>>,
    replies: Mutex<VecDeque<Reply>>,
    busy_checks: AtomicU32,
}

/// Replies are consumed in order, one per statement. With the queue empty,
/// queries return nothing and statements affect zero rows.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Script>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, reply: Reply) -> &Self {
        self.script.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn rows(&self, rows: Vec<Row>) -> &Self {
        self.reply(Reply::Rows(rows))
    }

    pub fn scalar(&self, value: impl Into<Value>) -> &Self {
        self.reply(Reply::Scalar(Some(value.into())))
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.reply(Reply::Fail(message.to_string()))
    }

    /// Report busy for the next `n` idle checks.
    pub fn busy_for(&self, n: u32) {
        self.script.busy_checks.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.calls.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.sql).collect()
    }

    pub fn call_count(&self) -> usize {
        self.script.calls.lock().unwrap().len()
    }

    fn record(&self, kind: CallKind, sql: &str, params: &[Value]) -> Option<Reply> {
        self.script.calls.lock().unwrap().push(Call {
            kind,
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        self.script.replies.lock().unwrap().pop_front()
    }
}

fn failed(message: String) -> Error {
    Error::Database {
        message,
        code: Some("XX000".to_string()),
    }
}

impl ConnectionProvider for ScriptedProvider {
    type Handle = ScriptedProvider;

    fn acquire(&self) -> BoxFuture<'_, Result<ScriptedProvider>> {
        let handle = self.clone();
        Box::pin(async move { Ok(handle) })
    }
}

impl Executor for ScriptedProvider {
    fn fetch_rows<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<Row>>> {
        let reply = self.record(CallKind::Rows, sql, params);
        Box::pin(async move {
            match reply {
                None => Ok(Vec::new()),
                Some(Reply::Rows(rows)) => Ok(rows),
                Some(Reply::Fail(m)) => Err(failed(m)),
                Some(other) => panic!("fetch_rows got scripted {other:?} for `{sql}`"),
            }
        })
    }

    fn fetch_one<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<Row>>> {
        let reply = self.record(CallKind::One, sql, params);
        Box::pin(async move {
            match reply {
                None => Ok(None),
                Some(Reply::Rows(rows)) => Ok(rows.into_iter().next()),
                Some(Reply::Fail(m)) => Err(failed(m)),
                Some(other) => panic!("fetch_one got scripted {other:?} for `{sql}`"),
            }
        })
    }

    fn fetch_scalar<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<Value>>> {
        let reply = self.record(CallKind::Scalar, sql, params);
        Box::pin(async move {
            match reply {
                None => Ok(None),
                Some(Reply::Scalar(v)) => Ok(v),
                Some(Reply::Fail(m)) => Err(failed(m)),
                Some(other) => panic!("fetch_scalar got scripted {other:?} for `{sql}`"),
            }
        })
    }

    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<u64>> {
        let reply = self.record(CallKind::Execute, sql, params);
        Box::pin(async move {
            match reply {
                None => Ok(0),
                Some(Reply::Affected(n)) => Ok(n),
                Some(Reply::Fail(m)) => Err(failed(m)),
                Some(other) => panic!("execute got scripted {other:?} for `{sql}`"),
            }
        })
    }

    fn is_busy(&self) -> bool {
        self.script
            .busy_checks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

pub fn row(values: &[(&str, Value)]) -> Row {
    values.iter().map(|(k, v)| (*k, v.clone())).collect()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
