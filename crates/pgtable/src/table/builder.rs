use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use indexmap::IndexMap;
use pgtable_schema::{Column, ConfigError, IndexDecl, IndexSpec};
use pgtable_sql::validate_ident;

use super::Table;
use crate::{ConnectionProvider, RetryPolicy, Settings, TtlCache};

const DEFAULT_CACHE_MAX_SIZE: usize = 1000;
const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Collects a table declaration; every configuration error surfaces from
/// [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    columns: Vec<(String, Column)>,
    cache: bool,
    cache_key: Option<String>,
    cache_ttl: Option<Duration>,
    cache_max_size: usize,
    indexes: Vec<IndexDecl>,
    statement_timeout: Duration,
    retry: RetryPolicy,
}

impl TableBuilder {
    pub(super) fn new(name: impl Into<String>) -> Self {
        TableBuilder {
            name: name.into(),
            columns: Vec::new(),
            cache: false,
            cache_key: None,
            cache_ttl: None,
            cache_max_size: DEFAULT_CACHE_MAX_SIZE,
            indexes: Vec::new(),
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Declare a column. Declaration order is the table's column order.
    pub fn column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.push((name.into(), column));
        self
    }

    /// Turn the read-through cache on or off. Turning it on requires a
    /// [`cache_key`](Self::cache_key).
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Cache rows by the value of `column`. Enables the cache.
    pub fn cache_key(mut self, column: impl Into<String>) -> Self {
        self.cache_key = Some(column.into());
        self.cache = true;
        self
    }

    /// How long cached rows stay valid. Unset means they never expire.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn cache_max_size(mut self, max_size: usize) -> Self {
        self.cache_max_size = max_size;
        self
    }

    pub fn index(mut self, spec: IndexSpec) -> Self {
        self.indexes.push(IndexDecl::Spec(spec));
        self
    }

    /// Declare an index from loose key/value pairs (`name`, `columns`, `unique`).
    ///
    /// Checked when the table is created; an invalid declaration skips all
    /// index changes for that call.
    pub fn index_decl<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.indexes.push(IndexDecl::Pairs(
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ));
        self
    }

    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Take the statement timeout and retry policy from `settings`.
    pub fn settings(self, settings: &Settings) -> Self {
        self.statement_timeout(settings.statement_timeout)
            .retry(settings.retry)
    }

    pub fn build<P: ConnectionProvider>(self, provider: P) -> Result<Table<P>, ConfigError> {
        validate_ident(&self.name)?;

        if self.columns.is_empty() {
            return Err(ConfigError::NoColumns { table: self.name });
        }

        let mut columns = IndexMap::with_capacity(self.columns.len());
        let mut seen = HashSet::new();
        for (name, column) in self.columns {
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateColumn { name });
            }
            columns.insert(name.clone(), column.named(name)?);
        }

        let cache = if self.cache {
            let key = self.cache_key.as_deref().ok_or(ConfigError::MissingCacheKey)?;
            if !columns.contains_key(key) {
                return Err(ConfigError::UnknownCacheKey {
                    name: key.to_string(),
                });
            }
            if self.cache_ttl.is_some_and(|ttl| ttl.is_zero()) {
                return Err(ConfigError::ZeroTtl);
            }
            if self.cache_max_size == 0 {
                return Err(ConfigError::ZeroCacheSize);
            }
            Some(Mutex::new(TtlCache::new(self.cache_max_size, self.cache_ttl)))
        } else {
            None
        };

        Ok(Table {
            name: self.name,
            columns,
            cache_key: if cache.is_some() { self.cache_key } else { None },
            cache,
            indexes: self.indexes,
            statement_timeout: self.statement_timeout,
            retry: self.retry,
            provider,
        })
    }
}
