//! The table façade.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indexmap::IndexMap;
use pgtable_schema::{Column, ConfigError, IndexDecl, ResolvedIndex};
use pgtable_sql::{Condition, Fields, Value, Where, WhereClause, validate_ident};
use tracing::{info, trace, warn};

use crate::introspect::{live_columns, live_indexes, table_exists};
use crate::{
    Change, ConnectionProvider, Error, Executor, LiveColumn, Result, RetryPolicy, Row, TtlCache,
    plan_columns, plan_indexes, wait_until_idle,
};

mod builder;
pub use builder::TableBuilder;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Asc => write!(f, "ASC"),
            Order::Desc => write!(f, "DESC"),
        }
    }
}

/// One page of results: 1-based `page`, `limit` rows per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
    pub order_by: Option<String>,
    pub order: Order,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            page: 1,
            limit: 10,
            order_by: None,
            order: Order::Asc,
        }
    }
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Self {
        Page {
            page,
            limit,
            ..Page::default()
        }
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by = Some(column.into());
        self.order = order;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(Error::invalid_input("page numbers start at 1"));
        }
        if self.limit == 0 {
            return Err(Error::invalid_input("page limit must be greater than zero"));
        }
        if let Some(column) = &self.order_by {
            validate_ident(column)?;
        }
        Ok(())
    }

    fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// `[ORDER BY <col> <dir> ]LIMIT n OFFSET m`, falling back to `default_order` for the column.
    fn tail_sql(&self, default_order: Option<&str>) -> String {
        let order = match self.order_by.as_deref().or(default_order) {
            Some(column) => format!("ORDER BY {} {} ", column, self.order),
            None => String::new(),
        };
        format!("{}LIMIT {} OFFSET {}", order, self.limit, self.offset())
    }
}

/// A declared table bound to a connection provider.
///
/// Create one with [`Table::builder`].
pub struct Table<P> {
    name: String,
    columns: IndexMap<String, Column>,
    cache_key: Option<String>,
    cache: Option<Mutex<TtlCache>>,
    indexes: Vec<IndexDecl>,
    statement_timeout: Duration,
    retry: RetryPolicy,
    provider: P,
}

impl<P> fmt::Debug for Table<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("columns", &self.columns.keys().collect::<Vec<_>>())
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

impl Table<()> {
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder::new(name)
    }
}

impl<P: ConnectionProvider> Table<P> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Replace the column called `name`, or append it if there is none.
    ///
    /// Takes effect on the next [`create`](Self::create).
    pub fn set_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        let column = column.named(name.clone())?;
        self.columns.insert(name, column);
        Ok(())
    }

    /// Remove the column called `name`. The cache key column cannot be removed.
    pub fn remove_column(&mut self, name: &str) -> Result<Column> {
        if self.cache_key.as_deref() == Some(name) {
            return Err(ConfigError::CacheKeyColumn {
                name: name.to_string(),
            }
            .into());
        }
        self.columns.shift_remove(name).ok_or_else(|| {
            ConfigError::UnknownColumn {
                table: self.name.clone(),
                name: name.to_string(),
            }
            .into()
        })
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Drop every cached row.
    pub fn clear_cache(&self) -> Result<()> {
        match self.lock_cache() {
            Some(mut cache) => {
                cache.clear();
                Ok(())
            }
            None => Err(ConfigError::CacheDisabled {
                table: self.name.clone(),
            }
            .into()),
        }
    }

    async fn acquire(&self) -> Result<P::Handle> {
        let handle = self.provider.acquire().await?;
        wait_until_idle(&handle, &self.retry).await?;
        Ok(handle)
    }

    /// Create the table, or reconcile the live table with the declared columns
    /// and indexes. Returns the changes applied, in order.
    ///
    /// Statements run one at a time without a transaction: a failure stops
    /// the remaining changes but leaves earlier ones applied.
    pub async fn create(&self) -> Result<Vec<Change>> {
        if self.columns.is_empty() {
            return Err(ConfigError::NoColumns {
                table: self.name.clone(),
            }
            .into());
        }

        let conn = self.acquire().await?;
        let timeout = self.statement_timeout;
        let declared: Vec<Column> = self.columns.values().cloned().collect();

        let mut changes = if table_exists(&conn, &self.name, timeout).await? {
            let live = live_columns(&conn, &self.name, timeout).await?;
            plan_columns(&declared, &live)
        } else {
            vec![Change::CreateTable(declared)]
        };

        if let Some(indexes) = self.resolve_indexes() {
            let live = live_indexes(&conn, &self.name, timeout).await?;
            changes.extend(plan_indexes(&indexes, &live));
        }

        for change in &changes {
            conn.execute(&change.to_sql(&self.name), &[], timeout).await?;
            info!(table = %self.name, "{}", change);
        }

        Ok(changes)
    }

    /// All index declarations resolved, or `None` when there are none or any is invalid.
    fn resolve_indexes(&self) -> Option<Vec<ResolvedIndex>> {
        if self.indexes.is_empty() {
            return None;
        }
        let columns: Vec<&str> = self.columns.keys().map(String::as_str).collect();
        let resolved: Result<Vec<_>, _> = self
            .indexes
            .iter()
            .map(|decl| decl.resolve(&self.name, &columns))
            .collect();
        match resolved {
            Ok(indexes) => Some(indexes),
            Err(e) => {
                warn!(
                    table = %self.name,
                    error = %e,
                    "invalid index declaration, skipping index changes"
                );
                None
            }
        }
    }

    /// Live `(name, data_type)` pairs for this table.
    pub async fn get_columns(&self) -> Result<Vec<LiveColumn>> {
        let conn = self.acquire().await?;
        live_columns(&conn, &self.name, self.statement_timeout).await
    }

    /// Insert the fields that name declared columns; others are ignored.
    ///
    /// `RETURNING *`, so the row comes back with generated values filled in.
    pub async fn insert(&self, fields: &Fields) -> Result<Option<Row>> {
        let known: Vec<(&str, &Value)> = fields
            .iter()
            .filter(|(name, _)| self.columns.contains_key(*name))
            .collect();
        if known.is_empty() {
            return Err(Error::invalid_input(format!(
                "no fields match a column of `{}`",
                self.name
            )));
        }

        let names: Vec<&str> = known.iter().map(|(name, _)| *name).collect();
        let placeholders: Vec<String> = (1..=known.len()).map(|i| format!("${i}")).collect();
        let params: Vec<Value> = known.iter().map(|(_, v)| (*v).clone()).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            self.name,
            names.join(", "),
            placeholders.join(", ")
        );

        let conn = self.acquire().await?;
        let row = conn.fetch_one(&sql, &params, self.statement_timeout).await?;
        if let Some(row) = &row {
            self.remember(std::slice::from_ref(row));
        }
        Ok(row)
    }

    /// Set `fields` on every row matching `conditions`.
    ///
    /// SET placeholders come first, WHERE placeholders continue after them.
    pub async fn update(&self, conditions: &Where, fields: &Fields) -> Result<Vec<Row>> {
        let known: Vec<(&str, &Value)> = fields
            .iter()
            .filter(|(name, _)| self.columns.contains_key(*name))
            .collect();
        if known.is_empty() {
            return Err(Error::invalid_input(format!(
                "no fields match a column of `{}`",
                self.name
            )));
        }

        let assignments: Vec<String> = known
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{} = ${}", name, i + 1))
            .collect();
        let clause = WhereClause::build_from(conditions, known.len() + 1)?;
        let mut params: Vec<Value> = known.iter().map(|(_, v)| (*v).clone()).collect();
        params.extend(clause.params);
        let sql = format!(
            "UPDATE {} SET {} WHERE {} RETURNING *",
            self.name,
            assignments.join(", "),
            clause.sql
        );

        let conn = self.acquire().await?;
        let rows = conn.fetch_rows(&sql, &params, self.statement_timeout).await?;
        // Rows whose key changed would stay cached under the old key.
        let sets_key = self
            .cache_key
            .as_deref()
            .is_some_and(|key| known.iter().any(|(name, _)| *name == key));
        match self.lookup_key(conditions) {
            Some(key) => self.forget_key(&key),
            None if sets_key => self.clear_cache_if_enabled(),
            None => {}
        }
        self.remember(&rows);
        Ok(rows)
    }

    /// Delete the rows matching `conditions` and return them.
    ///
    /// Refuses an empty mapping rather than deleting every row.
    pub async fn delete(&self, conditions: &Where) -> Result<Vec<Row>> {
        if conditions.is_empty() {
            return Err(Error::invalid_input(
                "delete requires at least one condition",
            ));
        }
        let clause = WhereClause::build(conditions)?;
        let sql = format!("DELETE FROM {} WHERE {} RETURNING *", self.name, clause.sql);

        let conn = self.acquire().await?;
        let rows = conn
            .fetch_rows(&sql, &clause.params, self.statement_timeout)
            .await?;
        self.forget(&rows);
        Ok(rows)
    }

    /// Rows matching `conditions`, limited to `columns` (all when empty).
    pub async fn select(&self, columns: &[&str], conditions: &Where) -> Result<Vec<Row>> {
        for column in columns {
            validate_ident(column)?;
        }
        let projection: Vec<String> = columns.iter().map(|c| c.to_string()).collect();

        if let Some(row) = self.cached(conditions) {
            return Ok(vec![if projection.is_empty() {
                row
            } else {
                row.project(&projection)
            }]);
        }

        let clause = WhereClause::build(conditions)?;
        let select_list = if projection.is_empty() {
            "*".to_string()
        } else {
            projection.join(", ")
        };
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            select_list, self.name, clause.sql
        );

        let conn = self.acquire().await?;
        let rows = conn
            .fetch_rows(&sql, &clause.params, self.statement_timeout)
            .await?;
        if projection.is_empty() {
            self.remember(&rows);
        }
        Ok(rows)
    }

    /// The first row matching `conditions`.
    pub async fn get(&self, conditions: &Where) -> Result<Option<Row>> {
        if let Some(row) = self.cached(conditions) {
            return Ok(Some(row));
        }

        let clause = WhereClause::build(conditions)?;
        let sql = format!("SELECT * FROM {} WHERE {} LIMIT 1", self.name, clause.sql);

        let conn = self.acquire().await?;
        let row = conn
            .fetch_one(&sql, &clause.params, self.statement_timeout)
            .await?;
        if let Some(row) = &row {
            self.remember(std::slice::from_ref(row));
        }
        Ok(row)
    }

    /// Every row matching `conditions`.
    pub async fn gets(&self, conditions: &Where) -> Result<Vec<Row>> {
        self.select(&[], conditions).await
    }

    /// Every row in the table. Bypasses the cache.
    pub async fn get_all(&self) -> Result<Vec<Row>> {
        let sql = format!("SELECT * FROM {}", self.name);
        let conn = self.acquire().await?;
        conn.fetch_rows(&sql, &[], self.statement_timeout).await
    }

    /// One page of the rows matching `conditions`.
    pub async fn get_page(&self, page: &Page, conditions: &Where) -> Result<Vec<Row>> {
        page.validate()?;
        let clause = WhereClause::build(conditions)?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} {}",
            self.name,
            clause.sql,
            page.tail_sql(None)
        );

        let conn = self.acquire().await?;
        let rows = conn
            .fetch_rows(&sql, &clause.params, self.statement_timeout)
            .await?;
        self.remember(&rows);
        Ok(rows)
    }

    /// The `<col>::text ILIKE $1 OR ...` search clause, ANDed with `conditions`.
    fn search_clause(&self, by: &[&str], keyword: &str, conditions: &Where) -> Result<WhereClause> {
        if by.is_empty() {
            return Err(Error::invalid_input("search requires at least one column"));
        }
        for column in by {
            validate_ident(column)?;
        }

        let search = WhereClause {
            sql: by
                .iter()
                .map(|c| format!("{c}::text ILIKE $1"))
                .collect::<Vec<_>>()
                .join(" OR "),
            params: vec![Value::String(format!("%{keyword}%"))],
        };

        if conditions.is_empty() {
            Ok(search)
        } else {
            Ok(search.and(WhereClause::build(conditions)?))
        }
    }

    /// Rows where any of `by` contains `keyword`, case-insensitively.
    ///
    /// Without an explicit `order_by` the page is ordered by the primary key,
    /// when one is declared.
    pub async fn search(
        &self,
        by: &[&str],
        keyword: &str,
        page: &Page,
        conditions: &Where,
    ) -> Result<Vec<Row>> {
        let clause = self.search_clause(by, keyword, conditions)?;
        page.validate()?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} {}",
            self.name,
            clause.sql,
            page.tail_sql(self.primary_key())
        );

        let conn = self.acquire().await?;
        conn.fetch_rows(&sql, &clause.params, self.statement_timeout)
            .await
    }

    /// Number of rows matching `conditions`.
    pub async fn count(&self, conditions: &Where) -> Result<i64> {
        let clause = WhereClause::build(conditions)?;
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", self.name, clause.sql);
        self.scalar_count(&sql, &clause.params).await
    }

    /// Number of rows [`search`](Self::search) would find across all pages.
    pub async fn count_search(
        &self,
        by: &[&str],
        keyword: &str,
        conditions: &Where,
    ) -> Result<i64> {
        let clause = self.search_clause(by, keyword, conditions)?;
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", self.name, clause.sql);
        self.scalar_count(&sql, &clause.params).await
    }

    async fn scalar_count(&self, sql: &str, params: &[Value]) -> Result<i64> {
        let conn = self.acquire().await?;
        let count = conn.fetch_scalar(sql, params, self.statement_timeout).await?;
        Ok(count.and_then(|v| v.as_i64()).unwrap_or(0))
    }

    /// Whether any row matches `conditions`.
    pub async fn exists(&self, conditions: &Where) -> Result<bool> {
        let clause = WhereClause::build(conditions)?;
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {})",
            self.name, clause.sql
        );
        let conn = self.acquire().await?;
        let exists = conn
            .fetch_scalar(&sql, &clause.params, self.statement_timeout)
            .await?;
        Ok(exists.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    /// Run caller-supplied SQL verbatim. Nothing is validated or cached.
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let conn = self.acquire().await?;
        conn.fetch_rows(sql, params, self.statement_timeout).await
    }

    pub async fn drop(&self) -> Result<()> {
        let sql = format!("DROP TABLE IF EXISTS {}", self.name);
        let conn = self.acquire().await?;
        conn.execute(&sql, &[], self.statement_timeout).await?;
        info!(table = %self.name, "dropped table");
        self.clear_cache_if_enabled();
        Ok(())
    }

    pub async fn truncate(&self) -> Result<()> {
        let sql = format!("TRUNCATE TABLE {}", self.name);
        let conn = self.acquire().await?;
        conn.execute(&sql, &[], self.statement_timeout).await?;
        info!(table = %self.name, "truncated table");
        self.clear_cache_if_enabled();
        Ok(())
    }

    fn primary_key(&self) -> Option<&str> {
        self.columns
            .values()
            .find(|c| c.is_primary_key())
            .map(Column::name)
    }

    fn lock_cache(&self) -> Option<MutexGuard<'_, TtlCache>> {
        self.cache
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn clear_cache_if_enabled(&self) {
        if let Some(mut cache) = self.lock_cache() {
            cache.clear();
        }
    }

    /// The cache key a row is stored under.
    fn row_key(&self, row: &Row) -> Option<String> {
        let column = self.cache_key.as_deref()?;
        cache_key_of(row.get(column)?)
    }

    /// The cache key a lookup can use: a plain value for the cache key column,
    /// and nothing but plain values elsewhere.
    fn lookup_key(&self, conditions: &Where) -> Option<String> {
        let column = self.cache_key.as_deref()?;
        if conditions.iter().any(|(_, c)| matches!(c, Condition::Filter(_))) {
            return None;
        }
        cache_key_of(conditions.get(column)?.as_value()?)
    }

    fn cached(&self, conditions: &Where) -> Option<Row> {
        let key = self.lookup_key(conditions)?;
        let row = self.lock_cache()?.get(&key);
        let Some(row) = row else {
            trace!(table = %self.name, key = %key, "cache miss");
            return None;
        };

        // Every other condition must hold for the cached row too.
        let matches = conditions.iter().all(|(column, condition)| {
            match (condition.as_value(), row.get(column)) {
                (Some(Value::Null), Some(actual)) => actual.is_null(),
                (Some(expected), Some(actual)) => expected.to_string() == actual.to_string(),
                _ => false,
            }
        });
        if matches {
            trace!(table = %self.name, key = %key, "cache hit");
            Some(row)
        } else {
            None
        }
    }

    fn remember(&self, rows: &[Row]) {
        let Some(mut cache) = self.lock_cache() else {
            return;
        };
        for row in rows {
            if let Some(key) = self.row_key(row) {
                cache.insert(key, row.clone());
            }
        }
    }

    fn forget(&self, rows: &[Row]) {
        let Some(mut cache) = self.lock_cache() else {
            return;
        };
        for row in rows {
            if let Some(key) = self.row_key(row) {
                cache.remove(&key);
            }
        }
    }

    fn forget_key(&self, key: &str) {
        if let Some(mut cache) = self.lock_cache() {
            cache.remove(key);
        }
    }
}

/// NULL never identifies a row.
fn cache_key_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        v => Some(v.to_string()),
    }
}
