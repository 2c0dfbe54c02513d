//! Schema-aware Postgres table access.
//!
//! A [`Table`] owns its declared columns, reconciles them against the live
//! database on [`Table::create`], builds parameterized SQL for CRUD, paging
//! and search, and keeps an optional read-through cache keyed by one column.
//!
//! Statements run through an [`Executor`] handed out by a
//! [`ConnectionProvider`]; [`PgPool`] and [`SharedClient`] are the
//! tokio-postgres implementations.
//!
//! ```ignore
//! use pgtable::{Column, Fields, Settings, SqlType, Table, Where};
//!
//! let pool = Settings::from_env()?.create_pool()?;
//!
//! let users = Table::builder("users")
//!     .column("id", Column::new(SqlType::Serial).primary_key())
//!     .column("email", Column::with_length(SqlType::Varchar, 255)?.not_null().unique())
//!     .cache_key("id")
//!     .build(pool)?;
//!
//! users.create().await?;
//! if let Some(row) = users.insert(&Fields::new().set("email", "a@example.com")).await? {
//!     // Served from the cache.
//!     let again = users.get(&Where::new().eq("id", row["id"].clone())).await?;
//! }
//! ```

mod cache;
pub use cache::TtlCache;

mod diff;
pub use diff::{Change, LiveColumn, LiveIndex, plan_columns, plan_indexes};

mod error;
pub use error::{Error, Lenient, Result};

mod executor;
pub use executor::{BoxFuture, ConnectionProvider, Executor, RetryPolicy, wait_until_idle};

mod introspect;

mod pg;
pub use pg::{PgPool, PooledConnection, SharedClient};

mod row;
pub use row::Row;

mod settings;
pub use settings::Settings;

mod table;
pub use table::{Order, Page, Table, TableBuilder};

pub use pgtable_schema::{
    Column, ConfigError, IndexDecl, IndexSpec, IndexSpecError, ResolvedIndex, SqlType,
};
pub use pgtable_sql::{Condition, Fields, Filter, IdentError, Value, Where, WhereClause};
