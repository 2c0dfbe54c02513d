use pgtable_sql::IdentError;
use thiserror::Error;

use crate::SqlType;

/// A table, column or cache declaration that can never work.
///
/// These surface when the table is built, never from an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("length is only allowed on VARCHAR and CHAR columns, not {sql_type}")]
    LengthNotAllowed { sql_type: SqlType },

    #[error("column length must be greater than zero")]
    ZeroLength,

    #[error("unsupported SQL type `{name}`")]
    UnsupportedType { name: String },

    #[error(transparent)]
    InvalidIdentifier(#[from] IdentError),

    #[error("column `{name}` is declared more than once")]
    DuplicateColumn { name: String },

    #[error("table `{table}` declares no columns")]
    NoColumns { table: String },

    #[error("caching is enabled but no cache key column was given")]
    MissingCacheKey,

    #[error("cache key `{name}` is not a column of the table")]
    UnknownCacheKey { name: String },

    #[error("column `{name}` is the cache key and cannot be removed")]
    CacheKeyColumn { name: String },

    #[error("cache TTL must be greater than zero (leave it unset for entries that never expire)")]
    ZeroTtl,

    #[error("cache size must be greater than zero")]
    ZeroCacheSize,

    #[error("caching is not enabled for table `{table}`")]
    CacheDisabled { table: String },

    #[error("table `{table}` has no column `{name}`")]
    UnknownColumn { table: String, name: String },

    #[error("invalid value for {key}: {message}")]
    InvalidSetting { key: String, message: String },

    #[error("{key} must be set")]
    MissingSetting { key: String },
}

/// Why an index declaration was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexSpecError {
    #[error("unknown index key `{key}` (expected name, columns or unique)")]
    UnknownKey { key: String },

    #[error("index declares no columns")]
    MissingColumns,

    #[error("index column `{name}` is not declared on the table")]
    UnknownColumn { name: String },

    #[error("index `unique` must be true or false, got `{value}`")]
    InvalidUnique { value: String },

    #[error(transparent)]
    InvalidIdentifier(#[from] IdentError),
}
