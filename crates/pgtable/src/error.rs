use pgtable_schema::ConfigError;
use pgtable_sql::IdentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {message}")]
    Database {
        message: String,
        /// SQLSTATE, when the server reported one
        code: Option<String>,
    },

    #[error("connection still busy after {attempts} attempts")]
    ConnectionBusy { attempts: u32 },

    #[error("statement timed out")]
    Timeout,

    #[error("pool error: {0}")]
    Pool(String),

    #[error("failed to decode column `{column}`: {message}")]
    Decode { column: String, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(e: tokio_postgres::Error) -> Self {
        match e.as_db_error() {
            Some(db) => Error::Database {
                message: db.message().to_string(),
                code: Some(db.code().code().to_string()),
            },
            None => Error::Database {
                message: e.to_string(),
                code: e.code().map(|c| c.code().to_string()),
            },
        }
    }
}

impl From<deadpool_postgres::PoolError> for Error {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        Error::Pool(e.to_string())
    }
}

/// Names that fail validation at call time are bad input, not bad setup.
impl From<IdentError> for Error {
    fn from(e: IdentError) -> Self {
        Error::InvalidInput(e.to_string())
    }
}

/// Log-and-swallow for callers that only care whether a result came back.
///
/// ```ignore
/// let row = users.get(&filter).await.lenient("get").flatten();
/// ```
pub trait Lenient<T> {
    fn lenient(self, op: &str) -> Option<T>;
}

impl<T> Lenient<T> for Result<T> {
    fn lenient(self, op: &str) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!(op, error = %e, "operation failed");
                None
            }
        }
    }
}
