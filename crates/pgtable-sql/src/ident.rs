//! Identifier validation and quoting.
//!
//! Table and column names are interpolated into SQL text (they cannot be
//! bound as parameters), so every name the caller hands us is checked here
//! first.

use std::borrow::Cow;
use thiserror::Error;

/// Postgres truncates identifiers beyond this many bytes.
pub const MAX_IDENT_LEN: usize = 63;

/// Keywords Postgres reserves (including those only allowed as function or type names).
///
/// Sorted for binary search.
const RESERVED: &[&str] = &[
    "all",
    "analyse",
    "analyze",
    "and",
    "any",
    "array",
    "as",
    "asc",
    "asymmetric",
    "authorization",
    "binary",
    "both",
    "case",
    "cast",
    "check",
    "collate",
    "collation",
    "column",
    "concurrently",
    "constraint",
    "create",
    "cross",
    "current_catalog",
    "current_date",
    "current_role",
    "current_schema",
    "current_time",
    "current_timestamp",
    "current_user",
    "default",
    "deferrable",
    "desc",
    "distinct",
    "do",
    "else",
    "end",
    "except",
    "false",
    "fetch",
    "for",
    "foreign",
    "freeze",
    "from",
    "full",
    "grant",
    "group",
    "having",
    "ilike",
    "in",
    "initially",
    "inner",
    "intersect",
    "into",
    "is",
    "isnull",
    "join",
    "lateral",
    "leading",
    "left",
    "like",
    "limit",
    "localtime",
    "localtimestamp",
    "natural",
    "not",
    "notnull",
    "null",
    "offset",
    "on",
    "only",
    "or",
    "order",
    "outer",
    "overlaps",
    "placing",
    "primary",
    "references",
    "returning",
    "right",
    "select",
    "session_user",
    "similar",
    "some",
    "symmetric",
    "system_user",
    "table",
    "tablesample",
    "then",
    "to",
    "trailing",
    "true",
    "union",
    "unique",
    "user",
    "using",
    "variadic",
    "verbose",
    "when",
    "where",
    "window",
    "with",
];

/// Why a name was rejected as an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentError {
    #[error("identifier must not be empty")]
    Empty,

    #[error("identifier `{name}` is longer than {MAX_IDENT_LEN} bytes")]
    TooLong { name: String },

    #[error("identifier `{name}` contains invalid character {ch:?}")]
    InvalidChar { name: String, ch: char },

    #[error("identifier `{name}` must start with a lowercase letter or underscore")]
    InvalidStart { name: String },

    #[error("identifier `{name}` is a reserved SQL keyword")]
    Reserved { name: String },
}

/// Returns true if `name` is a reserved SQL keyword.
pub fn is_reserved(name: &str) -> bool {
    RESERVED.binary_search(&name).is_ok()
}

/// Check that `name` can be written into SQL unquoted.
///
/// Accepts `[a-z_][a-z0-9_]*`, at most [`MAX_IDENT_LEN`] bytes, that is not a
/// reserved keyword. Uppercase is rejected because unquoted names fold to
/// lowercase, which would make the declared name differ from the live one.
///
/// # Examples
///
/// ```
/// use pgtable_sql::validate_ident;
/// assert!(validate_ident("created_at").is_ok());
/// assert!(validate_ident("order").is_err());
/// assert!(validate_ident("id; DROP TABLE users").is_err());
/// ```
pub fn validate_ident(name: &str) -> Result<(), IdentError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(IdentError::Empty);
    };
    if name.len() > MAX_IDENT_LEN {
        return Err(IdentError::TooLong {
            name: name.to_string(),
        });
    }
    if !(first.is_ascii_lowercase() || first == '_') {
        return Err(IdentError::InvalidStart {
            name: name.to_string(),
        });
    }
    if let Some(ch) = chars.find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')) {
        return Err(IdentError::InvalidChar {
            name: name.to_string(),
            ch,
        });
    }
    if is_reserved(name) {
        return Err(IdentError::Reserved {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// A PostgreSQL identifier wrapper.
///
/// Display writes the value escaped and quoted with double quotes.
///
/// # Example
/// ```
/// use pgtable_sql::Ident;
/// assert_eq!(format!("{}", Ident("user")), "\"user\"");
/// assert_eq!(format!("{}", Ident("bla\"h")), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

/// Quote a PostgreSQL identifier, doubling any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("{}", Ident(name))
}

/// Render a name that did not go through [`validate_ident`], such as one
/// read back from the catalog.
///
/// Names that would pass validation are written bare so generated DDL reads
/// the same as the declared schema; anything else is quoted.
pub fn sql_ident(name: &str) -> Cow<'_, str> {
    if validate_ident(name).is_ok() {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(quote_ident(name))
    }
}

/// Generate a standard index name for a table and columns.
///
/// Uses the convention `idx_{table}_{columns}` where columns are joined by underscore.
///
/// # Examples
///
/// ```
/// assert_eq!(pgtable_sql::index_name("users", &["email"]), "idx_users_email");
/// assert_eq!(
///     pgtable_sql::index_name("post", &["author_id", "created_at"]),
///     "idx_post_author_id_created_at"
/// );
/// ```
pub fn index_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    let cols: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    format!("idx_{}_{}", table, cols.join("_"))
}
