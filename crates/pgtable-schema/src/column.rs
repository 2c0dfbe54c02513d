use pgtable_sql::validate_ident;

use crate::{ConfigError, SqlType};

/// Declarative metadata for one table column.
///
/// The name is empty until the column is attached to a table.
///
/// ```
/// use pgtable_schema::{Column, SqlType};
/// let email = Column::with_length(SqlType::Varchar, 255)
///     .unwrap()
///     .not_null()
///     .unique()
///     .named("email")
///     .unwrap();
/// assert_eq!(email.definition_sql(), "email VARCHAR(255) NOT NULL UNIQUE");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    sql_type: SqlType,
    length: Option<u32>,
    primary_key: bool,
    not_null: bool,
    unique: bool,
    default: Option<String>,
}

impl Column {
    /// A nullable, unconstrained column of type `sql_type`.
    pub fn new(sql_type: SqlType) -> Self {
        Column {
            name: String::new(),
            sql_type,
            length: None,
            primary_key: false,
            not_null: false,
            unique: false,
            default: None,
        }
    }

    /// A bounded character column.
    ///
    /// Fails unless `sql_type` is VARCHAR or CHAR and `length` is positive.
    pub fn with_length(sql_type: SqlType, length: u32) -> Result<Self, ConfigError> {
        if !sql_type.accepts_length() {
            return Err(ConfigError::LengthNotAllowed { sql_type });
        }
        if length == 0 {
            return Err(ConfigError::ZeroLength);
        }
        Ok(Column {
            length: Some(length),
            ..Column::new(sql_type)
        })
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Raw SQL literal or expression, written into DDL verbatim.
    pub fn default(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Attach the column under `name`, validating it as an identifier.
    pub fn named(mut self, name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        validate_ident(&name)?;
        self.name = name;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn length(&self) -> Option<u32> {
        self.length
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_not_null(&self) -> bool {
        self.not_null
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn default_expr(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// The type as written in DDL, including any length.
    pub fn type_sql(&self) -> String {
        match self.length {
            Some(len) => format!("{}({})", self.sql_type, len),
            None => self.sql_type.to_string(),
        }
    }

    /// `<name> <TYPE>[(<len>)] [PRIMARY KEY] [NOT NULL] [UNIQUE] [DEFAULT <expr>]`
    pub fn definition_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.type_sql());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}
