use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// The closed set of column types a table can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    // numeric
    Integer,
    SmallInt,
    BigInt,
    Serial,
    BigSerial,
    Real,
    DoublePrecision,
    Numeric,
    Decimal,
    Money,

    // character
    Text,
    Varchar,
    Char,

    Bytea,

    // date/time
    Timestamp,
    Timestamptz,
    Date,
    Time,
    Timetz,
    Interval,

    Boolean,
    Uuid,
    Json,
    Jsonb,

    // network
    Cidr,
    Inet,
    Macaddr,

    // geometric
    Point,
    Line,
    Lseg,
    Box,
    Path,
    Polygon,
    Circle,

    // range
    Int4Range,
    Int8Range,
    NumRange,
    TsRange,
    TstzRange,
    DateRange,

    // special
    Hstore,
    Xml,
    TsQuery,
    TsVector,

    // arrays
    TextArray,
    IntegerArray,
    BigIntArray,
}

impl SqlType {
    /// Every supported type, in declaration order.
    pub const ALL: &'static [SqlType] = &[
        SqlType::Integer,
        SqlType::SmallInt,
        SqlType::BigInt,
        SqlType::Serial,
        SqlType::BigSerial,
        SqlType::Real,
        SqlType::DoublePrecision,
        SqlType::Numeric,
        SqlType::Decimal,
        SqlType::Money,
        SqlType::Text,
        SqlType::Varchar,
        SqlType::Char,
        SqlType::Bytea,
        SqlType::Timestamp,
        SqlType::Timestamptz,
        SqlType::Date,
        SqlType::Time,
        SqlType::Timetz,
        SqlType::Interval,
        SqlType::Boolean,
        SqlType::Uuid,
        SqlType::Json,
        SqlType::Jsonb,
        SqlType::Cidr,
        SqlType::Inet,
        SqlType::Macaddr,
        SqlType::Point,
        SqlType::Line,
        SqlType::Lseg,
        SqlType::Box,
        SqlType::Path,
        SqlType::Polygon,
        SqlType::Circle,
        SqlType::Int4Range,
        SqlType::Int8Range,
        SqlType::NumRange,
        SqlType::TsRange,
        SqlType::TstzRange,
        SqlType::DateRange,
        SqlType::Hstore,
        SqlType::Xml,
        SqlType::TsQuery,
        SqlType::TsVector,
        SqlType::TextArray,
        SqlType::IntegerArray,
        SqlType::BigIntArray,
    ];

    /// The SQL spelling used in DDL.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::SmallInt => "SMALLINT",
            SqlType::BigInt => "BIGINT",
            SqlType::Serial => "SERIAL",
            SqlType::BigSerial => "BIGSERIAL",
            SqlType::Real => "REAL",
            SqlType::DoublePrecision => "DOUBLE PRECISION",
            SqlType::Numeric => "NUMERIC",
            SqlType::Decimal => "DECIMAL",
            SqlType::Money => "MONEY",
            SqlType::Text => "TEXT",
            SqlType::Varchar => "VARCHAR",
            SqlType::Char => "CHAR",
            SqlType::Bytea => "BYTEA",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Timestamptz => "TIMESTAMPTZ",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timetz => "TIMETZ",
            SqlType::Interval => "INTERVAL",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Uuid => "UUID",
            SqlType::Json => "JSON",
            SqlType::Jsonb => "JSONB",
            SqlType::Cidr => "CIDR",
            SqlType::Inet => "INET",
            SqlType::Macaddr => "MACADDR",
            SqlType::Point => "POINT",
            SqlType::Line => "LINE",
            SqlType::Lseg => "LSEG",
            SqlType::Box => "BOX",
            SqlType::Path => "PATH",
            SqlType::Polygon => "POLYGON",
            SqlType::Circle => "CIRCLE",
            SqlType::Int4Range => "INT4RANGE",
            SqlType::Int8Range => "INT8RANGE",
            SqlType::NumRange => "NUMRANGE",
            SqlType::TsRange => "TSRANGE",
            SqlType::TstzRange => "TSTZRANGE",
            SqlType::DateRange => "DATERANGE",
            SqlType::Hstore => "HSTORE",
            SqlType::Xml => "XML",
            SqlType::TsQuery => "TSQUERY",
            SqlType::TsVector => "TSVECTOR",
            SqlType::TextArray => "TEXT[]",
            SqlType::IntegerArray => "INTEGER[]",
            SqlType::BigIntArray => "BIGINT[]",
        }
    }

    /// Whether a `(n)` length may follow the type.
    pub fn accepts_length(&self) -> bool {
        matches!(self, SqlType::Varchar | SqlType::Char)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for SqlType {
    type Err = ConfigError;

    /// Parse the SQL spelling, ignoring case and repeated whitespace.
    ///
    /// A few common aliases (`INT`, `BOOL`, `INT[]`) are accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();

        let alias = match normalized.as_str() {
            "INT" | "INT4" => Some(SqlType::Integer),
            "INT2" => Some(SqlType::SmallInt),
            "INT8" => Some(SqlType::BigInt),
            "BOOL" => Some(SqlType::Boolean),
            "FLOAT8" => Some(SqlType::DoublePrecision),
            "FLOAT4" => Some(SqlType::Real),
            "INT[]" => Some(SqlType::IntegerArray),
            _ => None,
        };

        alias
            .or_else(|| {
                SqlType::ALL
                    .iter()
                    .copied()
                    .find(|t| t.as_sql() == normalized)
            })
            .ok_or_else(|| ConfigError::UnsupportedType {
                name: s.to_string(),
            })
    }
}
