//! Rows as ordered column → value maps, and decoding from tokio-postgres.

use std::error::Error as StdError;
use std::ops::Index;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use pgtable_sql::Value;
use rust_decimal::Decimal;
use tokio_postgres::types::{FromSql, Type};
use uuid::Uuid;

use crate::Error;

/// One result row, columns in the order the server returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: IndexMap<String, Value>,
}

static NULL: Value = Value::Null;

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keep only `columns`, in the order given. Missing columns are skipped.
    pub fn project(&self, columns: &[String]) -> Row {
        columns
            .iter()
            .filter_map(|c| self.values.get(c).map(|v| (c.clone(), v.clone())))
            .collect()
    }

    pub fn into_values(self) -> IndexMap<String, Value> {
        self.values
    }
}

/// Missing columns index as `Value::Null`.
impl Index<&str> for Row {
    type Output = Value;

    fn index(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&NULL)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// The undecoded wire payload of any type.
struct Raw(Vec<u8>);

impl<'a> FromSql<'a> for Raw {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(Raw(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// JSON as text, with the JSONB version byte stripped.
struct JsonText(String);

impl<'a> FromSql<'a> for JsonText {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let text = if *ty == Type::JSONB {
            match raw.split_first() {
                Some((1, rest)) => rest,
                Some((v, _)) => return Err(format!("unsupported JSONB version {v}").into()),
                None => return Err("empty JSONB payload".into()),
            }
        } else {
            raw
        };
        Ok(JsonText(std::str::from_utf8(text)?.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::JSON || *ty == Type::JSONB
    }
}

/// Convert a tokio-postgres row, picking a [`Value`] variant per column type.
pub(crate) fn decode_row(row: &tokio_postgres::Row) -> Result<Row, Error> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_value(row, idx, column.type_()).map_err(|e| Error::Decode {
            column: column.name().to_string(),
            message: e.to_string(),
        })?;
        out.insert(column.name(), value);
    }
    Ok(out)
}

fn get<'a, T: FromSql<'a>>(
    row: &'a tokio_postgres::Row,
    idx: usize,
) -> Result<Option<T>, tokio_postgres::Error> {
    row.try_get::<_, Option<T>>(idx)
}

fn array<'a, T>(row: &'a tokio_postgres::Row, idx: usize) -> Result<Value, tokio_postgres::Error>
where
    T: FromSql<'a> + Into<Value>,
{
    Ok(match get::<Vec<Option<T>>>(row, idx)? {
        Some(items) => Value::Array(items.into_iter().map(Value::from).collect()),
        None => Value::Null,
    })
}

fn decode_value(
    row: &tokio_postgres::Row,
    idx: usize,
    ty: &Type,
) -> Result<Value, tokio_postgres::Error> {
    let value = if *ty == Type::BOOL {
        get::<bool>(row, idx)?.into()
    } else if *ty == Type::INT2 {
        get::<i16>(row, idx)?.into()
    } else if *ty == Type::INT4 {
        get::<i32>(row, idx)?.into()
    } else if *ty == Type::INT8 {
        get::<i64>(row, idx)?.into()
    } else if *ty == Type::FLOAT4 {
        get::<f32>(row, idx)?.into()
    } else if *ty == Type::FLOAT8 {
        get::<f64>(row, idx)?.into()
    } else if *ty == Type::NUMERIC {
        get::<Decimal>(row, idx)?.into()
    } else if *ty == Type::TEXT
        || *ty == Type::VARCHAR
        || *ty == Type::BPCHAR
        || *ty == Type::NAME
    {
        get::<String>(row, idx)?.into()
    } else if *ty == Type::BYTEA {
        get::<Vec<u8>>(row, idx)?.into()
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        match get::<JsonText>(row, idx)? {
            Some(JsonText(s)) => Value::Json(s),
            None => Value::Null,
        }
    } else if *ty == Type::UUID {
        get::<Uuid>(row, idx)?.into()
    } else if *ty == Type::TIMESTAMP {
        get::<NaiveDateTime>(row, idx)?.into()
    } else if *ty == Type::TIMESTAMPTZ {
        get::<DateTime<Utc>>(row, idx)?.into()
    } else if *ty == Type::DATE {
        get::<NaiveDate>(row, idx)?.into()
    } else if *ty == Type::TIME {
        get::<NaiveTime>(row, idx)?.into()
    } else if *ty == Type::TEXT_ARRAY || *ty == Type::VARCHAR_ARRAY {
        array::<String>(row, idx)?
    } else if *ty == Type::INT2_ARRAY {
        array::<i16>(row, idx)?
    } else if *ty == Type::INT4_ARRAY {
        array::<i32>(row, idx)?
    } else if *ty == Type::INT8_ARRAY {
        array::<i64>(row, idx)?
    } else if *ty == Type::BOOL_ARRAY {
        array::<bool>(row, idx)?
    } else {
        match get::<Raw>(row, idx)? {
            Some(Raw(bytes)) => Value::Bytes(bytes),
            None => Value::Null,
        }
    };
    Ok(value)
}
