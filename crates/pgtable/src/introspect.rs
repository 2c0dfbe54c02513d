//! Reading the live structure of a table.

use std::time::Duration;

use pgtable_sql::Value;

use crate::{Error, Executor, LiveColumn, LiveIndex, Result, Row};

pub(crate) const TABLE_EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
     WHERE table_schema = 'public' AND table_name = $1::text)";

pub(crate) const LIVE_COLUMNS_SQL: &str = "SELECT column_name::text AS column_name, \
     data_type::text AS data_type \
     FROM information_schema.columns \
     WHERE table_schema = 'public' AND table_name = $1::text \
     ORDER BY ordinal_position";

pub(crate) const LIVE_INDEXES_SQL: &str = "SELECT i.indexname::text AS name, \
     EXISTS (SELECT 1 FROM pg_constraint c \
     WHERE c.conindid = \
     (quote_ident(i.schemaname) || '.' || quote_ident(i.indexname))::regclass::oid) \
     AS constraint_backed \
     FROM pg_indexes i \
     WHERE i.schemaname = 'public' AND i.tablename = $1::text \
     ORDER BY i.indexname";

fn text_column(row: &Row, column: &str) -> Result<String> {
    row.get(column)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Decode {
            column: column.to_string(),
            message: "expected text".to_string(),
        })
}

pub(crate) async fn table_exists<E: Executor + ?Sized>(
    exec: &E,
    table: &str,
    timeout: Duration,
) -> Result<bool> {
    let params = [Value::from(table)];
    let exists = exec.fetch_scalar(TABLE_EXISTS_SQL, &params, timeout).await?;
    Ok(exists.and_then(|v| v.as_bool()).unwrap_or(false))
}

pub(crate) async fn live_columns<E: Executor + ?Sized>(
    exec: &E,
    table: &str,
    timeout: Duration,
) -> Result<Vec<LiveColumn>> {
    let params = [Value::from(table)];
    let rows = exec.fetch_rows(LIVE_COLUMNS_SQL, &params, timeout).await?;
    rows.iter()
        .map(|row| {
            Ok(LiveColumn {
                name: text_column(row, "column_name")?,
                data_type: text_column(row, "data_type")?,
            })
        })
        .collect()
}

pub(crate) async fn live_indexes<E: Executor + ?Sized>(
    exec: &E,
    table: &str,
    timeout: Duration,
) -> Result<Vec<LiveIndex>> {
    let params = [Value::from(table)];
    let rows = exec.fetch_rows(LIVE_INDEXES_SQL, &params, timeout).await?;
    rows.iter()
        .map(|row| {
            Ok(LiveIndex {
                name: text_column(row, "name")?,
                constraint_backed: row["constraint_backed"].as_bool().unwrap_or(false),
            })
        })
        .collect()
}
