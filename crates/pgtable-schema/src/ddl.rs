//! DDL rendering for declared tables and indexes.

use crate::{Column, ResolvedIndex};

/// Generate CREATE TABLE SQL.
pub fn create_table_sql(table: &str, columns: &[Column]) -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n", table);
    let defs: Vec<String> = columns
        .iter()
        .map(|c| format!("    {}", c.definition_sql()))
        .collect();
    sql.push_str(&defs.join(",\n"));
    sql.push_str("\n);");
    sql
}

/// Generate CREATE INDEX SQL.
pub fn create_index_sql(table: &str, index: &ResolvedIndex) -> String {
    let unique = if index.unique { "UNIQUE " } else { "" };
    format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({});",
        unique,
        index.name,
        table,
        index.columns.join(", ")
    )
}
