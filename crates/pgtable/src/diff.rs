//! Schema diffing: compare declared columns and indexes against the live table.

use std::collections::HashSet;
use std::fmt;

use pgtable_schema::{Column, ResolvedIndex, create_index_sql, create_table_sql};
use pgtable_sql::sql_ident;

/// A column as it exists in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    pub data_type: String,
}

/// An index as it exists in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveIndex {
    pub name: String,
    /// Backs a PRIMARY KEY or UNIQUE constraint; never dropped by reconciliation.
    pub constraint_backed: bool,
}

/// A single schema change.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Create the table with all declared columns.
    CreateTable(Vec<Column>),
    /// Add a new column.
    AddColumn(Column),
    /// Drop an existing column.
    DropColumn(String),
    /// Add an index.
    CreateIndex(ResolvedIndex),
    /// Drop an index.
    DropIndex(String),
}

impl Change {
    /// Generate SQL for this change.
    pub fn to_sql(&self, table_name: &str) -> String {
        match self {
            Change::CreateTable(columns) => create_table_sql(table_name, columns),
            Change::AddColumn(col) => {
                format!(
                    "ALTER TABLE {} ADD COLUMN {};",
                    table_name,
                    col.definition_sql()
                )
            }
            Change::DropColumn(name) => {
                format!(
                    "ALTER TABLE {} DROP COLUMN {};",
                    table_name,
                    sql_ident(name)
                )
            }
            Change::CreateIndex(idx) => create_index_sql(table_name, idx),
            Change::DropIndex(name) => format!("DROP INDEX IF EXISTS {};", sql_ident(name)),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::CreateTable(columns) => write!(f, "+ table ({} columns)", columns.len()),
            Change::AddColumn(col) => write!(f, "+ {}: {}", col.name(), col.type_sql()),
            Change::DropColumn(name) => write!(f, "- {}", name),
            Change::CreateIndex(idx) => {
                let unique = if idx.unique { "unique " } else { "" };
                write!(
                    f,
                    "+ {}index {} ({})",
                    unique,
                    idx.name,
                    idx.columns.join(", ")
                )
            }
            Change::DropIndex(name) => write!(f, "- index {}", name),
        }
    }
}

/// Columns to add (declared order), then columns to drop (live order).
pub fn plan_columns(declared: &[Column], live: &[LiveColumn]) -> Vec<Change> {
    let live_names: HashSet<&str> = live.iter().map(|c| c.name.as_str()).collect();
    let declared_names: HashSet<&str> = declared.iter().map(|c| c.name()).collect();

    let mut changes = Vec::new();

    for col in declared {
        if !live_names.contains(col.name()) {
            changes.push(Change::AddColumn(col.clone()));
        }
    }

    for col in live {
        if !declared_names.contains(col.name.as_str()) {
            changes.push(Change::DropColumn(col.name.clone()));
        }
    }

    changes
}

/// Indexes to drop, then indexes to create.
///
/// Live indexes not declared by name are dropped unless they back a
/// constraint. Declared indexes whose name is still live afterwards are
/// left alone.
pub fn plan_indexes(declared: &[ResolvedIndex], live: &[LiveIndex]) -> Vec<Change> {
    let declared_names: HashSet<&str> = declared.iter().map(|i| i.name.as_str()).collect();

    let mut changes = Vec::new();
    let mut remaining: HashSet<&str> = HashSet::new();

    for idx in live {
        if idx.constraint_backed || declared_names.contains(idx.name.as_str()) {
            remaining.insert(idx.name.as_str());
        } else {
            changes.push(Change::DropIndex(idx.name.clone()));
        }
    }

    for idx in declared {
        if remaining.insert(idx.name.as_str()) {
            changes.push(Change::CreateIndex(idx.clone()));
        }
    }

    changes
}
