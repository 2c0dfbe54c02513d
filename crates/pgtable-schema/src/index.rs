use pgtable_sql::{index_name, validate_ident};

use crate::IndexSpecError;

/// A typed index declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexSpec {
    /// Defaults to `idx_<table>_<col1>_<col2>...`
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    /// A non-unique index over `columns`, in order.
    pub fn on<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IndexSpec {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// An index declaration as the table receives it.
///
/// `Pairs` carries loosely-keyed declarations such as those read from a
/// config file: `name`, `columns` (comma-separated) and `unique`
/// (`true`/`false`). Any other key makes the declaration invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexDecl {
    Spec(IndexSpec),
    Pairs(Vec<(String, String)>),
}

impl From<IndexSpec> for IndexDecl {
    fn from(spec: IndexSpec) -> Self {
        IndexDecl::Spec(spec)
    }
}

impl IndexDecl {
    /// Check the declaration against the table's columns and fill in the
    /// default name.
    pub fn resolve(&self, table: &str, columns: &[&str]) -> Result<ResolvedIndex, IndexSpecError> {
        let spec = match self {
            IndexDecl::Spec(spec) => spec.clone(),
            IndexDecl::Pairs(pairs) => spec_from_pairs(pairs)?,
        };

        if spec.columns.is_empty() {
            return Err(IndexSpecError::MissingColumns);
        }
        for col in &spec.columns {
            if !columns.contains(&col.as_str()) {
                return Err(IndexSpecError::UnknownColumn { name: col.clone() });
            }
        }

        let name = match spec.name {
            Some(name) => name,
            None => index_name(table, &spec.columns),
        };
        validate_ident(&name)?;

        Ok(ResolvedIndex {
            name,
            columns: spec.columns,
            unique: spec.unique,
        })
    }
}

fn spec_from_pairs(pairs: &[(String, String)]) -> Result<IndexSpec, IndexSpecError> {
    let mut spec = IndexSpec::default();
    for (key, value) in pairs {
        match key.as_str() {
            "name" => spec.name = Some(value.trim().to_string()),
            "columns" => {
                spec.columns = value
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "unique" => {
                spec.unique = match value.trim().to_ascii_lowercase().as_str() {
                    "true" => true,
                    "false" => false,
                    _ => {
                        return Err(IndexSpecError::InvalidUnique {
                            value: value.clone(),
                        });
                    }
                };
            }
            _ => return Err(IndexSpecError::UnknownKey { key: key.clone() }),
        }
    }
    Ok(spec)
}

/// A validated index with its final name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIndex {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}
