//! The Where-Clause Builder.

use indexmap::IndexMap;

use crate::{Filter, IdentError, Params, Value, shift_placeholders, validate_ident};

/// What a single column must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `<col> = $n`, or `<col> IS NULL` for [`Value::Null`]
    Eq(Value),

    /// Anything a [`Filter`] renders
    Filter(Filter),
}

impl Condition {
    /// The plain value, if this is an equality.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Condition::Eq(v) => Some(v),
            Condition::Filter(_) => None,
        }
    }

    fn render(&self, column: &str, params: &mut Params) -> String {
        match self {
            Condition::Eq(Value::Null) => format!("{column} IS NULL"),
            Condition::Eq(v) => {
                let idx = params.push(v.clone());
                format!("{column} = ${idx}")
            }
            Condition::Filter(f) => f.render(column, params),
        }
    }
}

impl From<Value> for Condition {
    fn from(v: Value) -> Self {
        Condition::Eq(v)
    }
}

impl From<Filter> for Condition {
    fn from(f: Filter) -> Self {
        Condition::Filter(f)
    }
}

/// Ordered column → condition mapping.
///
/// Conditions render in insertion order and join with `AND`.
///
/// ```
/// use pgtable_sql::{Filter, Where};
/// let w = Where::new()
///     .eq("status", "active")
///     .filter("age", Filter::between(18, 30));
/// assert_eq!(w.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    conditions: IndexMap<String, Condition>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `column = value`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, Condition::Eq(value.into()));
        self
    }

    /// Require `column` to pass `filter`.
    pub fn filter(mut self, column: impl Into<String>, filter: Filter) -> Self {
        self.insert(column, Condition::Filter(filter));
        self
    }

    /// Set the condition for `column`, replacing any earlier one in place.
    pub fn insert(&mut self, column: impl Into<String>, condition: impl Into<Condition>) {
        self.conditions.insert(column.into(), condition.into());
    }

    pub fn get(&self, column: &str) -> Option<&Condition> {
        self.conditions.get(column)
    }

    pub fn contains_key(&self, column: &str) -> bool {
        self.conditions.contains_key(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl<K, C> FromIterator<(K, C)> for Where
where
    K: Into<String>,
    C: Into<Condition>,
{
    fn from_iter<I: IntoIterator<Item = (K, C)>>(iter: I) -> Self {
        let mut w = Where::new();
        for (k, c) in iter {
            w.insert(k, c);
        }
        w
    }
}

/// Ordered column → value assignments for insert and update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    values: IndexMap<String, Value>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `value` to `column`.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
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
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// A rendered boolean expression and the values its placeholders bind to.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

impl WhereClause {
    /// Render `conditions` with placeholders starting at `$1`.
    pub fn build(conditions: &Where) -> Result<Self, IdentError> {
        Self::build_from(conditions, 1)
    }

    /// Render `conditions` with placeholders starting at `$start`.
    ///
    /// Every column name is validated before anything is rendered. An empty
    /// mapping renders the tautology `1=1`.
    pub fn build_from(conditions: &Where, start: usize) -> Result<Self, IdentError> {
        for column in conditions.columns() {
            validate_ident(column)?;
        }
        if conditions.is_empty() {
            return Ok(Self::always());
        }

        let mut params = Params::starting_at(start);
        let parts: Vec<String> = conditions
            .iter()
            .map(|(column, condition)| condition.render(column, &mut params))
            .collect();

        Ok(WhereClause {
            sql: parts.join(" AND "),
            params: params.into_values(),
        })
    }

    /// `1=1` with no parameters.
    pub fn always() -> Self {
        WhereClause {
            sql: "1=1".to_string(),
            params: Vec::new(),
        }
    }

    /// Conjoin two clauses numbered independently from `$1`.
    ///
    /// `other`'s placeholders are shifted past this clause's parameters.
    pub fn and(mut self, other: WhereClause) -> Self {
        let shifted = shift_placeholders(&other.sql, self.params.len());
        self.sql = format!("({}) AND ({})", self.sql, shifted);
        self.params.extend(other.params);
        self
    }
}
