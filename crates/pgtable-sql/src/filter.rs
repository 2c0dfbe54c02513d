//! Filter primitives: predicates that render to parameterized SQL.

use crate::{Params, Value};

/// A predicate on a single column that is richer than plain equality.
///
/// Filters render against a column name and the running [`Params`], so the
/// fragment numbers its placeholders correctly wherever it lands.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `<col> BETWEEN $n AND $n+1`
    Between(Value, Value),

    /// `<col> ILIKE $n`, the pattern bound verbatim
    Like(String),

    /// `<col> = ANY($n)`, the set bound as one array parameter
    In(Vec<Value>),

    /// `<col> IN ($n, $n+1, ...)`, one parameter per member
    InList(Vec<Value>),
}

impl Filter {
    /// Inclusive range.
    pub fn between(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Filter::Between(low.into(), high.into())
    }

    /// Case-insensitive match against a raw pattern (`%` and `_` are wildcards).
    pub fn like(pattern: impl Into<String>) -> Self {
        Filter::Like(pattern.into())
    }

    /// Case-insensitive substring match.
    pub fn contains(needle: &str) -> Self {
        Filter::Like(format!("%{needle}%"))
    }

    /// Case-insensitive prefix match.
    pub fn starts_with(prefix: &str) -> Self {
        Filter::Like(format!("{prefix}%"))
    }

    /// Case-insensitive suffix match.
    pub fn ends_with(suffix: &str) -> Self {
        Filter::Like(format!("%{suffix}"))
    }

    /// Set membership bound as a single array parameter.
    pub fn any_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In(values.into_iter().map(Into::into).collect())
    }

    /// Set membership expanded to one placeholder per member.
    pub fn in_list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::InList(values.into_iter().map(Into::into).collect())
    }

    /// Render this filter for `column`, appending its values to `params`.
    pub fn render(&self, column: &str, params: &mut Params) -> String {
        match self {
            Filter::Between(low, high) => {
                let low = params.push(low.clone());
                let high = params.push(high.clone());
                format!("{column} BETWEEN ${low} AND ${high}")
            }
            Filter::Like(pattern) => {
                let idx = params.push(Value::String(pattern.clone()));
                format!("{column} ILIKE ${idx}")
            }
            Filter::In(values) => {
                let idx = params.push(Value::Array(values.clone()));
                format!("{column} = ANY(${idx})")
            }
            Filter::InList(values) => {
                if values.is_empty() {
                    // `IN ()` is a syntax error; an empty set matches nothing.
                    return "FALSE".to_string();
                }
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| format!("${}", params.push(v.clone())))
                    .collect();
                format!("{column} IN ({})", placeholders.join(", "))
            }
        }
    }
}
