//! Positional placeholders: the running parameter list and `$n` renumbering.

use crate::Value;

/// Parameters collected while rendering, with the index the first one gets.
///
/// Every fragment pushes its values here and writes the returned index as
/// `$n`, so numbering stays correct however fragments are nested.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    start: usize,
    values: Vec<Value>,
}

impl Params {
    /// Empty list whose first placeholder is `$1`.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Empty list whose first placeholder is `$start`.
    pub fn starting_at(start: usize) -> Self {
        Self {
            start: start.max(1),
            values: Vec::new(),
        }
    }

    /// Append a value and return its placeholder index.
    pub fn push(&mut self, value: Value) -> usize {
        self.values.push(value);
        self.start + self.values.len() - 1
    }

    /// Index the next pushed value will get.
    pub fn next_index(&self) -> usize {
        self.start + self.values.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::new()
    }
}

/// Renumber every `$<digits>` placeholder in `sql` by adding `by`.
///
/// Text inside single-quoted literals and double-quoted identifiers is left
/// alone, as is a `$` that continues an identifier or is not followed by a
/// digit (dollar-quote tags such as `$body$`).
///
/// ```
/// use pgtable_sql::shift_placeholders;
/// assert_eq!(
///     shift_placeholders("a = $1 AND b BETWEEN $2 AND $3", 2),
///     "a = $3 AND b BETWEEN $4 AND $5"
/// );
/// assert_eq!(shift_placeholders("note = '$1'", 5), "note = '$1'");
/// ```
pub fn shift_placeholders(sql: &str, by: usize) -> String {
    if by == 0 {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                out.push(c);
            }
            None if c == '$' && !prev.is_some_and(continues_ident) => {
                let digits_start = i + 1;
                let mut digits_end = digits_start;
                while let Some(&(j, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits_end = j + 1;
                    chars.next();
                }
                let digits = &sql[digits_start..digits_end];
                out.push('$');
                match digits.parse::<usize>().ok().and_then(|n| n.checked_add(by)) {
                    Some(n) => out.push_str(&n.to_string()),
                    None => out.push_str(digits),
                }
                prev = digits.chars().last().or(Some('$'));
                continue;
            }
            None => out.push(c),
        }
        prev = Some(c);
    }

    out
}

fn continues_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}
