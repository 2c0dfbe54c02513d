//! SQL fragments for pgtable.
//!
//! Build WHERE clauses from column → value/filter mappings, then hand the
//! rendered SQL and its positional parameters to an executor. Placeholders
//! are numbered `$1, $2, ...` and can be shifted when clauses are combined.

mod clause;
pub use clause::*;

mod filter;
pub use filter::*;

mod ident;
pub use ident::*;

mod placeholder;
pub use placeholder::*;

mod value;
pub use value::*;
