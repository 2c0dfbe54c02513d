//! Declared table structure for pgtable.
//!
//! Column descriptors, the closed set of supported SQL types, index
//! declarations, and the DDL they render to. Nothing here touches a
//! database; the reconciler in `pgtable` compares these declarations
//! against what it finds live.

mod column;
pub use column::*;

mod ddl;
pub use ddl::*;

mod error;
pub use error::*;

mod index;
pub use index::*;

mod types;
pub use types::*;
