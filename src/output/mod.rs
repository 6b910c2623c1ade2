// This module holds the output side of a post-link run: the file table listing one row
// of artifact paths per output module, the property set files describing the integer
// IDs assigned to specialization constants, and the writer that names and saves every
// per-partition artifact next to the table.

//! Output artifacts: file table, property sets and file writing.

pub mod property_set;
pub mod table;
pub mod writer;

pub use property_set::{PropertySetRegistry, PropertyValue};
pub use table::{SimpleTable, TableError, COL_CODE, COL_PROPS, COL_SYM};
pub use writer::ArtifactWriter;
