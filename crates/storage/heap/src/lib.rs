//! Heap table files.
//!
//! A `.tbl` file is a header page followed by slotted data pages. Page 0
//! carries the file magic/version/checksum (see the `pager` crate) and then
//! the JSON-encoded `{name, schema}` of the table. Tuples are addressed by
//! RID and live on pages 1..N.

pub mod errors;
pub mod heap_file;
pub mod scan;

pub use errors::{HeapError, HeapResult};
pub use heap_file::HeapFile;
pub use scan::HeapScan;
