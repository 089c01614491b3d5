//! Paged file I/O.
//!
//! A [`pager::Pager`] owns one file and moves 4096-byte pages in and out of
//! it with checksum verification. A [`file_set::FileSet`] maps `FileId`s to
//! pagers so upper layers can address any page in any open file through a
//! composite `PageId`.
//!
//! # File format
//!
//! Page 0 of every file is a header page:
//!
//! | Offset | Field | |
//! |--------|-------|-|
//! | 0..2   | magic `0x4D44` | u16 big-endian |
//! | 2..4   | format version `1` | u16 big-endian |
//! | 4..8   | checksum | u32 big-endian, CRC32 of the page with this field zeroed |
//! | 8..    | owning layer's metadata (heap schema JSON, index root pointer) |
//!
//! Pages 1..N are slotted data pages whose checksum lives at offset 0 (see
//! the `page` crate header layout). The pager is the only component that
//! reads or writes checksum fields: it verifies on read and stamps on write,
//! so in-memory pages never carry a valid CRC.

pub mod errors;
pub mod file_set;
pub mod pager;

pub use errors::{PagerError, PagerResult};
pub use file_set::{FileSet, PageStore};
pub use pager::Pager;

/// File magic, "MD" in ASCII.
pub const MAGIC: u16 = 0x4D44;

/// On-disk format version understood by this build.
pub const FORMAT_VERSION: u16 = 1;

/// Byte offset of the checksum within the header page (page 0).
pub const HEADER_PAGE_CHECKSUM_OFFSET: usize = 4;

/// Byte offset at which the owning layer's metadata starts on page 0.
pub const HEADER_PAGE_PAYLOAD_OFFSET: usize = 8;
