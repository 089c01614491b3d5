//! Fixed-size slotted page used by every file format in the engine.
//!
//! A page is a 4096-byte unit of disk I/O. The slot directory grows upward
//! from the header, the tuple region grows downward from the end of the page
//! (or from the start of the reserved special tail, when one exists):
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────┐
//!   │ Page Header (24 bytes: checksum, LSN, slot/free bookkeeping)  │
//!   ├───────────────────────────────────────────────────────────────┤
//!   │ Slot Directory (4-byte entries, grows downward on the page)   │
//!   ├───────────────────────────────────────────────────────────────┤
//!   │ Free Space                                                    │
//!   ├───────────────────────────────────────────────────────────────┤
//!   │ Tuple Region (grows upward toward the header)                 │
//!   ├───────────────────────────────────────────────────────────────┤
//!   │ Special Tail (optional; index sibling/child pointers)         │
//!   └───────────────────────────────────────────────────────────────┘
//!
//!     ^ offset 0                                     offset 4096 ^
//! ```
//!
//! Header access is provided via `header::HeaderRef` and `header::HeaderMut`.
//! Slot access is provided via `slot::SlotRef` and `slot::SlotMut`.

pub mod errors;
pub mod header;
pub mod insertion_plan;
pub mod page_id;
pub mod page_kind;
pub mod rid;
pub(crate) mod slot;
pub(crate) mod slot_array;

pub mod page;

#[cfg(test)]
mod tests;

pub use page::api::Page;

/// Size of a page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Size of the page header in bytes.
pub use header::HEADER_SIZE;
