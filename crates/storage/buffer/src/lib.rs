//! Buffer pool for data pages.
//!
//! Frames cache page images between the storage layers and the pager. Page
//! latches are `RwLock`s around each frame, exposed as `guard`-like structs
//! that provide access to the `Page` instances via `&Page` / `&mut Page` and
//! release the frame pin on drop.
//!
//! The pool never evicts a dirty frame (no-steal): uncommitted mutations stay
//! in memory until the transaction layer flushes them after the commit record
//! is durable, which is what keeps redo-only recovery sound.

pub mod buffer;
mod errors;
mod frame;

/// Exposes `guard`-like structs that will provide the access to the `Page` instances
/// from the buffer via `&Page`
pub mod guards;

pub use buffer::BufferManager;
pub use errors::BufferError;
