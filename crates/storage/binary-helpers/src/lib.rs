//! Binary field helpers shared by every on-disk layout in the engine.
//!
//! All multi-byte fields in the page, heap, index and log formats are stored
//! in big-endian (network) order. This crate provides the checked
//! read/write primitives for those fields plus narrowing conversions for
//! in-page offsets.

pub mod be;
pub mod bin_error;
pub mod conversions;
