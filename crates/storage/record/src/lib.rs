//! Typed values, schemas, and the tuple codec.
//!
//! A tuple is the binary encoding of one row against a schema:
//!
//! ```text
//! | tuple_len: u16 | null_bitmap: u16 | flags: u16 | column data ... |
//! ```
//!
//! Column data follows schema order and skips columns whose null bit is set
//! (LSB = column 0). Fixed-width types are stored big-endian; strings carry a
//! u16 length prefix. `tuple_len` covers the whole tuple, header included.

pub mod codec;
pub mod errors;
pub mod schema;
pub mod types;
pub mod value;

pub use codec::{TUPLE_HEADER_LEN, decode, encode};
pub use errors::RecordError;
pub use schema::{Column, MAX_COLUMNS, Schema};
pub use types::TypeTag;
pub use value::Value;
