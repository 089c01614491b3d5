use crate::types::TypeTag;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("column {column} expects {expected:?}, got {found}")]
    TypeMismatch {
        column: usize,
        expected: TypeTag,
        found: &'static str,
    },
    #[error("value count {values} does not match schema column count {columns}")]
    ArityMismatch { values: usize, columns: usize },
    #[error("schema has {0} columns, the tuple format supports at most 16")]
    TooManyColumns(usize),
    #[error("NULL written to non-nullable column {column}")]
    NotNullViolation { column: usize },
    #[error("tuple header declares {declared} bytes but the buffer holds {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("tuple truncated while reading column {column}")]
    Truncated { column: usize },
    #[error("tuple larger than the maximum encodable size ({0} bytes)")]
    TupleTooLarge(usize),
    #[error("cannot compare values of different types ({left} vs {right})")]
    IncomparableTypes {
        left: &'static str,
        right: &'static str,
    },
    #[error("NULL has no position in the ordering")]
    NullComparison,
    #[error("string of {0} bytes exceeds the u16 length prefix")]
    StringTooLong(usize),
    #[error("unknown type tag {0}")]
    UnknownTypeTag(u8),
}
