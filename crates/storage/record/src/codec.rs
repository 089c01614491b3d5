//! Tuple encode/decode against a schema.

use crate::errors::RecordError;
use crate::schema::Schema;
use crate::types::TypeTag;
use crate::value::Value;
use binary_helpers::be::{read_be, write_be};

/// Width of the tuple header: `tuple_len (u16) | null_bitmap (u16) | flags (u16)`.
pub const TUPLE_HEADER_LEN: usize = 6;

/// Encodes a row into its tuple form.
///
/// The row is validated against the schema first (arity, types, NOT NULL);
/// null columns set their bitmap bit (LSB = column 0) and contribute no
/// bytes. `tuple_len` covers the header plus the column data.
pub fn encode(schema: &Schema, values: &[Value]) -> Result<Vec<u8>, RecordError> {
    schema.check_row(values)?;

    let mut null_bitmap: u16 = 0;
    let mut data_len = 0usize;
    for (idx, value) in values.iter().enumerate() {
        match value {
            Value::Null => null_bitmap |= 1 << idx,
            Value::Str(s) => {
                if s.len() > u16::MAX as usize {
                    return Err(RecordError::StringTooLong(s.len()));
                }
                data_len += 2 + s.len();
            }
            other => {
                // Non-null, non-string values are fixed width by construction.
                let tag = other.type_tag().unwrap_or(TypeTag::Int);
                data_len += tag.fixed_width().unwrap_or(0);
            }
        }
    }

    let total = TUPLE_HEADER_LEN + data_len;
    if total > u16::MAX as usize {
        return Err(RecordError::TupleTooLarge(total));
    }

    let mut buf = vec![0u8; total];
    // Infallible: the buffer was sized above.
    let _ = write_be::<u16>(&mut buf, 0, total as u16);
    let _ = write_be::<u16>(&mut buf, 2, null_bitmap);
    let _ = write_be::<u16>(&mut buf, 4, 0);

    let mut at = TUPLE_HEADER_LEN;
    for value in values {
        match value {
            Value::Null => {}
            Value::Int(v) | Value::Date(v) => {
                let _ = write_be::<i32>(&mut buf, at, *v);
                at += 4;
            }
            Value::Float(v) => {
                let _ = write_be::<f64>(&mut buf, at, *v);
                at += 8;
            }
            Value::Bool(v) => {
                buf[at] = u8::from(*v);
                at += 1;
            }
            Value::Str(s) => {
                let _ = write_be::<u16>(&mut buf, at, s.len() as u16);
                buf[at + 2..at + 2 + s.len()].copy_from_slice(s.as_bytes());
                at += 2 + s.len();
            }
        }
    }

    Ok(buf)
}

/// Decodes a tuple back into its row, verifying the declared length matches
/// the buffer.
pub fn decode(schema: &Schema, bytes: &[u8]) -> Result<Vec<Value>, RecordError> {
    if bytes.len() < TUPLE_HEADER_LEN {
        return Err(RecordError::LengthMismatch {
            declared: TUPLE_HEADER_LEN,
            actual: bytes.len(),
        });
    }

    let declared = read_be::<u16>(bytes, 0).map_err(|_| RecordError::Truncated { column: 0 })? as usize;
    if declared != bytes.len() {
        return Err(RecordError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }
    let null_bitmap =
        read_be::<u16>(bytes, 2).map_err(|_| RecordError::Truncated { column: 0 })?;

    let mut values = Vec::with_capacity(schema.len());
    let mut at = TUPLE_HEADER_LEN;

    for (idx, column) in schema.columns.iter().enumerate() {
        if null_bitmap & (1 << idx) != 0 {
            values.push(Value::Null);
            continue;
        }

        let truncated = RecordError::Truncated { column: idx };
        match column.ty {
            TypeTag::Int => {
                let v = read_be::<i32>(bytes, at).map_err(|_| truncated)?;
                values.push(Value::Int(v));
                at += 4;
            }
            TypeTag::Date => {
                let v = read_be::<i32>(bytes, at).map_err(|_| truncated)?;
                values.push(Value::Date(v));
                at += 4;
            }
            TypeTag::Float => {
                let v = read_be::<f64>(bytes, at).map_err(|_| truncated)?;
                values.push(Value::Float(v));
                at += 8;
            }
            TypeTag::Bool => {
                let byte = *bytes.get(at).ok_or(truncated)?;
                values.push(Value::Bool(byte != 0));
                at += 1;
            }
            TypeTag::Str => {
                let len = read_be::<u16>(bytes, at).map_err(|_| truncated)? as usize;
                let start = at + 2;
                let end = start + len;
                if end > bytes.len() {
                    return Err(RecordError::TypeMismatch {
                        column: idx,
                        expected: TypeTag::Str,
                        found: "string length prefix past end of tuple",
                    });
                }
                let s = std::str::from_utf8(&bytes[start..end]).map_err(|_| {
                    RecordError::TypeMismatch {
                        column: idx,
                        expected: TypeTag::Str,
                        found: "invalid utf-8",
                    }
                })?;
                values.push(Value::Str(s.to_string()));
                at = end;
            }
        }
    }

    Ok(values)
}
