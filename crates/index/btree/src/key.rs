//! Typed key encoding for index entries.
//!
//! Keys are stored in the same big-endian forms the tuple codec uses: INT and
//! DATE as 4-byte i32, FLOAT as 8-byte f64, STRING with a u16 length prefix.
//! Ordering always goes through [`record::Value::compare`]; the byte form is
//! storage only. BOOLEAN keys and NULL keys are rejected.

use crate::errors::{BTreeError, BTreeResult};
use binary_helpers::be::{read_be, write_be};
use record::{TypeTag, Value};
use std::cmp::Ordering;

/// Validates a value against the index key type. NULL is disallowed in keys.
pub fn check_key(key: &Value, tag: TypeTag) -> BTreeResult<()> {
    if tag == TypeTag::Bool {
        return Err(BTreeError::KeyTypeMismatch {
            expected: tag,
            found: "boolean keys are not supported",
        });
    }
    match key.type_tag() {
        None => Err(BTreeError::KeyTypeMismatch {
            expected: tag,
            found: "null",
        }),
        Some(actual) if actual == tag => Ok(()),
        Some(_) => Err(BTreeError::KeyTypeMismatch {
            expected: tag,
            found: key.type_name(),
        }),
    }
}

/// Serializes a key into its storage form.
pub fn encode_key(key: &Value, tag: TypeTag) -> BTreeResult<Vec<u8>> {
    check_key(key, tag)?;
    let mut buf;
    match key {
        Value::Int(v) | Value::Date(v) => {
            buf = vec![0u8; 4];
            let _ = write_be::<i32>(&mut buf, 0, *v);
        }
        Value::Float(v) => {
            buf = vec![0u8; 8];
            let _ = write_be::<f64>(&mut buf, 0, *v);
        }
        Value::Str(s) => {
            buf = vec![0u8; 2 + s.len()];
            let _ = write_be::<u16>(&mut buf, 0, s.len() as u16);
            buf[2..].copy_from_slice(s.as_bytes());
        }
        Value::Bool(_) | Value::Null => unreachable!("rejected by check_key"),
    }
    Ok(buf)
}

/// Deserializes a key from the front of `bytes`, returning the value and the
/// number of bytes consumed.
pub fn decode_key(bytes: &[u8], tag: TypeTag) -> BTreeResult<(Value, usize)> {
    let corrupt = || BTreeError::CorruptIndex("truncated key in node entry".to_string());
    match tag {
        TypeTag::Int => {
            let v = read_be::<i32>(bytes, 0).map_err(|_| corrupt())?;
            Ok((Value::Int(v), 4))
        }
        TypeTag::Date => {
            let v = read_be::<i32>(bytes, 0).map_err(|_| corrupt())?;
            Ok((Value::Date(v), 4))
        }
        TypeTag::Float => {
            let v = read_be::<f64>(bytes, 0).map_err(|_| corrupt())?;
            Ok((Value::Float(v), 8))
        }
        TypeTag::Str => {
            let len = read_be::<u16>(bytes, 0).map_err(|_| corrupt())? as usize;
            let end = 2 + len;
            if end > bytes.len() {
                return Err(corrupt());
            }
            let s = std::str::from_utf8(&bytes[2..end])
                .map_err(|_| BTreeError::CorruptIndex("non-utf8 string key".to_string()))?;
            Ok((Value::Str(s.to_string()), end))
        }
        TypeTag::Bool => Err(BTreeError::KeyTypeMismatch {
            expected: tag,
            found: "boolean keys are not supported",
        }),
    }
}

/// Compares two keys of the same type.
pub fn compare_keys(a: &Value, b: &Value) -> BTreeResult<Ordering> {
    Ok(a.compare(b)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_key_round_trip() {
        let bytes = encode_key(&Value::Int(-7), TypeTag::Int).unwrap();
        let (value, used) = decode_key(&bytes, TypeTag::Int).unwrap();
        assert_eq!(value, Value::Int(-7));
        assert_eq!(used, 4);
    }

    #[test]
    fn string_key_round_trip_with_trailing_bytes() {
        let mut bytes = encode_key(&Value::Str("hi".into()), TypeTag::Str).unwrap();
        bytes.extend_from_slice(&[0xFF; 6]); // a RID follows in real entries
        let (value, used) = decode_key(&bytes, TypeTag::Str).unwrap();
        assert_eq!(value, Value::Str("hi".into()));
        assert_eq!(used, 4);
    }

    #[test]
    fn null_key_is_rejected() {
        assert!(matches!(
            encode_key(&Value::Null, TypeTag::Int),
            Err(BTreeError::KeyTypeMismatch { .. })
        ));
    }

    #[test]
    fn bool_key_type_is_rejected() {
        assert!(matches!(
            encode_key(&Value::Bool(true), TypeTag::Bool),
            Err(BTreeError::KeyTypeMismatch { .. })
        ));
    }

    #[test]
    fn mismatched_key_type_is_rejected() {
        assert!(matches!(
            encode_key(&Value::Str("1".into()), TypeTag::Int),
            Err(BTreeError::KeyTypeMismatch { .. })
        ));
    }
}
