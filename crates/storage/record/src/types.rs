use crate::errors::RecordError;
use serde::{Deserialize, Serialize};

/// On-disk and in-catalog tag identifying a column type.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    /// 32-bit signed integer, 4 bytes big-endian.
    Int = 1,
    /// IEEE-754 double, 8 bytes big-endian.
    Float = 2,
    /// Single byte, 0x00 or 0x01.
    Bool = 3,
    /// Days since 1970-01-01 as a 32-bit signed integer, 4 bytes big-endian.
    Date = 4,
    /// UTF-8 bytes with a u16 length prefix, at most 65535 bytes.
    #[serde(rename = "string")]
    Str = 5,
}

impl TypeTag {
    /// Encoded width of a non-null value of this type, excluding the string
    /// length prefix. `None` for variable-width types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            TypeTag::Int | TypeTag::Date => Some(4),
            TypeTag::Float => Some(8),
            TypeTag::Bool => Some(1),
            TypeTag::Str => None,
        }
    }
}

impl From<TypeTag> for u8 {
    fn from(tag: TypeTag) -> Self {
        tag as u8
    }
}

impl TryFrom<u8> for TypeTag {
    type Error = RecordError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(TypeTag::Int),
            2 => Ok(TypeTag::Float),
            3 => Ok(TypeTag::Bool),
            4 => Ok(TypeTag::Date),
            5 => Ok(TypeTag::Str),
            other => Err(RecordError::UnknownTypeTag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_from_u8() {
        for tag in [
            TypeTag::Int,
            TypeTag::Float,
            TypeTag::Bool,
            TypeTag::Date,
            TypeTag::Str,
        ] {
            assert_eq!(TypeTag::try_from(u8::from(tag)).unwrap(), tag);
        }
        assert!(TypeTag::try_from(99).is_err());
    }

    #[test]
    fn fixed_widths() {
        assert_eq!(TypeTag::Int.fixed_width(), Some(4));
        assert_eq!(TypeTag::Float.fixed_width(), Some(8));
        assert_eq!(TypeTag::Bool.fixed_width(), Some(1));
        assert_eq!(TypeTag::Date.fixed_width(), Some(4));
        assert_eq!(TypeTag::Str.fixed_width(), None);
    }
}
