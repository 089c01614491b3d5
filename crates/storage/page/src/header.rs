//! Layout and accessors for the page header.
//!
//! # Page Header Layout
//!
//! The page header occupies the first **24 bytes** of every page. All fields
//! are stored in **big-endian** binary format.
//!
//! | Field           | Type  | Offset | Description |
//! |-----------------|-------|--------|-------------|
//! | `checksum`      | u32   | [`CHECKSUM`]      | CRC32 of the page with this field zeroed. Stamped by the pager at write time. |
//! | `page_lsn`      | u64   | [`PAGE_LSN`]      | LSN of the last logged mutation applied to this page. |
//! | `num_slots`     | u16   | [`NUM_SLOTS`]     | Number of entries in the slot directory (live or deleted). |
//! | `free_start`    | u16   | [`FREE_START`]    | First byte past the slot directory; `24 + num_slots * 4`. |
//! | `free_end`      | u16   | [`FREE_END`]      | First byte of the tuple region; decrements on insert. |
//! | `flags`         | u16   | [`FLAGS`]         | Page classification bits; bit 0 marks a B-Tree leaf. |
//! | `special_start` | u16   | [`SPECIAL_START`] | Start of the reserved tail; `4096` when the page has none. |
//! | `reserved`      | u16   | [`RESERVED`]      | Unused, kept zero. |
//!
//! Free space is the gap `[free_start, free_end)`. The invariants
//! `24 <= free_start <= free_end <= special_start <= 4096` and
//! `num_slots * 4 + 24 == free_start` hold for every well-formed page.

use crate::PAGE_SIZE;
use crate::errors::header_error::HeaderError;
use crate::page_kind::PageKind;
use binary_helpers::be::{read_be, write_be};
use binary_helpers::conversions::UsizeConversion;
use paste::paste;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 24;

/// The `HeaderRef` struct provides an immutable view into the header of a page.
#[derive(Debug)]
pub struct HeaderRef<'a> {
    bytes: &'a [u8; HEADER_SIZE],
}

impl<'a> HeaderRef<'a> {
    /// Creates a new `HeaderRef` from a slice of bytes if it matches the required size.
    pub fn new(bytes: &'a [u8]) -> Result<Self, HeaderError> {
        let bytes: &[u8; HEADER_SIZE] =
            bytes
                .try_into()
                .map_err(|_| HeaderError::HeaderSliceSizeMismatch {
                    expected: HEADER_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(HeaderRef { bytes })
    }
}

/// The `HeaderMut` struct provides a mutable view into the header of a page.
#[derive(Debug)]
pub struct HeaderMut<'a> {
    bytes: &'a mut [u8; HEADER_SIZE],
}

impl<'a> HeaderMut<'a> {
    /// Creates a new `HeaderMut` from a slice of bytes if it matches the required size.
    pub fn new(bytes: &'a mut [u8]) -> Result<Self, HeaderError> {
        let actual = bytes.len();
        let bytes: &mut [u8; HEADER_SIZE] = bytes
            .try_into()
            .map_err(|_| HeaderError::HeaderSliceSizeMismatch {
                expected: HEADER_SIZE,
                actual,
            })?;
        Ok(HeaderMut { bytes })
    }

    /// Resets every header field for a freshly initialized page of the given
    /// kind. The tuple region ends where the kind's special tail begins.
    pub fn reset(&mut self, kind: PageKind) -> Result<(), HeaderError> {
        let special_start = PAGE_SIZE - kind.special_len();
        self.set_checksum(0)?;
        self.set_page_lsn(0)?;
        self.set_num_slots(0)?;
        self.set_free_start(HEADER_SIZE.to_u16()?)?;
        self.set_free_end(special_start.to_u16()?)?;
        self.set_flags(kind.flags())?;
        self.set_special_start(special_start.to_u16()?)?;
        self.set_reserved(0)?;
        Ok(())
    }
}

/// Defines header field constants and getter/setter methods.
///
/// Pattern: `field_id(identifier): field_type(type) = field_offset(usize)`
macro_rules! impl_header_accessors {
    ( $( $field_name:ident : $field_type:ty = $field_offset:expr ; )* ) => {
        paste! {
            $(
                #[doc = concat!("Offset of ", stringify!($field_name), " — type ", stringify!($field_type))]
                pub const [<$field_name:upper>] : usize = $field_offset;

                impl<'a> HeaderRef<'a> {
                    #[doc = concat!(
                        "Getter for field `", stringify!($field_name), "`.\n",
                        "Type: `", stringify!($field_type), "`.\n",
                        "Offset: ", stringify!($field_offset), "."
                    )]
                    pub fn [<get_ $field_name>](&self)
                        -> Result<$field_type, HeaderError>
                    {
                        Ok(read_be::<$field_type>(self.bytes, $field_offset)?)
                    }
                }

                impl<'a> HeaderMut<'a> {
                    #[doc = concat!(
                        "Getter for field `", stringify!($field_name), "`.\n",
                        "Type: `", stringify!($field_type), "`.\n",
                        "Offset: ", stringify!($field_offset), "."
                    )]
                    pub fn [<get_ $field_name>](&self)
                        -> Result<$field_type, HeaderError>
                    {
                        Ok(read_be::<$field_type>(self.bytes, $field_offset)?)
                    }

                    #[doc = concat!(
                        "Setter for field `", stringify!($field_name), "`.\n",
                        "Type: `", stringify!($field_type), "`.\n",
                        "Offset: ", stringify!($field_offset), "."
                    )]
                    pub fn [<set_ $field_name>](&mut self, val: $field_type)
                        -> Result<(), HeaderError>
                    {
                        write_be::<$field_type>(self.bytes, $field_offset, val)?;
                        Ok(())
                    }
                }
            )*
        }
    };
}

impl_header_accessors! {
    checksum : u32 = 0;
    page_lsn : u64 = 4;
    num_slots : u16 = 12;
    free_start : u16 = 14;
    free_end : u16 = 16;
    flags : u16 = 18;
    special_start : u16 = 20;
    reserved : u16 = 22;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_ref_rejects_wrong_size() {
        let bytes = [0u8; HEADER_SIZE - 1];
        assert!(matches!(
            HeaderRef::new(&bytes),
            Err(HeaderError::HeaderSliceSizeMismatch {
                expected: HEADER_SIZE,
                actual: 23
            })
        ));
    }

    #[test]
    fn reset_for_heap_page_spans_full_page() {
        let mut bytes = [0xFFu8; HEADER_SIZE];
        let mut header = HeaderMut::new(&mut bytes).unwrap();
        header.reset(PageKind::Heap).unwrap();

        assert_eq!(header.get_num_slots().unwrap(), 0);
        assert_eq!(header.get_free_start().unwrap() as usize, HEADER_SIZE);
        assert_eq!(header.get_free_end().unwrap() as usize, PAGE_SIZE);
        assert_eq!(header.get_special_start().unwrap() as usize, PAGE_SIZE);
        assert_eq!(header.get_flags().unwrap(), 0);
    }

    #[test]
    fn reset_for_index_leaf_reserves_special_tail() {
        let mut bytes = [0u8; HEADER_SIZE];
        let mut header = HeaderMut::new(&mut bytes).unwrap();
        header.reset(PageKind::IndexLeaf).unwrap();

        assert_eq!(header.get_free_end().unwrap() as usize, PAGE_SIZE - 8);
        assert_eq!(header.get_special_start().unwrap() as usize, PAGE_SIZE - 8);
        assert_eq!(header.get_flags().unwrap() & 0x1, 0x1);
    }

    #[test]
    fn fields_are_stored_big_endian() {
        let mut bytes = [0u8; HEADER_SIZE];
        {
            let mut header = HeaderMut::new(&mut bytes).unwrap();
            header.set_num_slots(0x0102).unwrap();
        }
        assert_eq!(&bytes[NUM_SLOTS..NUM_SLOTS + 2], &[0x01, 0x02]);
    }
}
