//! Record identifiers.

use binary_helpers::be::{read_be, write_be};
use binary_helpers::bin_error::BinaryError;
use std::fmt;

/// Serialized width of a [`Rid`]: u32 page number + u16 slot id.
pub const RID_LEN: usize = 6;

/// Identifies one tuple within a heap file: `(page_no, slot_id)`.
///
/// A RID is stable from the insert that produced it until the tuple is
/// deleted. Updates that grow a tuple past its page produce a *new* RID;
/// callers holding index entries must propagate the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    /// Page number within the owning heap file.
    pub page_no: u32,
    /// Slot index within the page.
    pub slot_id: u16,
}

impl Rid {
    /// Creates a new `Rid`.
    pub fn new(page_no: u32, slot_id: u16) -> Self {
        Self { page_no, slot_id }
    }

    /// Serializes the RID as exactly [`RID_LEN`] big-endian bytes.
    pub fn to_bytes(self) -> [u8; RID_LEN] {
        let mut buf = [0u8; RID_LEN];
        // Writes into a correctly sized stack buffer never fail.
        let _ = write_be::<u32>(&mut buf, 0, self.page_no);
        let _ = write_be::<u16>(&mut buf, 4, self.slot_id);
        buf
    }

    /// Deserializes a RID from [`RID_LEN`] big-endian bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BinaryError> {
        Ok(Self {
            page_no: read_be::<u32>(bytes, 0)?,
            slot_id: read_be::<u16>(bytes, 4)?,
        })
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_no, self.slot_id)
    }
}
