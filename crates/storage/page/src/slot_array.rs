//! Slot Directory Handling
//! -----------------------
//!
//! This module provides zero-copy immutable and mutable views
//! (`SlotArrayRef` and `SlotArrayMut`) into the *slot directory* of a page.
//! The directory is a compact structure of fixed-size slots, each describing
//! the offset and length of a tuple stored elsewhere on the page.
//!
//! The directory starts right after the page header and grows toward the end
//! of the page as slots are appended; logical slot index `i` occupies the
//! `i`-th `SLOT_SIZE` chunk of the region, so appending a slot never moves
//! existing entries:
//!
//! ```text
//!     physical_start = slot_index * SLOT_SIZE
//!     physical_end   = physical_start + SLOT_SIZE
//! ```
//!
//! These types never own memory. They merely borrow the directory slice of
//! the page (`[HEADER_SIZE, free_start)`); slot access returns the
//! lightweight `SlotRef`/`SlotMut` views. Construction verifies the region is
//! exactly `slot_count * SLOT_SIZE` bytes.

use crate::errors::slot_error::SlotError;
use crate::slot::{SLOT_SIZE, SlotMut, SlotRef};
use std::ops::Range;

/// Immutable zero-copy view into the slot directory of a page.
#[derive(Debug)]
pub(crate) struct SlotArrayRef<'a> {
    /// View into the raw bytes of the slot directory.
    /// Each slot is of length `SLOT_SIZE` bytes.
    bytes: &'a [u8],
}

impl<'a> SlotArrayRef<'a> {
    /// Creates a new SlotArrayRef.
    /// Validates that the slice length matches the expected slot count.
    pub(super) fn new(bytes: &'a [u8], slot_count: u16) -> Result<Self, SlotError> {
        let expected_len = slot_count as usize * SLOT_SIZE;

        if bytes.len() != expected_len {
            return Err(SlotError::SlotRegionSizeMismatch {
                expected_size: expected_len,
                actual_size: bytes.len(),
            });
        }

        Ok(Self { bytes })
    }

    /// Gets an immutable view of the slot at the given index.
    /// Slots are zero-indexed.
    /// Returns an error if the slot index is out of bounds.
    pub(crate) fn slot_ref(&self, slot_index: u16) -> Result<SlotRef<'a>, SlotError> {
        let range = get_slot_range(self.bytes.len(), slot_index)?;

        let slot_bytes = self.bytes.get(range).ok_or(SlotError::InvalidSlot {
            slot_index: slot_index as usize,
        })?;

        SlotRef::from_raw(slot_index, slot_bytes)
    }
}

/// Mutable zero-copy view into the slot directory of a page.
#[derive(Debug)]
pub(crate) struct SlotArrayMut<'a> {
    /// View into the raw bytes of the slot directory.
    /// Each slot is of length `SLOT_SIZE` bytes.
    bytes: &'a mut [u8],
}

impl<'a> SlotArrayMut<'a> {
    /// Creates a new SlotArrayMut.
    /// Validates that the slice length matches the expected slot count.
    pub(super) fn new(bytes: &'a mut [u8], slot_count: u16) -> Result<Self, SlotError> {
        let expected_len = slot_count as usize * SLOT_SIZE;

        if bytes.len() != expected_len {
            return Err(SlotError::SlotRegionSizeMismatch {
                expected_size: expected_len,
                actual_size: bytes.len(),
            });
        }

        Ok(Self { bytes })
    }

    /// Gets an immutable view of the slot at the given index.
    /// Slots are zero-indexed.
    /// Returns an error if the slot index is out of bounds.
    pub(crate) fn slot_ref(&self, slot_index: u16) -> Result<SlotRef<'_>, SlotError> {
        let range = get_slot_range(self.bytes.len(), slot_index)?;

        let slot_bytes = self.bytes.get(range).ok_or(SlotError::InvalidSlot {
            slot_index: slot_index as usize,
        })?;

        SlotRef::from_raw(slot_index, slot_bytes)
    }

    /// Gets a mutable view of the slot at the given index.
    /// Slots are zero-indexed.
    /// Returns an error if the slot index is out of bounds.
    pub(crate) fn slot_mut(&mut self, slot_index: u16) -> Result<SlotMut<'_>, SlotError> {
        let range = get_slot_range(self.bytes.len(), slot_index)?;

        let slot_bytes = self.bytes.get_mut(range).ok_or(SlotError::InvalidSlot {
            slot_index: slot_index as usize,
        })?;

        SlotMut::from_raw(slot_index, slot_bytes)
    }

    /// Sets the values of a slot in the slot directory.
    pub(crate) fn set_slot(
        &mut self,
        slot_index: u16,
        slot_offset: u16,
        slot_length: u16,
    ) -> Result<(), SlotError> {
        let mut slot_mut = self.slot_mut(slot_index)?;
        slot_mut.set_length(slot_length)?;
        slot_mut.set_offset(slot_offset)?;
        Ok(())
    }

    /// Shifts every slot in `[from_index, slot_count)` one position toward
    /// the end of the directory, opening a hole at `from_index`. The caller
    /// must have grown the region by one slot beforehand; the last entry is
    /// overwritten.
    pub(crate) fn shift_right_from(&mut self, from_index: u16) -> Result<(), SlotError> {
        let from = from_index as usize * SLOT_SIZE;
        if from > self.bytes.len() {
            return Err(SlotError::InvalidSlot {
                slot_index: from_index as usize,
            });
        }
        self.bytes
            .copy_within(from..self.bytes.len() - SLOT_SIZE, from + SLOT_SIZE);
        Ok(())
    }

    /// Shifts every slot in `(at_index, slot_count)` one position toward the
    /// start of the directory, overwriting the entry at `at_index`. The
    /// caller shrinks the region afterwards.
    pub(crate) fn shift_left_onto(&mut self, at_index: u16) -> Result<(), SlotError> {
        let at = at_index as usize * SLOT_SIZE;
        if at + SLOT_SIZE > self.bytes.len() {
            return Err(SlotError::InvalidSlot {
                slot_index: at_index as usize,
            });
        }
        self.bytes.copy_within(at + SLOT_SIZE.., at);
        Ok(())
    }
}

fn get_slot_range(slot_array_size: usize, slot_index: u16) -> Result<Range<usize>, SlotError> {
    let start = slot_index as usize * SLOT_SIZE;
    let end = start + SLOT_SIZE;
    if end > slot_array_size {
        return Err(SlotError::InvalidSlot {
            slot_index: slot_index as usize,
        });
    }
    Ok(start..end)
}

#[cfg(test)]
mod slot_array_ref_tests {
    use super::*;

    #[test]
    fn new_invalid_size() {
        let bytes = vec![0u8; 10]; // Not a multiple of SLOT_SIZE
        let result = SlotArrayRef::new(&bytes, 3); // Expecting 3 slots (12 bytes)
        assert!(matches!(
            result,
            Err(SlotError::SlotRegionSizeMismatch {
                expected_size: 12,
                actual_size: 10
            })
        ));
    }

    #[test]
    fn slot_ref_invalid_index() {
        let bytes = vec![0u8; SLOT_SIZE * 2];
        let slot_array = SlotArrayRef::new(&bytes, 2).unwrap();
        let result = slot_array.slot_ref(3);
        assert!(matches!(result, Err(SlotError::InvalidSlot { slot_index: 3 })));
    }

    #[test]
    fn slot_ref_reads_slots_in_forward_order() {
        let mut bytes = vec![0u8; SLOT_SIZE * 2];
        bytes[0..4].copy_from_slice(&[0, 1, 0, 2]); // slot 0: offset=1, length=2
        bytes[4..8].copy_from_slice(&[0, 3, 0, 4]); // slot 1: offset=3, length=4

        let slot_array = SlotArrayRef::new(&bytes, 2).unwrap();

        let slot0 = slot_array.slot_ref(0).unwrap();
        assert_eq!(slot0.offset().unwrap(), 1);
        assert_eq!(slot0.length().unwrap(), 2);

        let slot1 = slot_array.slot_ref(1).unwrap();
        assert_eq!(slot1.offset().unwrap(), 3);
        assert_eq!(slot1.length().unwrap(), 4);
    }
}

#[cfg(test)]
mod slot_array_mut_tests {
    use super::*;

    #[test]
    fn set_slot_round_trips() {
        let mut bytes = vec![0u8; SLOT_SIZE * 2];
        let mut slot_array = SlotArrayMut::new(&mut bytes, 2).unwrap();

        slot_array.set_slot(1, 100, 7).unwrap();

        let slot = slot_array.slot_ref(1).unwrap();
        assert_eq!(slot.offset().unwrap(), 100);
        assert_eq!(slot.length().unwrap(), 7);
    }

    #[test]
    fn shift_right_opens_hole_at_index() {
        let mut bytes = vec![0u8; SLOT_SIZE * 3];
        {
            let mut slot_array = SlotArrayMut::new(&mut bytes, 3).unwrap();
            slot_array.set_slot(0, 10, 1).unwrap();
            slot_array.set_slot(1, 20, 2).unwrap();
            // slot 2 is the freshly grown entry, about to be overwritten
            slot_array.shift_right_from(1).unwrap();
            slot_array.set_slot(1, 15, 9).unwrap();

            assert_eq!(slot_array.slot_ref(0).unwrap().offset().unwrap(), 10);
            assert_eq!(slot_array.slot_ref(1).unwrap().offset().unwrap(), 15);
            assert_eq!(slot_array.slot_ref(2).unwrap().offset().unwrap(), 20);
        }
    }

    #[test]
    fn shift_left_removes_entry_at_index() {
        let mut bytes = vec![0u8; SLOT_SIZE * 3];
        {
            let mut slot_array = SlotArrayMut::new(&mut bytes, 3).unwrap();
            slot_array.set_slot(0, 10, 1).unwrap();
            slot_array.set_slot(1, 20, 2).unwrap();
            slot_array.set_slot(2, 30, 3).unwrap();

            slot_array.shift_left_onto(1).unwrap();

            assert_eq!(slot_array.slot_ref(0).unwrap().offset().unwrap(), 10);
            assert_eq!(slot_array.slot_ref(1).unwrap().offset().unwrap(), 30);
        }
    }
}
