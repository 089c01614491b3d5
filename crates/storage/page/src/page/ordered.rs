//! Ordered-entry operations for the B-Tree node carrier.
//!
//! Index nodes keep their entries sorted, so the slot index *is* the sort
//! position: inserting shifts later directory entries right, removing shifts
//! them left. Nothing references a node slot from outside the page, which is
//! why this is safe — heap pages must never use these operations, their slot
//! ids are RID components.

use crate::errors::insert_error::InsertError;
use crate::errors::page_error::{PageResult, WithPageId};
use crate::errors::page_op_error::PageOpError;
use crate::errors::slot_error::SlotError;
use crate::header::HEADER_SIZE;
use crate::page::api::Page;
use crate::slot::SLOT_SIZE;

impl Page {
    /// Inserts an entry at the given sort position, shifting later entries
    /// right. Compacts first when the contiguous gap is too small.
    pub fn insert_entry_at(&mut self, index: u16, entry: &[u8]) -> PageResult<()> {
        self.insert_entry_at_internal(index, entry)
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Removes the entry at the given sort position, shifting later entries
    /// left. The entry bytes become dead space until compaction.
    pub fn remove_entry_at(&mut self, index: u16) -> PageResult<()> {
        self.remove_entry_at_internal(index)
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Bytes consumed by live entries plus their directory slots. The
    /// B-Tree's fill rule compares this against [`Page::entry_capacity`].
    pub fn used_bytes(&self) -> PageResult<usize> {
        let result = (|| -> Result<usize, SlotError> {
            let live = self.live_bytes()?;
            let slots = self.header_ref()?.get_num_slots()? as usize * SLOT_SIZE;
            Ok(live + slots)
        })();
        result.map_err(PageOpError::from).with_page_id(self.page_id)
    }

    /// Usable byte capacity of the page: everything between the header and
    /// the special tail.
    pub fn entry_capacity(&self) -> PageResult<usize> {
        let result = (|| -> Result<usize, SlotError> {
            let special_start = self.header_ref()?.get_special_start()? as usize;
            Ok(special_start - HEADER_SIZE)
        })();
        result.map_err(PageOpError::from).with_page_id(self.page_id)
    }

    fn insert_entry_at_internal(&mut self, index: u16, entry: &[u8]) -> Result<(), InsertError> {
        let num_slots = self.header_ref()?.get_num_slots()?;
        if index > num_slots {
            return Err(SlotError::InvalidSlot {
                slot_index: index as usize,
            }
            .into());
        }

        let needed = entry.len() + SLOT_SIZE;
        if needed > self.free_gap()? {
            if needed > self.reclaimable_gap()? {
                return Err(InsertError::PageFull {
                    tuple_len: entry.len(),
                    page_free_space: self.reclaimable_gap()?,
                });
            }
            self.compact_internal()?;
        }

        self.grow_directory()?;
        self.slot_array_mut()?.shift_right_from(index)?;
        self.place_at_free_end(index, entry)?;
        Ok(())
    }

    fn remove_entry_at_internal(&mut self, index: u16) -> Result<(), SlotError> {
        let num_slots = self.header_ref()?.get_num_slots()?;
        if index >= num_slots {
            return Err(SlotError::InvalidSlot {
                slot_index: index as usize,
            });
        }

        self.slot_array_mut()?.shift_left_onto(index)?;

        let mut header = self.header_mut()?;
        let free_start = header.get_free_start()?;
        header.set_num_slots(num_slots - 1)?;
        header.set_free_start(free_start - SLOT_SIZE as u16)?;
        Ok(())
    }
}

#[cfg(test)]
mod ordered_entry_tests {
    use super::*;
    use crate::page_id::PageId;
    use crate::page_kind::PageKind;

    fn index_page() -> Page {
        let mut page = Page::new_zeroed(PageId::new(1, 1));
        page.initialize(PageId::new(1, 1), PageKind::IndexLeaf)
            .unwrap();
        page
    }

    #[test]
    fn insert_entry_in_middle_shifts_later_entries() {
        let mut page = index_page();
        page.insert_entry_at(0, b"aa").unwrap();
        page.insert_entry_at(1, b"cc").unwrap();
        page.insert_entry_at(1, b"bb").unwrap();

        assert_eq!(page.row(0).unwrap(), b"aa");
        assert_eq!(page.row(1).unwrap(), b"bb");
        assert_eq!(page.row(2).unwrap(), b"cc");
    }

    #[test]
    fn remove_entry_shifts_later_entries_left() {
        let mut page = index_page();
        page.insert_entry_at(0, b"aa").unwrap();
        page.insert_entry_at(1, b"bb").unwrap();
        page.insert_entry_at(2, b"cc").unwrap();

        page.remove_entry_at(1).unwrap();

        assert_eq!(page.slot_count().unwrap(), 2);
        assert_eq!(page.row(0).unwrap(), b"aa");
        assert_eq!(page.row(1).unwrap(), b"cc");
    }

    #[test]
    fn insert_entry_past_count_is_rejected() {
        let mut page = index_page();
        assert!(page.insert_entry_at(1, b"zz").is_err());
    }

    #[test]
    fn entries_fill_and_compact_transparently() {
        let mut page = index_page();
        // Fill with fixed-width entries, remove every other one, then keep
        // inserting; compaction must kick in instead of PageFull.
        let entry = [0u8; 64];
        let mut count = 0u16;
        while page.insert_entry_at(count, &entry).is_ok() {
            count += 1;
        }
        for i in (0..count / 2).rev() {
            page.remove_entry_at(i * 2).unwrap();
        }
        let remaining = page.slot_count().unwrap();
        page.insert_entry_at(remaining, &entry).unwrap();
    }

    #[test]
    fn used_bytes_tracks_entries_and_slots() {
        let mut page = index_page();
        assert_eq!(page.used_bytes().unwrap(), 0);
        page.insert_entry_at(0, &[1u8; 10]).unwrap();
        assert_eq!(page.used_bytes().unwrap(), 10 + 4);
    }
}
