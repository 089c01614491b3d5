use crate::errors::insert_error::InsertError;
use crate::errors::slot_error::SlotError;
use crate::insertion_plan::{InsertionPlan, InsertionSlot};
use crate::page::api::Page;
use crate::slot::SLOT_SIZE;

impl Page {
    pub(super) fn insert_internal(
        &mut self,
        plan: InsertionPlan,
        tuple: &[u8],
    ) -> Result<u16, InsertError> {
        // If compaction is required, do it now. The tuple then lands at the
        // (new) free_end.
        if plan.compact_first {
            self.compact_internal()?;
        }

        // Re-verify against the current header; the plan may be stale if the
        // page changed since it was computed.
        let slot_cost = match plan.slot {
            InsertionSlot::Reuse(_) => 0,
            InsertionSlot::New => SLOT_SIZE,
        };
        let contiguous = self.free_gap()?;
        if tuple.len() + slot_cost > contiguous {
            return Err(InsertError::PageFull {
                tuple_len: tuple.len(),
                page_free_space: contiguous,
            });
        }

        let slot_index = match plan.slot {
            InsertionSlot::Reuse(idx) => {
                // The planned slot must still be deleted.
                let slot_array = self.slot_array_ref()?;
                let slot = slot_array.slot_ref(idx)?;
                if self.is_slot_valid(&slot)? {
                    return Err(SlotError::InvalidSlot {
                        slot_index: idx as usize,
                    }
                    .into());
                }
                idx
            }
            InsertionSlot::New => self.grow_directory()?,
        };

        self.place_at_free_end(slot_index, tuple)?;
        Ok(slot_index)
    }

    /// Places a tuple at a specific slot index, growing the directory with
    /// zeroed entries as needed. Recovery replays logged inserts through this
    /// path so tuples land back at their original RIDs.
    pub(super) fn insert_at_slot_internal(
        &mut self,
        slot_index: u16,
        tuple: &[u8],
    ) -> Result<(), InsertError> {
        let num_slots = self.header_ref()?.get_num_slots()?;

        if slot_index < num_slots {
            let slot_array = self.slot_array_ref()?;
            let slot = slot_array.slot_ref(slot_index)?;
            if self.is_slot_valid(&slot)? {
                return Err(SlotError::InvalidSlot {
                    slot_index: slot_index as usize,
                }
                .into());
            }
        } else {
            // Directory growth itself consumes free space; account for the
            // tuple plus every missing slot entry.
            let missing = (slot_index - num_slots + 1) as usize;
            let needed = tuple.len() + missing * SLOT_SIZE;
            if needed > self.free_gap()? && needed > self.reclaimable_gap()? {
                return Err(InsertError::PageFull {
                    tuple_len: tuple.len(),
                    page_free_space: self.reclaimable_gap()?,
                });
            }
            while self.header_ref()?.get_num_slots()? <= slot_index {
                self.grow_directory()?;
            }
        }

        if tuple.len() > self.free_gap()? {
            self.compact_internal()?;
        }
        if tuple.len() > self.free_gap()? {
            return Err(InsertError::PageFull {
                tuple_len: tuple.len(),
                page_free_space: self.free_gap()?,
            });
        }

        self.place_at_free_end(slot_index, tuple)?;
        Ok(())
    }
}

#[cfg(test)]
mod insert_tests {
    use super::*;
    use crate::page_id::PageId;
    use crate::page_kind::PageKind;
    use crate::{HEADER_SIZE, PAGE_SIZE};

    #[test]
    fn insert_appends_slot_and_decrements_free_end() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let plan = page.plan_insert_internal(10).unwrap();
        let slot = page.insert_internal(plan, &[7u8; 10]).unwrap();

        assert_eq!(slot, 0);
        let header = page.header_ref().unwrap();
        assert_eq!(header.get_num_slots().unwrap(), 1);
        assert_eq!(
            header.get_free_start().unwrap() as usize,
            HEADER_SIZE + SLOT_SIZE
        );
        assert_eq!(header.get_free_end().unwrap() as usize, PAGE_SIZE - 10);
        assert_eq!(page.read_row_internal(slot).unwrap(), &[7u8; 10]);
    }

    #[test]
    fn insert_reuses_deleted_slot_id() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let plan = page.plan_insert_internal(4).unwrap();
        let first = page.insert_internal(plan, &[1u8; 4]).unwrap();
        let plan = page.plan_insert_internal(4).unwrap();
        let second = page.insert_internal(plan, &[2u8; 4]).unwrap();

        page.delete_row_internal(first).unwrap();

        let plan = page.plan_insert_internal(6).unwrap();
        let reused = page.insert_internal(plan, &[3u8; 6]).unwrap();

        assert_eq!(reused, first);
        assert_eq!(page.header_ref().unwrap().get_num_slots().unwrap(), 2);
        assert_eq!(page.read_row_internal(second).unwrap(), &[2u8; 4]);
        assert_eq!(page.read_row_internal(reused).unwrap(), &[3u8; 6]);
    }

    #[test]
    fn insert_with_stale_plan_on_full_page_fails() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let plan = page.plan_insert_internal(2000).unwrap();
        page.insert_internal(plan, &[1u8; 2000]).unwrap();
        let stale = page.plan_insert_internal(2000).unwrap();
        page.insert_internal(stale, &[2u8; 2000]).unwrap();

        // Third insert with a recomputed plan must report PageFull.
        let result = page.plan_insert_internal(2000);
        assert!(matches!(result, Err(InsertError::PageFull { .. })));
    }

    #[test]
    fn insert_at_slot_extends_directory_with_empty_slots() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        page.insert_at_slot_internal(2, &[9u8; 5]).unwrap();

        assert_eq!(page.header_ref().unwrap().get_num_slots().unwrap(), 3);
        assert_eq!(page.read_row_internal(2).unwrap(), &[9u8; 5]);
        assert!(page.read_row_internal(0).is_err());
        assert!(page.read_row_internal(1).is_err());
    }

    #[test]
    fn insert_at_slot_rejects_live_slot() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let plan = page.plan_insert_internal(3).unwrap();
        let slot = page.insert_internal(plan, &[1u8; 3]).unwrap();
        assert!(page.insert_at_slot_internal(slot, &[2u8; 3]).is_err());
    }
}
