use crate::errors::delete_error::DeleteError;
use crate::errors::slot_error::SlotError;
use crate::page::api::Page;

impl Page {
    pub(super) fn delete_row_internal(&mut self, slot_index: u16) -> Result<(), DeleteError> {
        // Refuse attempts to delete an invalid slot number before mutating
        // anything.
        {
            let slot_array = self.slot_array_ref()?;
            let slot = slot_array.slot_ref(slot_index)?;
            if !self.is_slot_valid(&slot)? {
                return Err(SlotError::InvalidSlot {
                    slot_index: slot_index as usize,
                }
                .into());
            }
        }

        // Zero the slot. The tuple bytes become dead space, reclaimed by the
        // next compaction; the slot id is eligible for reuse by inserts.
        let mut slot_array = self.slot_array_mut()?;
        let mut slot = slot_array.slot_mut(slot_index)?;
        slot.set_length(0)?;
        slot.set_offset(0)?;

        Ok(())
    }
}

#[cfg(test)]
mod delete_row_tests {
    use super::*;
    use crate::page_id::PageId;
    use crate::page_kind::PageKind;

    #[test]
    fn delete_zeroes_slot_and_keeps_directory_size() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let plan = page.plan_insert_internal(10).unwrap();
        let slot = page.insert_internal(plan, &[1u8; 10]).unwrap();

        page.delete_row_internal(slot).unwrap();

        assert_eq!(page.header_ref().unwrap().get_num_slots().unwrap(), 1);
        let slot_array = page.slot_array_ref().unwrap();
        let deleted = slot_array.slot_ref(slot).unwrap();
        assert_eq!(deleted.offset().unwrap(), 0);
        assert_eq!(deleted.length().unwrap(), 0);
    }

    #[test]
    fn delete_does_not_reclaim_space_until_compaction() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let plan = page.plan_insert_internal(10).unwrap();
        let slot = page.insert_internal(plan, &[1u8; 10]).unwrap();
        let gap_before = page.free_gap().unwrap();

        page.delete_row_internal(slot).unwrap();
        assert_eq!(page.free_gap().unwrap(), gap_before);

        page.compact_internal().unwrap();
        assert!(page.free_gap().unwrap() > gap_before);
    }

    #[test]
    fn double_delete_fails() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let plan = page.plan_insert_internal(4).unwrap();
        let slot = page.insert_internal(plan, &[1u8; 4]).unwrap();
        page.delete_row_internal(slot).unwrap();
        assert!(matches!(
            page.delete_row_internal(slot),
            Err(DeleteError::SlotError(SlotError::InvalidSlot { .. }))
        ));
    }
}
