use crate::errors::slot_error::SlotError;
use crate::errors::update_error::UpdateError;
use crate::page::api::Page;
use binary_helpers::conversions::UsizeConversion;

impl Page {
    pub(super) fn update_internal(
        &mut self,
        slot_index: u16,
        new_tuple: &[u8],
    ) -> Result<(), UpdateError> {
        let (old_length, old_offset) = {
            let slot_array = self.slot_array_ref()?;
            let slot = slot_array.slot_ref(slot_index)?;

            // quick check to ensure the slot points at a live tuple
            if !self.is_slot_valid(&slot)? {
                return Err(SlotError::InvalidSlot {
                    slot_index: slot_index as usize,
                }
                .into());
            }

            (slot.length()? as usize, slot.offset()? as usize)
        };

        // Shrinking (or equal) images are rewritten in place; the slot keeps
        // its offset and only the length changes. The freed tail bytes stay
        // dead until compaction.
        if new_tuple.len() <= old_length {
            self.data[old_offset..old_offset + new_tuple.len()].copy_from_slice(new_tuple);
            let mut slot_array = self.slot_array_mut()?;
            let mut slot = slot_array.slot_mut(slot_index)?;
            slot.set_length(new_tuple.len().to_u16()?)?;
            return Ok(());
        }

        // Growing image. Feasibility counts the old image as reclaimable.
        let live = self.live_bytes()?;
        let header = self.header_ref()?;
        let free_start = header.get_free_start()? as usize;
        let special_start = header.get_special_start()? as usize;
        let available = special_start - free_start - (live - old_length);

        if new_tuple.len() > available {
            return Err(UpdateError::PageFull {
                tuple_len: new_tuple.len(),
                page_free_space: available,
            });
        }

        if new_tuple.len() <= self.free_gap()? {
            // Fast path: append the new image into the free gap, retarget the
            // slot, and let the old region fragment.
            self.place_at_free_end(slot_index, new_tuple)?;
        } else {
            // The gap is too small but dead space suffices. Drop the old
            // image first so compaction reclaims it, then place.
            {
                let mut slot_array = self.slot_array_mut()?;
                let mut slot = slot_array.slot_mut(slot_index)?;
                slot.set_length(0)?;
                slot.set_offset(0)?;
            }
            self.compact_internal()?;
            self.place_at_free_end(slot_index, new_tuple)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod update_row_tests {
    use super::*;
    use crate::page_id::PageId;
    use crate::page_kind::PageKind;
    use crate::{HEADER_SIZE, PAGE_SIZE};

    #[test]
    fn update_smaller_rewrites_in_place() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let plan = page.plan_insert_internal(8).unwrap();
        let slot = page.insert_internal(plan, &[1u8; 8]).unwrap();
        let offset_before = {
            let slot_array = page.slot_array_ref().unwrap();
            slot_array.slot_ref(slot).unwrap().offset().unwrap()
        };

        page.update_internal(slot, &[2u8; 5]).unwrap();

        let slot_array = page.slot_array_ref().unwrap();
        let updated = slot_array.slot_ref(slot).unwrap();
        assert_eq!(updated.offset().unwrap(), offset_before);
        assert_eq!(updated.length().unwrap(), 5);
        drop(slot_array);
        assert_eq!(page.read_row_internal(slot).unwrap(), &[2u8; 5]);
    }

    #[test]
    fn update_larger_relocates_within_page_keeping_slot_id() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let plan = page.plan_insert_internal(8).unwrap();
        let slot = page.insert_internal(plan, &[1u8; 8]).unwrap();

        page.update_internal(slot, &[3u8; 20]).unwrap();

        assert_eq!(page.read_row_internal(slot).unwrap(), &[3u8; 20]);
        assert_eq!(page.header_ref().unwrap().get_num_slots().unwrap(), 1);
    }

    #[test]
    fn update_larger_compacts_when_gap_is_fragmented() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let big = (PAGE_SIZE - HEADER_SIZE) / 2 - 16;
        let plan = page.plan_insert_internal(big).unwrap();
        let a = page.insert_internal(plan, &vec![1u8; big]).unwrap();
        let plan = page.plan_insert_internal(big).unwrap();
        let b = page.insert_internal(plan, &vec![2u8; big]).unwrap();
        page.delete_row_internal(a).unwrap();

        // The free gap alone cannot hold the grown image; together with the
        // dead region it can.
        page.update_internal(b, &vec![4u8; big + 32]).unwrap();
        assert_eq!(page.read_row_internal(b).unwrap(), &vec![4u8; big + 32]);
    }

    #[test]
    fn update_past_capacity_is_page_full_and_leaves_tuple_intact() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let plan = page.plan_insert_internal(16).unwrap();
        let slot = page.insert_internal(plan, &[5u8; 16]).unwrap();

        let oversized = PAGE_SIZE; // can never fit
        let result = page.update_internal(slot, &vec![6u8; oversized]);
        assert!(matches!(result, Err(UpdateError::PageFull { .. })));
        assert_eq!(page.read_row_internal(slot).unwrap(), &[5u8; 16]);
    }

    #[test]
    fn update_of_deleted_slot_fails() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let plan = page.plan_insert_internal(4).unwrap();
        let slot = page.insert_internal(plan, &[1u8; 4]).unwrap();
        page.delete_row_internal(slot).unwrap();
        assert!(matches!(
            page.update_internal(slot, &[2u8; 4]),
            Err(UpdateError::SlotError(SlotError::InvalidSlot { .. }))
        ));
    }
}
