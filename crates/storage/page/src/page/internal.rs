use crate::HEADER_SIZE;
use crate::errors::header_error::HeaderError;
use crate::errors::slot_error::SlotError;
use crate::header::{HeaderMut, HeaderRef};
use crate::page::api::Page;
use crate::slot::{SLOT_SIZE, SlotRef};
use crate::slot_array::{SlotArrayMut, SlotArrayRef};
use binary_helpers::conversions::UsizeConversion;

/// Internal methods for the `Page` struct.
impl Page {
    /// Returns an immutable view of the header.
    #[inline]
    pub(crate) fn header_ref(&self) -> Result<HeaderRef<'_>, HeaderError> {
        HeaderRef::new(&self.data[..HEADER_SIZE])
    }

    /// Returns a mutable view of the header.
    #[inline]
    pub(crate) fn header_mut(&mut self) -> Result<HeaderMut<'_>, HeaderError> {
        HeaderMut::new(&mut self.data[..HEADER_SIZE])
    }

    /// Returns an immutable view of the slot directory.
    #[inline]
    pub(crate) fn slot_array_ref(&self) -> Result<SlotArrayRef<'_>, SlotError> {
        let free_start = self.header_ref()?.get_free_start()? as usize;
        let slot_count = self.header_ref()?.get_num_slots()?;
        SlotArrayRef::new(&self.data[HEADER_SIZE..free_start], slot_count)
    }

    /// Returns a mutable view of the slot directory.
    pub(crate) fn slot_array_mut(&mut self) -> Result<SlotArrayMut<'_>, SlotError> {
        let free_start = self.header_ref()?.get_free_start()? as usize;
        let slot_count = self.header_ref()?.get_num_slots()?;
        SlotArrayMut::new(&mut self.data[HEADER_SIZE..free_start], slot_count)
    }

    /// Contiguous free bytes between the slot directory and the tuple region.
    #[inline]
    pub(crate) fn free_gap(&self) -> Result<usize, HeaderError> {
        let header = self.header_ref()?;
        let free_start = header.get_free_start()? as usize;
        let free_end = header.get_free_end()? as usize;
        // free_start > free_end would mean a corrupt header
        free_end
            .checked_sub(free_start)
            .ok_or(HeaderError::OffsetArithmetic)
    }

    /// Sum of the lengths of all live tuples on the page.
    pub(crate) fn live_bytes(&self) -> Result<usize, SlotError> {
        let slot_count = self.header_ref()?.get_num_slots()?;
        let slot_array = self.slot_array_ref()?;
        let mut total = 0usize;
        for idx in 0..slot_count {
            let slot = slot_array.slot_ref(idx)?;
            if slot.length()? != 0 {
                total += slot.length()? as usize;
            }
        }
        Ok(total)
    }

    /// Free bytes the page could offer after a compaction, with the
    /// directory at its current size.
    pub(crate) fn reclaimable_gap(&self) -> Result<usize, SlotError> {
        let header = self.header_ref()?;
        let free_start = header.get_free_start()? as usize;
        let special_start = header.get_special_start()? as usize;
        let live = self.live_bytes()?;
        special_start
            .checked_sub(free_start + live)
            .ok_or(SlotError::HeaderError(HeaderError::OffsetArithmetic))
    }

    /// Determines if a slot is valid (used) or it has been invalidated (the tuple it referenced was deleted).
    pub(crate) fn is_slot_valid(&self, slot: &SlotRef) -> Result<bool, SlotError> {
        Ok(slot.length()? != 0 && slot.offset()? != 0)
    }

    /// Finds the lowest-index deleted slot, if any.
    pub(crate) fn lowest_deleted_slot(&self) -> Result<Option<u16>, SlotError> {
        let slot_count = self.header_ref()?.get_num_slots()?;
        let slot_array = self.slot_array_ref()?;
        for idx in 0..slot_count {
            let slot = slot_array.slot_ref(idx)?;
            if !self.is_slot_valid(&slot)? {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }

    /// Rewrites the tuple region contiguously against the special tail.
    ///
    /// Live tuples keep their relative physical order; slot ids never change.
    /// `free_end` lands at `special_start - live_bytes`.
    pub(crate) fn compact_internal(&mut self) -> Result<(), SlotError> {
        let header = self.header_ref()?;
        let special_start = header.get_special_start()? as usize;
        let slot_count = header.get_num_slots()?;

        // Collect live slots ordered by their current offset, highest first,
        // so packing from the tail preserves relative order.
        let mut live: Vec<(u16, usize, usize)> = Vec::new();
        {
            let slot_array = self.slot_array_ref()?;
            for idx in 0..slot_count {
                let slot = slot_array.slot_ref(idx)?;
                if self.is_slot_valid(&slot)? {
                    live.push((idx, slot.offset()? as usize, slot.length()? as usize));
                }
            }
        }
        live.sort_by(|a, b| b.1.cmp(&a.1));

        // Stage the packed region in a scratch buffer; source and target
        // ranges overlap within the page.
        let total: usize = live.iter().map(|(_, _, len)| len).sum();
        let mut scratch = vec![0u8; total];
        let mut write_head = total;
        let mut new_offsets: Vec<(u16, usize, usize)> = Vec::with_capacity(live.len());

        for (idx, offset, len) in live {
            write_head -= len;
            scratch[write_head..write_head + len].copy_from_slice(&self.data[offset..offset + len]);
            new_offsets.push((idx, special_start - total + write_head, len));
        }

        let region_start = special_start - total;
        self.data[region_start..special_start].copy_from_slice(&scratch);

        {
            let mut slot_array = self.slot_array_mut()?;
            for (idx, offset, len) in new_offsets {
                slot_array.set_slot(idx, offset.to_u16()?, len.to_u16()?)?;
            }
        }

        self.header_mut()?.set_free_end(region_start.to_u16()?)?;

        Ok(())
    }

    /// Writes tuple bytes at the top of the free gap and points `slot_index`
    /// at them. The caller has already sized the gap.
    pub(crate) fn place_at_free_end(
        &mut self,
        slot_index: u16,
        tuple: &[u8],
    ) -> Result<(), SlotError> {
        let free_end = self.header_ref()?.get_free_end()? as usize;
        let offset = free_end
            .checked_sub(tuple.len())
            .ok_or(HeaderError::OffsetArithmetic)?;

        self.data[offset..free_end].copy_from_slice(tuple);
        self.slot_array_mut()?
            .set_slot(slot_index, offset.to_u16()?, tuple.len().to_u16()?)?;
        self.header_mut()?.set_free_end(offset.to_u16()?)?;
        Ok(())
    }

    /// Appends one zeroed entry to the slot directory.
    pub(crate) fn grow_directory(&mut self) -> Result<u16, SlotError> {
        let mut header = self.header_mut()?;
        let num_slots = header.get_num_slots()?;
        let free_start = header.get_free_start()?;
        header.set_num_slots(num_slots + 1)?;
        header.set_free_start(free_start + SLOT_SIZE as u16)?;
        drop(header);

        // The grown entry may hold stale bytes from a reused frame.
        self.slot_array_mut()?.set_slot(num_slots, 0, 0)?;
        Ok(num_slots)
    }
}

#[cfg(test)]
mod private_methods_tests {
    use super::*;
    use crate::PAGE_SIZE;
    use crate::page_id::PageId;
    use crate::page_kind::PageKind;

    #[test]
    fn free_gap_of_fresh_heap_page() {
        let page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        assert_eq!(page.free_gap().unwrap(), PAGE_SIZE - HEADER_SIZE);
    }

    #[test]
    fn compact_with_no_slots_sets_free_end_to_special_start() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        page.compact_internal().unwrap();
        assert_eq!(
            page.header_ref().unwrap().get_free_end().unwrap() as usize,
            PAGE_SIZE
        );
    }

    #[test]
    fn compact_moves_live_tuples_and_updates_slots() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();

        let plan_a = page.plan_insert_internal(5).unwrap();
        let a = page.insert_internal(plan_a, &[0xAA; 5]).unwrap();
        let plan_b = page.plan_insert_internal(3).unwrap();
        let b = page.insert_internal(plan_b, &[0xBB; 3]).unwrap();
        let plan_c = page.plan_insert_internal(4).unwrap();
        let c = page.insert_internal(plan_c, &[0xCC; 4]).unwrap();

        page.delete_row_internal(b).unwrap();
        page.compact_internal().unwrap();

        // Live tuples are packed against the page end with their bytes intact.
        assert_eq!(page.read_row_internal(a).unwrap(), &[0xAA; 5]);
        assert_eq!(page.read_row_internal(c).unwrap(), &[0xCC; 4]);
        assert_eq!(
            page.header_ref().unwrap().get_free_end().unwrap() as usize,
            PAGE_SIZE - 9
        );

        // Slot b stays deleted, its id untouched.
        assert!(page.read_row_internal(b).is_err());
        assert_eq!(page.header_ref().unwrap().get_num_slots().unwrap(), 3);
    }

    #[test]
    fn compact_preserves_relative_order_of_live_tuples() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let mut slots = Vec::new();
        for i in 0..4u8 {
            let plan = page.plan_insert_internal(8).unwrap();
            slots.push(page.insert_internal(plan, &[i; 8]).unwrap());
        }
        page.delete_row_internal(slots[1]).unwrap();
        page.compact_internal().unwrap();

        let slot_array = page.slot_array_ref().unwrap();
        let off0 = slot_array.slot_ref(slots[0]).unwrap().offset().unwrap();
        let off2 = slot_array.slot_ref(slots[2]).unwrap().offset().unwrap();
        let off3 = slot_array.slot_ref(slots[3]).unwrap().offset().unwrap();
        // First-inserted tuple sits closest to the page end.
        assert!(off0 > off2);
        assert!(off2 > off3);
    }
}
