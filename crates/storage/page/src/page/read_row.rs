use crate::errors::read_row_error::ReadRowError;
use crate::page::api::Page;

impl Page {
    pub(crate) fn read_row_internal(&self, slot_index: u16) -> Result<&[u8], ReadRowError> {
        let num_slots = self.header_ref()?.get_num_slots()?;
        if slot_index >= num_slots {
            return Err(ReadRowError::NotFound {
                slot_index: slot_index as usize,
            });
        }

        let slot_array = self.slot_array_ref()?;
        let slot = slot_array.slot_ref(slot_index)?;
        if !self.is_slot_valid(&slot)? {
            return Err(ReadRowError::NotFound {
                slot_index: slot_index as usize,
            });
        }

        let offset = slot.offset()? as usize;
        let length = slot.length()? as usize;
        Ok(&self.data[offset..offset + length])
    }
}

#[cfg(test)]
mod read_row_tests {
    use super::*;
    use crate::page_id::PageId;
    use crate::page_kind::PageKind;

    #[test]
    fn read_row_returns_inserted_bytes() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let plan = page.plan_insert_internal(6).unwrap();
        let slot = page.insert_internal(plan, b"abcdef").unwrap();
        assert_eq!(page.read_row_internal(slot).unwrap(), b"abcdef");
    }

    #[test]
    fn read_row_past_directory_is_not_found() {
        let page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        assert!(matches!(
            page.read_row_internal(0),
            Err(ReadRowError::NotFound { slot_index: 0 })
        ));
    }

    #[test]
    fn read_row_of_deleted_slot_is_not_found() {
        let mut page = Page::new_empty(PageId::new(1, 0), PageKind::Heap).unwrap();
        let plan = page.plan_insert_internal(6).unwrap();
        let slot = page.insert_internal(plan, b"abcdef").unwrap();
        page.delete_row_internal(slot).unwrap();
        assert!(matches!(
            page.read_row_internal(slot),
            Err(ReadRowError::NotFound { .. })
        ));
    }
}
