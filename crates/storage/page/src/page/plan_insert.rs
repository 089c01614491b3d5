use crate::errors::insert_error::InsertError;
use crate::insertion_plan::{InsertionPlan, InsertionSlot};
use crate::page::api::Page;
use crate::slot::SLOT_SIZE;

impl Page {
    /// Decides where an incoming tuple of `tuple_len` bytes would land.
    ///
    /// Preference order:
    /// 1. reuse the lowest deleted slot id (costs `tuple_len` bytes),
    /// 2. append a new slot (costs `tuple_len + SLOT_SIZE` bytes),
    /// and in either case compact first when the contiguous gap is too small
    /// but the page holds enough dead space.
    pub(super) fn plan_insert_internal(
        &self,
        tuple_len: usize,
    ) -> Result<InsertionPlan, InsertError> {
        let slot = match self.lowest_deleted_slot()? {
            Some(idx) => InsertionSlot::Reuse(idx),
            None => InsertionSlot::New,
        };

        let needed = match slot {
            InsertionSlot::Reuse(_) => tuple_len,
            InsertionSlot::New => tuple_len + SLOT_SIZE,
        };

        let contiguous = self.free_gap()?;
        if needed <= contiguous {
            return Ok(InsertionPlan {
                slot,
                compact_first: false,
            });
        }

        let after_compaction = self.reclaimable_gap()?;
        if needed <= after_compaction {
            return Ok(InsertionPlan {
                slot,
                compact_first: true,
            });
        }

        Err(InsertError::PageFull {
            tuple_len,
            page_free_space: after_compaction,
        })
    }
}
