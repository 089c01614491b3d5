use crate::PAGE_SIZE;
use crate::errors::page_error::{PageResult, WithPageId};
use crate::errors::page_op_error::PageOpError;
use crate::header::{HeaderMut, HeaderRef};
use crate::insertion_plan::InsertionPlan;
use crate::page_id::PageId;
use crate::page_kind::PageKind;

/// Wrapper around a fixed-size byte array representing a page.
#[derive(Debug)]
pub struct Page {
    /// Unique identifier of the page: owning file plus page number within it.
    pub(crate) page_id: PageId,
    /// Main binary array holding the `PAGE_SIZE` bytes of data for the page. Boxed and owned by this struct.
    pub(crate) data: Box<[u8; PAGE_SIZE]>,
}

/// Public APIs for the Page struct.
/// All public APIs use the `PageResult` type.
impl Page {
    /// Creates a new page with all bytes initialized to zero.
    pub fn new_zeroed(page_id: PageId) -> Self {
        Self {
            page_id,
            data: Box::new([0; PAGE_SIZE]),
        }
    }

    /// Initializes a page for the given `PageId` and `PageKind`.
    /// Beware, this method will wipe out the contents of the internal byte array, zero-ing them out.
    pub fn initialize(&mut self, page_id: PageId, kind: PageKind) -> PageResult<()> {
        (&mut *self.data)[..].fill(0);
        self.page_id = page_id;

        self.header_mut()
            .and_then(|mut header| header.reset(kind))
            .map_err(PageOpError::from)
            .with_page_id(page_id)
    }

    /// Retrieves a tuple from the page by its slot index.
    ///
    /// # Arguments
    ///
    /// * `slot_index` - The index of the slot to read. Indexing starts from 0.
    ///
    /// # Errors
    ///
    /// * `NotFound` (wrapped in `PageError`) when the slot is deleted or past
    ///   the end of the directory. The error is augmented with the `page_id`
    ///   of the current page for better traceability.
    pub fn row(&self, slot_index: u16) -> PageResult<&[u8]> {
        self.read_row_internal(slot_index)
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Plans the insertion of a tuple into the page without mutating it.
    ///
    /// The plan records whether a deleted slot gets reused (the lowest
    /// deleted index wins) and whether the page must be compacted first.
    ///
    /// # Errors
    ///
    /// * `PageFull` when the tuple cannot fit even after compaction.
    pub fn plan_insert(&self, tuple_len: usize) -> PageResult<InsertionPlan> {
        self.plan_insert_internal(tuple_len)
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Inserts a tuple using a plan previously produced by [`Page::plan_insert`].
    ///
    /// Returns the slot index now holding the tuple.
    pub fn insert(&mut self, plan: InsertionPlan, tuple: &[u8]) -> PageResult<u16> {
        self.insert_internal(plan, tuple)
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Places a tuple at a specific slot index, growing the directory with
    /// empty slots as needed. Used by recovery to reapply logged inserts at
    /// their original RIDs.
    pub fn insert_at_slot(&mut self, slot_index: u16, tuple: &[u8]) -> PageResult<()> {
        self.insert_at_slot_internal(slot_index, tuple)
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Updates the contents of a tuple in place when the new image fits in
    /// the old region, relocating it within the page otherwise. The slot
    /// index never changes.
    ///
    /// # Errors
    ///
    /// * `PageFull` when the new image does not fit even after reclaiming the
    ///   old one; the tuple is left untouched and the caller must move it to
    ///   another page (changing its RID).
    pub fn update_row(&mut self, slot_index: u16, tuple: &[u8]) -> PageResult<()> {
        self.update_internal(slot_index, tuple)
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Deletes a tuple by zeroing its slot. The slot index becomes eligible
    /// for reuse; the tuple bytes are reclaimed by the next compaction.
    pub fn delete_row(&mut self, slot_index: u16) -> PageResult<()> {
        self.delete_row_internal(slot_index)
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Rewrites the tuple region contiguously against the end of the page,
    /// updating slot offsets. Slot ids never change.
    pub fn compact(&mut self) -> PageResult<()> {
        self.compact_internal()
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Number of entries in the slot directory, deleted slots included.
    pub fn slot_count(&self) -> PageResult<u16> {
        self.header_ref()
            .and_then(|h| h.get_num_slots())
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Contiguous free bytes between the slot directory and the tuple region.
    pub fn free_space(&self) -> PageResult<usize> {
        self.free_gap()
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// LSN of the last logged mutation applied to this page.
    pub fn page_lsn(&self) -> PageResult<u64> {
        self.header_ref()
            .and_then(|h| h.get_page_lsn())
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Stamps the LSN of a mutation that just touched this page.
    pub fn set_page_lsn(&mut self, lsn: u64) -> PageResult<()> {
        self.header_mut()
            .and_then(|mut h| h.set_page_lsn(lsn))
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Header flag bits.
    pub fn flags(&self) -> PageResult<u16> {
        self.header_ref()
            .and_then(|h| h.get_flags())
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Immutable view of the reserved special tail, empty for heap pages.
    pub fn special(&self) -> PageResult<&[u8]> {
        let start = self
            .header_ref()
            .and_then(|h| h.get_special_start())
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)? as usize;
        Ok(&self.data[start..])
    }

    /// Mutable view of the reserved special tail.
    pub fn special_mut(&mut self) -> PageResult<&mut [u8]> {
        let start = self
            .header_ref()
            .and_then(|h| h.get_special_start())
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)? as usize;
        Ok(&mut self.data[start..])
    }

    /// The identifier of this page.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Re-binds the page to a new identifier after a frame is loaded.
    pub fn set_page_id(&mut self, page_id: PageId) {
        self.page_id = page_id;
    }

    /// Returns an immutable reference to the underlying data of the page.
    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Returns a mutable reference to the underlying byte array of the page.
    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    /// Immutable header view. Exposed for layers that own page-0 metadata.
    pub fn header_view(&self) -> PageResult<HeaderRef<'_>> {
        self.header_ref()
            .map_err(PageOpError::from)
            .with_page_id(self.page_id)
    }

    /// Mutable header view. Exposed for layers that own page-0 metadata.
    pub fn header_view_mut(&mut self) -> PageResult<HeaderMut<'_>> {
        let page_id = self.page_id;
        self.header_mut()
            .map_err(PageOpError::from)
            .with_page_id(page_id)
    }
}
