use crate::PAGE_SIZE;
use crate::errors::header_error::HeaderError;
use crate::page::api::Page;
use crate::page_id::PageId;
use crate::page_kind::PageKind;

/// Internal methods for creating and initializing pages.
impl Page {
    /// Creates a new page from an existing byte array.
    pub(crate) fn new_from_bytes(bytes: Box<[u8; PAGE_SIZE]>, page_id: PageId) -> Self {
        Self {
            data: bytes,
            page_id,
        }
    }

    /// Creates a new empty page with the specified page ID and page kind.
    pub(crate) fn new_empty(page_id: PageId, kind: PageKind) -> Result<Self, HeaderError> {
        let mut page = Self::new_zeroed(page_id);
        page.header_mut()?.reset(kind)?;
        Ok(page)
    }
}
