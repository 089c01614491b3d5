//! Pull-based full scan over a heap file.

use crate::errors::HeapResult;
use buffer::BufferManager;
use page::page_id::{FileId, PageId};
use page::rid::Rid;
use pager::FileSet;
use std::sync::Arc;

/// Lazy iterator over every live tuple of a heap file, in ascending
/// `(page_no, slot_id)` order.
///
/// Each `next` call latches the current page only long enough to copy one
/// tuple out, so scans never hold latches across consumer work. The page
/// count is sampled when the scan starts; pages appended afterwards belong to
/// the next scan.
#[derive(Debug)]
pub struct HeapScan {
    buffer: Arc<BufferManager<FileSet>>,
    file_id: FileId,
    page_count: u32,
    next_page: u32,
    next_slot: u16,
    closed: bool,
}

impl HeapScan {
    pub(crate) fn new(
        buffer: Arc<BufferManager<FileSet>>,
        file_id: FileId,
        page_count: u32,
    ) -> Self {
        Self {
            buffer,
            file_id,
            page_count,
            // Page 0 is the table header; data starts at page 1.
            next_page: 1,
            next_slot: 0,
            closed: false,
        }
    }

    /// Stops the scan; subsequent `next` calls return `None`.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Iterator for HeapScan {
    type Item = HeapResult<(Rid, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }

        while self.next_page < self.page_count {
            let page_id = PageId::new(self.file_id, self.next_page);
            let guard = match self.buffer.read_page(page_id) {
                Ok(guard) => guard,
                Err(err) => {
                    self.closed = true;
                    return Some(Err(err.into()));
                }
            };

            let slot_count = match guard.slot_count() {
                Ok(count) => count,
                Err(err) => {
                    self.closed = true;
                    return Some(Err(err.into()));
                }
            };

            while self.next_slot < slot_count {
                let slot_id = self.next_slot;
                self.next_slot += 1;

                match guard.row(slot_id) {
                    Ok(bytes) => {
                        return Some(Ok((Rid::new(self.next_page, slot_id), bytes.to_vec())));
                    }
                    Err(err) if err.is_not_found() => continue,
                    Err(err) => {
                        self.closed = true;
                        return Some(Err(err.into()));
                    }
                }
            }

            self.next_page += 1;
            self.next_slot = 0;
        }

        None
    }
}
