use page::page_id::PageId;
use thiserror::Error;

/// Buffer error.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Every frame is pinned or dirty; nothing can be evicted.
    #[error("buffer pool exhausted: every frame is pinned or dirty")]
    BufferFull,
    /// The pager failed to read the page from disk.
    #[error("failed to read page {0} from disk")]
    IoReadFailed(PageId, #[source] pager::PagerError),
    /// The pager failed to write a dirty page back to disk.
    #[error("failed to write page {0} back to disk")]
    IoWriteFailed(PageId, #[source] pager::PagerError),
}
