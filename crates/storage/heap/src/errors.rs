use page::rid::Rid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeapError {
    #[error("no tuple at {0}")]
    NotFound(Rid),
    #[error("tuple of {len} bytes cannot fit on one page (max {max})")]
    TupleTooLarge { len: usize, max: usize },
    #[error("malformed table header page")]
    BadHeader(#[source] serde_json::Error),
    #[error(transparent)]
    Page(#[from] page::errors::page_error::PageError),
    #[error(transparent)]
    PageHeader(#[from] page::errors::header_error::HeaderError),
    #[error(transparent)]
    Buffer(#[from] buffer::BufferError),
    #[error(transparent)]
    Pager(#[from] pager::PagerError),
}

pub type HeapResult<T> = Result<T, HeapError>;
