use record::TypeTag;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BTreeError {
    #[error("duplicate key in unique index")]
    DuplicateKey,
    #[error("key does not match index key type {expected:?}: {found}")]
    KeyTypeMismatch {
        expected: TypeTag,
        found: &'static str,
    },
    #[error("index structure corrupt: {0}")]
    CorruptIndex(String),
    #[error("key of {len} bytes exceeds the maximum indexable size ({max})")]
    KeyTooLarge { len: usize, max: usize },
    #[error(transparent)]
    Page(#[from] page::errors::page_error::PageError),
    #[error(transparent)]
    Buffer(#[from] buffer::BufferError),
    #[error(transparent)]
    Pager(#[from] pager::PagerError),
    #[error(transparent)]
    Record(#[from] record::RecordError),
}

pub type BTreeResult<T> = Result<T, BTreeError>;
