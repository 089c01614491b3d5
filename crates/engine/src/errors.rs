use thiserror::Error;

/// Statement-boundary error: everything a single engine operation can fail
/// with. Only `PageFull` is handled below this level (the heap allocates,
/// the tree splits); the rest bubbles up to abort the statement.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Catalog(#[from] catalog::CatalogError),
    #[error(transparent)]
    Heap(#[from] heap::HeapError),
    #[error(transparent)]
    Index(#[from] btree::BTreeError),
    #[error(transparent)]
    Txn(#[from] txn::TxnError),
    #[error(transparent)]
    Wal(#[from] wal::WalError),
    #[error(transparent)]
    Record(#[from] record::RecordError),
    #[error(transparent)]
    Buffer(#[from] buffer::BufferError),
    #[error(transparent)]
    Pager(#[from] pager::PagerError),
    #[error("statement cancelled")]
    Cancelled,
}

pub type EngineResult<T> = Result<T, EngineError>;
