use crate::errors::delete_error::DeleteError;
use crate::errors::header_error::HeaderError;
use crate::errors::insert_error::InsertError;
use crate::errors::read_row_error::ReadRowError;
use crate::errors::slot_error::SlotError;
use crate::errors::update_error::UpdateError;
use thiserror::Error;

/// Aggregator error type for all possible page related sub-errors
#[derive(Debug, Error)]
pub enum PageOpError {
    #[error("Error while accessing header")]
    Header(#[from] HeaderError),
    #[error("Error while accessing slot directory")]
    Slot(#[from] SlotError),
    #[error("Error while reading tuple")]
    ReadRow(#[from] ReadRowError),
    #[error("Error while inserting tuple")]
    Insert(#[from] InsertError),
    #[error("Error while deleting tuple")]
    DeleteRow(#[from] DeleteError),
    #[error("Error while updating tuple")]
    UpdateRow(#[from] UpdateError),
}

impl PageOpError {
    /// Whether this error is the recoverable out-of-space case. Callers react
    /// by compacting, moving the tuple to another page, or splitting a node.
    pub fn is_page_full(&self) -> bool {
        matches!(
            self,
            PageOpError::Insert(InsertError::PageFull { .. })
                | PageOpError::UpdateRow(UpdateError::PageFull { .. })
        )
    }

    /// Whether this error is a tuple-not-found case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PageOpError::ReadRow(ReadRowError::NotFound { .. }))
    }

    /// Whether this error stems from addressing a deleted or out-of-range
    /// slot. Heap callers surface this as their own not-found error.
    pub fn is_missing_slot(&self) -> bool {
        use crate::errors::slot_error::SlotError;
        matches!(
            self,
            PageOpError::Slot(SlotError::InvalidSlot { .. })
                | PageOpError::UpdateRow(UpdateError::SlotError(SlotError::InvalidSlot { .. }))
                | PageOpError::DeleteRow(DeleteError::SlotError(SlotError::InvalidSlot { .. }))
                | PageOpError::Insert(InsertError::SlotError(SlotError::InvalidSlot { .. }))
        )
    }
}
