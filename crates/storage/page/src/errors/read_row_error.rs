use crate::errors::header_error::HeaderError;
use crate::errors::slot_error::SlotError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadRowError {
    #[error("No live tuple at slot index {slot_index}")]
    NotFound { slot_index: usize },
    #[error("Error while reading slot directory")]
    SlotError(#[from] SlotError),
    #[error("Error while accessing header")]
    HeaderError(#[from] HeaderError),
}
