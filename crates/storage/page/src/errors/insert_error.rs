use crate::errors::header_error::HeaderError;
use crate::errors::slot_error::SlotError;
use binary_helpers::conversions::ConversionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InsertError {
    #[error("Unable to insert tuple of length {tuple_len} in page with {page_free_space} free bytes")]
    PageFull {
        /// Required number of bytes to insert the tuple
        tuple_len: usize,
        /// Actual number of free bytes in the page
        page_free_space: usize,
    },
    #[error("Error while accessing slot directory")]
    SlotError(#[from] SlotError),
    #[error("Error while accessing header")]
    HeaderError(#[from] HeaderError),
    #[error("Error while converting between data types")]
    ConversionError(#[from] ConversionError),
}
