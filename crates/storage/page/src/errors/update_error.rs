use crate::errors::delete_error::DeleteError;
use crate::errors::header_error::HeaderError;
use crate::errors::insert_error::InsertError;
use crate::errors::slot_error::SlotError;
use binary_helpers::conversions::ConversionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Unable to update tuple to length {tuple_len} in page with {page_free_space} free bytes")]
    PageFull {
        /// Required number of bytes for the new tuple image
        tuple_len: usize,
        /// Free bytes available in the page, counting the old image as free
        page_free_space: usize,
    },
    #[error("Error while accessing slot directory")]
    SlotError(#[from] SlotError),
    #[error("Error while accessing header")]
    HeaderError(#[from] HeaderError),
    #[error("Error while inserting the value for the updated tuple")]
    InsertError(#[from] InsertError),
    #[error("Error while converting between data types")]
    ConversionError(#[from] ConversionError),
    #[error("Error while deleting the old tuple")]
    DeleteError(#[from] DeleteError),
}
