use binary_helpers::conversions::ConversionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("Header error")]
    BinaryError(#[from] binary_helpers::bin_error::BinaryError),
    #[error("Arithmetic error while computing offsets within header")]
    OffsetArithmetic,
    #[error("Provided slice length ({actual}) does not match the expected length ({expected})")]
    HeaderSliceSizeMismatch { actual: usize, expected: usize },
    #[error("Error while converting between data types")]
    ConversionError(#[from] ConversionError),
}
