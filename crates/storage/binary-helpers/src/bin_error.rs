use std::array::TryFromSliceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BinaryError {
    #[error(
        "attempt to access {expected} bytes at offset {from_offset}, but the provided slice does not contain that range"
    )]
    BytesSliceSizeMismatch { from_offset: usize, expected: usize },
    #[error("error converting a slice")]
    SliceConversionError(#[from] TryFromSliceError),
    #[error("size mismatch when writing data: source {src} vs target {target}")]
    WriteErrorSliceSizeMismatch { src: usize, target: usize },
}
