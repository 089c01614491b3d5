use thiserror::Error;

#[derive(Debug, Error)]
pub enum PagerError {
    #[error("checksum mismatch on page {page_no}: stored {stored:#010x}, computed {computed:#010x}")]
    CorruptPage {
        page_no: u32,
        stored: u32,
        computed: u32,
    },
    #[error("bad file magic: expected {expected:#06x}, found {found:#06x}")]
    BadMagic { expected: u16, found: u16 },
    #[error("unsupported format version {found} (supported: {supported})")]
    VersionMismatch { found: u16, supported: u16 },
    #[error("page {page_no} is past the end of the file ({page_count} pages)")]
    PageOutOfBounds { page_no: u32, page_count: u32 },
    #[error("no file registered under id {file_id}")]
    UnknownFile { file_id: u32 },
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

pub type PagerResult<T> = Result<T, PagerError>;
