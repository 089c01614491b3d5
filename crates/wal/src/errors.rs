use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("malformed log record at offset {offset}: {reason}")]
    CorruptRecord { offset: u64, reason: &'static str },
    #[error("unknown log operation byte {0:#04x}")]
    UnknownOp(u8),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

pub type WalResult<T> = Result<T, WalError>;
