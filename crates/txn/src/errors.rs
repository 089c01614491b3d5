use thiserror::Error;
use wal::TxnId;

#[derive(Debug, Error)]
pub enum TxnError {
    #[error("transaction {0} is closed")]
    TxnClosed(TxnId),
    #[error("transaction {0} was aborted to break a deadlock")]
    DeadlockAborted(TxnId),
    #[error("transaction {0} timed out waiting for a lock")]
    LockTimeout(TxnId),
}

pub type TxnResult<T> = Result<T, TxnError>;
