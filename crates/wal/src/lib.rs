//! Write-ahead log.
//!
//! `wal.log` is a sequence of framed records:
//!
//! ```text
//! | length: u32 | lsn: u64 | txn_id: u32 | op: u8 | payload | crc32: u32 |
//! ```
//!
//! `length` covers lsn through payload; the CRC covers the same span. A
//! record that cannot be read completely, or whose CRC fails, ends the log:
//! everything after a torn tail is discarded by the next recovery.
//!
//! Data records carry the table name, the affected RID(s) and before/after
//! tuple images, which is enough for redo (recovery) and undo (rollback).
//! COMMIT is only acknowledged after fsync under the `commit` and `always`
//! sync policies.

pub mod errors;
pub mod record;
pub mod recovery;
pub mod sync_policy;
pub mod wal;

pub use errors::{WalError, WalResult};
pub use record::{DataPayload, Lsn, TxnId, WalOp, WalRecord};
pub use recovery::{RecoveryPlan, analyze};
pub use sync_policy::SyncPolicy;
pub use wal::Wal;
