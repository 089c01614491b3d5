//! Transaction lifecycle and concurrency control.
//!
//! Strict two-phase locking at row granularity with table-level intention
//! locks (IS/IX/S/X, standard compatibility matrix). Lock requests block
//! until compatible; a request blocked longer than the detection threshold
//! triggers a wait-for-graph cycle check that aborts the youngest
//! transaction in the cycle.
//!
//! Each transaction walks `Active → Committing → Committed` or
//! `Active → Aborting → Aborted`; terminal states are final and further
//! operations fail with `TxnClosed`.

pub mod errors;
pub mod lock;
pub mod manager;

pub use errors::{TxnError, TxnResult};
pub use lock::{LockManager, LockMode, LockTarget};
pub use manager::{TxnManager, TxnState};
