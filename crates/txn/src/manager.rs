//! Transaction registry and lifecycle state machine.

use crate::errors::{TxnError, TxnResult};
use crate::lock::{LockManager, LockMode, LockTarget};
use page::rid::Rid;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use wal::{DataPayload, TxnId, WalOp};

/// Lifecycle of one transaction. `Committed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Committing,
    Committed,
    Aborting,
    Aborted,
}

#[derive(Debug)]
struct TxnRecord {
    state: TxnState,
    /// Logged mutations of this transaction, in execution order. Rollback
    /// walks them in reverse applying the inverse of each.
    undo: Vec<(WalOp, DataPayload)>,
}

/// Allocates transaction ids, tracks per-transaction state and undo chains,
/// and fronts the lock table.
#[derive(Debug)]
pub struct TxnManager {
    next_id: AtomicU32,
    active: Mutex<HashMap<TxnId, TxnRecord>>,
    locks: LockManager,
}

impl Default for TxnManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TxnManager {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            active: Mutex::new(HashMap::new()),
            locks: LockManager::new(),
        }
    }

    /// Resume id allocation past everything recovery saw in the log.
    pub fn set_next_txn_id(&self, next: TxnId) {
        self.next_id.fetch_max(next, Ordering::SeqCst);
    }

    /// Starts a transaction: allocates a fresh monotonically increasing id
    /// and registers an in-memory record for it.
    pub fn begin(&self) -> TxnId {
        let txn_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut active = self.active.lock().expect("txn registry poisoned");
        active.insert(
            txn_id,
            TxnRecord {
                state: TxnState::Active,
                undo: Vec::new(),
            },
        );
        tracing::debug!(txn_id, "begin");
        txn_id
    }

    /// Current state, `None` for unknown/forgotten transactions.
    pub fn state(&self, txn_id: TxnId) -> Option<TxnState> {
        let active = self.active.lock().expect("txn registry poisoned");
        active.get(&txn_id).map(|record| record.state)
    }

    /// Number of transactions that have not reached a terminal state.
    /// Checkpoints only run when this is zero.
    pub fn live_count(&self) -> usize {
        let active = self.active.lock().expect("txn registry poisoned");
        active.len()
    }

    /// Fails unless the transaction exists and is `Active`.
    pub fn ensure_active(&self, txn_id: TxnId) -> TxnResult<()> {
        let active = self.active.lock().expect("txn registry poisoned");
        match active.get(&txn_id) {
            Some(record) if record.state == TxnState::Active => Ok(()),
            _ => Err(TxnError::TxnClosed(txn_id)),
        }
    }

    /// Records a logged mutation for later undo.
    pub fn record_undo(&self, txn_id: TxnId, op: WalOp, payload: DataPayload) -> TxnResult<()> {
        let mut active = self.active.lock().expect("txn registry poisoned");
        match active.get_mut(&txn_id) {
            Some(record) if record.state == TxnState::Active => {
                record.undo.push((op, payload));
                Ok(())
            }
            _ => Err(TxnError::TxnClosed(txn_id)),
        }
    }

    /// Moves `Active → Committing`. The engine then makes the commit durable
    /// and calls [`TxnManager::finish_commit`].
    pub fn begin_commit(&self, txn_id: TxnId) -> TxnResult<()> {
        self.transition(txn_id, TxnState::Active, TxnState::Committing)
    }

    /// Moves `Committing → Committed`, releases every lock and forgets the
    /// transaction.
    pub fn finish_commit(&self, txn_id: TxnId) -> TxnResult<()> {
        self.transition(txn_id, TxnState::Committing, TxnState::Committed)?;
        self.forget(txn_id);
        tracing::debug!(txn_id, "committed");
        Ok(())
    }

    /// Moves `Active → Aborting` and hands back the undo chain in reverse
    /// (most recent first) for the engine to apply.
    pub fn begin_abort(&self, txn_id: TxnId) -> TxnResult<Vec<(WalOp, DataPayload)>> {
        let mut active = self.active.lock().expect("txn registry poisoned");
        match active.get_mut(&txn_id) {
            Some(record) if record.state == TxnState::Active => {
                record.state = TxnState::Aborting;
                let mut undo = std::mem::take(&mut record.undo);
                undo.reverse();
                Ok(undo)
            }
            _ => Err(TxnError::TxnClosed(txn_id)),
        }
    }

    /// Moves `Aborting → Aborted`, releases every lock and forgets the
    /// transaction.
    pub fn finish_abort(&self, txn_id: TxnId) -> TxnResult<()> {
        self.transition(txn_id, TxnState::Aborting, TxnState::Aborted)?;
        self.forget(txn_id);
        tracing::debug!(txn_id, "aborted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Locking, strict 2PL: acquired on demand, released only at commit/abort
    // -----------------------------------------------------------------------

    /// IS on the table, then S on the row.
    pub fn lock_row_shared(&self, txn_id: TxnId, table: &str, rid: Rid) -> TxnResult<()> {
        self.locks.acquire(
            txn_id,
            LockTarget::Table(table.to_string()),
            LockMode::IntentionShared,
        )?;
        self.locks
            .acquire(txn_id, LockTarget::Row(table.to_string(), rid), LockMode::Shared)
    }

    /// IX on the table, then X on the row.
    pub fn lock_row_exclusive(&self, txn_id: TxnId, table: &str, rid: Rid) -> TxnResult<()> {
        self.locks.acquire(
            txn_id,
            LockTarget::Table(table.to_string()),
            LockMode::IntentionExclusive,
        )?;
        self.locks.acquire(
            txn_id,
            LockTarget::Row(table.to_string(), rid),
            LockMode::Exclusive,
        )
    }

    /// IX on the table alone, taken before an insert produces the RID the
    /// row X lock needs.
    pub fn lock_table_intention_exclusive(&self, txn_id: TxnId, table: &str) -> TxnResult<()> {
        self.locks.acquire(
            txn_id,
            LockTarget::Table(table.to_string()),
            LockMode::IntentionExclusive,
        )
    }

    /// Whole-table S lock (scans).
    pub fn lock_table_shared(&self, txn_id: TxnId, table: &str) -> TxnResult<()> {
        self.locks
            .acquire(txn_id, LockTarget::Table(table.to_string()), LockMode::Shared)
    }

    fn transition(&self, txn_id: TxnId, from: TxnState, to: TxnState) -> TxnResult<()> {
        let mut active = self.active.lock().expect("txn registry poisoned");
        match active.get_mut(&txn_id) {
            Some(record) if record.state == from => {
                record.state = to;
                Ok(())
            }
            _ => Err(TxnError::TxnClosed(txn_id)),
        }
    }

    fn forget(&self, txn_id: TxnId) {
        self.locks.release_all(txn_id);
        let mut active = self.active.lock().expect("txn registry poisoned");
        active.remove(&txn_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> DataPayload {
        DataPayload {
            table: "t".to_string(),
            rid: Rid::new(1, 0),
            new_rid: Rid::new(1, 0),
            before: None,
            after: Some(vec![0; 8]),
        }
    }

    #[test]
    fn ids_are_monotonically_increasing() {
        let manager = TxnManager::new();
        let a = manager.begin();
        let b = manager.begin();
        assert!(b > a);
    }

    #[test]
    fn commit_walks_the_state_machine() {
        let manager = TxnManager::new();
        let txn = manager.begin();
        assert_eq!(manager.state(txn), Some(TxnState::Active));

        manager.begin_commit(txn).unwrap();
        assert_eq!(manager.state(txn), Some(TxnState::Committing));
        manager.finish_commit(txn).unwrap();
        assert_eq!(manager.state(txn), None);
    }

    #[test]
    fn operations_against_closed_txn_fail() {
        let manager = TxnManager::new();
        let txn = manager.begin();
        manager.begin_commit(txn).unwrap();

        assert!(matches!(
            manager.ensure_active(txn),
            Err(TxnError::TxnClosed(_))
        ));
        assert!(matches!(
            manager.record_undo(txn, WalOp::Insert, payload()),
            Err(TxnError::TxnClosed(_))
        ));
        // Commit is not restartable either.
        assert!(matches!(
            manager.begin_commit(txn),
            Err(TxnError::TxnClosed(_))
        ));
    }

    #[test]
    fn abort_returns_undo_chain_in_reverse() {
        let manager = TxnManager::new();
        let txn = manager.begin();

        let mut first = payload();
        first.rid = Rid::new(1, 1);
        let mut second = payload();
        second.rid = Rid::new(1, 2);
        manager.record_undo(txn, WalOp::Insert, first).unwrap();
        manager.record_undo(txn, WalOp::Delete, second).unwrap();

        let undo = manager.begin_abort(txn).unwrap();
        assert_eq!(undo.len(), 2);
        assert_eq!(undo[0].1.rid, Rid::new(1, 2));
        assert_eq!(undo[1].1.rid, Rid::new(1, 1));
        manager.finish_abort(txn).unwrap();
        assert_eq!(manager.state(txn), None);
    }

    #[test]
    fn recovery_bumps_id_allocation() {
        let manager = TxnManager::new();
        manager.set_next_txn_id(100);
        assert_eq!(manager.begin(), 100);
    }
}
