//! The lock table.

use crate::errors::{TxnError, TxnResult};
use page::rid::Rid;
use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};
use wal::TxnId;

/// How long a request may block before the wait-for graph is checked for a
/// cycle.
pub const DEADLOCK_CHECK_AFTER: Duration = Duration::from_millis(50);

/// Upper bound on blocking. Well past this, something is wrong even without
/// a cycle; the request gives up with `LockTimeout`.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Lock modes, intention modes included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Intention shared: row S locks will be taken below this table.
    IntentionShared,
    /// Intention exclusive: row X locks will be taken below this table.
    IntentionExclusive,
    /// Shared.
    Shared,
    /// Exclusive.
    Exclusive,
}

impl LockMode {
    /// The standard IS/IX/S/X compatibility matrix.
    pub fn compatible(self, other: LockMode) -> bool {
        use LockMode::*;
        match (self, other) {
            (IntentionShared, Exclusive) | (Exclusive, IntentionShared) => false,
            (IntentionShared, _) | (_, IntentionShared) => true,
            (IntentionExclusive, IntentionExclusive) => true,
            (IntentionExclusive, _) | (_, IntentionExclusive) => false,
            (Shared, Shared) => true,
            _ => false,
        }
    }

    /// Whether holding `self` already satisfies a request for `other`.
    fn covers(self, other: LockMode) -> bool {
        use LockMode::*;
        match (self, other) {
            (x, y) if x == y => true,
            (Exclusive, _) => true,
            (Shared, IntentionShared) => true,
            (IntentionExclusive, IntentionShared) => true,
            _ => false,
        }
    }

    /// The weakest mode that satisfies both `self` and `other`. An upgrade
    /// replaces a held mode with this join, so it can never weaken a grant.
    ///
    /// The only incomparable pair in the IS/IX/S/X hierarchy is S and IX;
    /// their true join (SIX) is not part of the mode set, so it escalates to
    /// Exclusive.
    fn join(self, other: LockMode) -> LockMode {
        if self.covers(other) {
            self
        } else if other.covers(self) {
            other
        } else {
            LockMode::Exclusive
        }
    }
}

/// What a lock protects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockTarget {
    Table(String),
    Row(String, Rid),
}

#[derive(Debug, Default)]
struct LockState {
    /// Granted locks per target.
    granted: HashMap<LockTarget, Vec<(TxnId, LockMode)>>,
    /// What each blocked transaction is waiting for.
    waiting: HashMap<TxnId, (LockTarget, LockMode)>,
    /// Transactions chosen as deadlock victims; their next wakeup aborts.
    victims: HashSet<TxnId>,
}

/// Blocking lock table with deadlock detection.
///
/// One mutex guards the whole table; waits park on a single condvar and
/// recheck on every release. Granularity is coarse but the critical sections
/// only touch hash maps.
#[derive(Debug, Default)]
pub struct LockManager {
    state: Mutex<LockState>,
    wakeup: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires `mode` on `target` for `txn_id`, blocking while incompatible
    /// locks are held. Re-acquiring a covered mode is a no-op; any other
    /// request by a holder upgrades its grant to the join of the held and
    /// requested modes once that join is compatible, so an upgrade never
    /// weakens what the transaction already holds.
    pub fn acquire(&self, txn_id: TxnId, target: LockTarget, mode: LockMode) -> TxnResult<()> {
        let started = Instant::now();
        let mut state = self.state.lock().expect("lock table poisoned");

        loop {
            // Borrow the fields disjointly; `granted` and `waiting` are
            // touched in the same pass.
            let table = &mut *state;

            if table.victims.remove(&txn_id) {
                table.waiting.remove(&txn_id);
                self.wakeup.notify_all();
                return Err(TxnError::DeadlockAborted(txn_id));
            }

            let holders = table.granted.entry(target.clone()).or_default();

            let held = holders
                .iter()
                .find(|(holder, _)| *holder == txn_id)
                .map(|(_, held)| *held);

            // What the grant must become: covered requests are no-ops, and an
            // upgrade asks for the join of held and requested modes.
            let effective = match held {
                Some(held) if held.covers(mode) => {
                    table.waiting.remove(&txn_id);
                    return Ok(());
                }
                Some(held) => held.join(mode),
                None => mode,
            };

            let blocked = holders
                .iter()
                .any(|(holder, other)| *holder != txn_id && !other.compatible(effective));

            if !blocked {
                if let Some(entry) = holders.iter_mut().find(|(holder, _)| *holder == txn_id) {
                    entry.1 = effective;
                } else {
                    holders.push((txn_id, effective));
                }
                table.waiting.remove(&txn_id);
                return Ok(());
            }

            table.waiting.insert(txn_id, (target.clone(), effective));

            let (next_state, timed_out) = self
                .wakeup
                .wait_timeout(state, DEADLOCK_CHECK_AFTER)
                .expect("lock table poisoned");
            state = next_state;

            if timed_out.timed_out() {
                if let Some(victim) = Self::find_deadlock_victim(&state, txn_id) {
                    tracing::warn!(victim, blocked = txn_id, "deadlock detected");
                    if victim == txn_id {
                        state.waiting.remove(&txn_id);
                        self.wakeup.notify_all();
                        return Err(TxnError::DeadlockAborted(txn_id));
                    }
                    state.victims.insert(victim);
                    self.wakeup.notify_all();
                }

                if started.elapsed() >= LOCK_TIMEOUT {
                    state.waiting.remove(&txn_id);
                    return Err(TxnError::LockTimeout(txn_id));
                }
            }
        }
    }

    /// Releases every lock `txn_id` holds and wakes all waiters (strict 2PL:
    /// everything is released at commit/abort, never earlier).
    pub fn release_all(&self, txn_id: TxnId) {
        let mut state = self.state.lock().expect("lock table poisoned");
        state.granted.retain(|_, holders| {
            holders.retain(|(holder, _)| *holder != txn_id);
            !holders.is_empty()
        });
        state.waiting.remove(&txn_id);
        state.victims.remove(&txn_id);
        self.wakeup.notify_all();
    }

    /// Walks the wait-for graph from `start`. When `start` sits on a cycle,
    /// returns the youngest (highest-id) transaction on it as the victim.
    fn find_deadlock_victim(state: &LockState, start: TxnId) -> Option<TxnId> {
        // Edges: waiter -> every holder of an incompatible grant on the
        // waited-for target.
        let blockers = |waiter: TxnId| -> Vec<TxnId> {
            let Some((target, mode)) = state.waiting.get(&waiter) else {
                return Vec::new();
            };
            state
                .granted
                .get(target)
                .map(|holders| {
                    holders
                        .iter()
                        .filter(|(holder, held)| *holder != waiter && !held.compatible(*mode))
                        .map(|(holder, _)| *holder)
                        .collect()
                })
                .unwrap_or_default()
        };

        // DFS with the path in hand so the cycle members are known.
        let mut path = vec![start];
        let mut stack = vec![blockers(start)];
        let mut visited = HashSet::from([start]);

        while let Some(frontier) = stack.last_mut() {
            let Some(next) = frontier.pop() else {
                path.pop();
                stack.pop();
                continue;
            };

            if let Some(cycle_start) = path.iter().position(|&t| t == next) {
                return path[cycle_start..].iter().copied().max();
            }
            if visited.insert(next) {
                path.push(next);
                stack.push(blockers(next));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn row(rid: u16) -> LockTarget {
        LockTarget::Row("t".to_string(), Rid::new(1, rid))
    }

    #[test]
    fn compatibility_matrix() {
        use LockMode::*;
        assert!(IntentionShared.compatible(IntentionShared));
        assert!(IntentionShared.compatible(IntentionExclusive));
        assert!(IntentionShared.compatible(Shared));
        assert!(!IntentionShared.compatible(Exclusive));

        assert!(IntentionExclusive.compatible(IntentionExclusive));
        assert!(!IntentionExclusive.compatible(Shared));
        assert!(!IntentionExclusive.compatible(Exclusive));

        assert!(Shared.compatible(Shared));
        assert!(!Shared.compatible(Exclusive));
        assert!(!Exclusive.compatible(Exclusive));
    }

    #[test]
    fn shared_locks_coexist() {
        let locks = LockManager::new();
        locks.acquire(1, row(0), LockMode::Shared).unwrap();
        locks.acquire(2, row(0), LockMode::Shared).unwrap();
        locks.release_all(1);
        locks.release_all(2);
    }

    #[test]
    fn reacquire_is_idempotent_and_upgrade_works() {
        let locks = LockManager::new();
        locks.acquire(1, row(0), LockMode::Shared).unwrap();
        locks.acquire(1, row(0), LockMode::Shared).unwrap();
        // Sole holder may upgrade.
        locks.acquire(1, row(0), LockMode::Exclusive).unwrap();
        locks.release_all(1);
    }

    #[test]
    fn join_never_weakens_and_escalates_the_incomparable_pair() {
        use LockMode::*;
        assert_eq!(Shared.join(IntentionShared), Shared);
        assert_eq!(IntentionShared.join(IntentionExclusive), IntentionExclusive);
        assert_eq!(Exclusive.join(Shared), Exclusive);
        // S and IX have no common ancestor in the four-mode set.
        assert_eq!(Shared.join(IntentionExclusive), Exclusive);
        assert_eq!(IntentionExclusive.join(Shared), Exclusive);
    }

    #[test]
    fn intention_request_does_not_weaken_a_held_table_shared_lock() {
        let locks = Arc::new(LockManager::new());
        let table = LockTarget::Table("t".to_string());

        // A scan grants table S; an insert by the same transaction then asks
        // for IX. The grant must keep (at least) its S strength.
        locks.acquire(1, table.clone(), LockMode::Shared).unwrap();
        locks
            .acquire(1, table.clone(), LockMode::IntentionExclusive)
            .unwrap();

        // Another transaction's IX would be compatible with a bare IX but
        // must still block against the scanning transaction.
        let l2 = Arc::clone(&locks);
        let target = table.clone();
        let waiter = thread::spawn(move || {
            let result = l2.acquire(2, target, LockMode::IntentionExclusive);
            if result.is_ok() {
                l2.release_all(2);
            }
            result
        });

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished(), "competing IX must wait");

        locks.release_all(1);
        waiter.join().unwrap().unwrap();
    }

    #[test]
    fn exclusive_blocks_until_release() {
        let locks = Arc::new(LockManager::new());
        locks.acquire(1, row(0), LockMode::Exclusive).unwrap();

        let locks2 = Arc::clone(&locks);
        let waiter = thread::spawn(move || locks2.acquire(2, row(0), LockMode::Exclusive));

        thread::sleep(Duration::from_millis(20));
        locks.release_all(1);
        waiter.join().unwrap().unwrap();
        locks.release_all(2);
    }

    #[test]
    fn deadlock_aborts_the_youngest_transaction() {
        let locks = Arc::new(LockManager::new());
        locks.acquire(1, row(0), LockMode::Exclusive).unwrap();
        locks.acquire(2, row(1), LockMode::Exclusive).unwrap();

        // T1 wants row 1 (held by T2); T2 wants row 0 (held by T1).
        let l1 = Arc::clone(&locks);
        let t1 = thread::spawn(move || l1.acquire(1, row(1), LockMode::Exclusive));
        let l2 = Arc::clone(&locks);
        let t2 = thread::spawn(move || {
            let result = l2.acquire(2, row(0), LockMode::Exclusive);
            if result.is_err() {
                // The engine rolls a victim back, releasing its locks.
                l2.release_all(2);
            }
            result
        });

        let r1 = t1.join().unwrap();
        let r2 = t2.join().unwrap();

        // T2 is younger; it dies, T1 proceeds.
        assert!(matches!(r2, Err(TxnError::DeadlockAborted(2))), "{r2:?}");
        assert!(r1.is_ok(), "{r1:?}");

        locks.release_all(1);
        locks.release_all(2);
    }

    #[test]
    fn intention_locks_on_a_table_do_not_conflict() {
        let locks = LockManager::new();
        let table = LockTarget::Table("t".to_string());
        locks
            .acquire(1, table.clone(), LockMode::IntentionExclusive)
            .unwrap();
        locks
            .acquire(2, table.clone(), LockMode::IntentionShared)
            .unwrap();
        // A full-table S lock now has to wait for the IX holder, though.
        let locks = Arc::new(locks);
        let l = Arc::clone(&locks);
        let waiter = thread::spawn(move || l.acquire(3, LockTarget::Table("t".to_string()), LockMode::Shared));
        thread::sleep(Duration::from_millis(20));
        locks.release_all(1);
        waiter.join().unwrap().unwrap();
    }
}
