//! Redo-only recovery analysis.
//!
//! Pages of uncommitted transactions never reach disk (the buffer pool is
//! no-steal), so recovery only needs to reapply the data records of
//! transactions whose COMMIT made it to the log. The engine executes the
//! resulting plan against its heaps and indexes, guarded by each page's LSN
//! so replay is idempotent.

use crate::record::{Lsn, TxnId, WalOp, WalRecord};
use std::collections::HashSet;

/// What recovery must do, distilled from a log scan.
#[derive(Debug, Default)]
pub struct RecoveryPlan {
    /// Transactions with a COMMIT record.
    pub committed: HashSet<TxnId>,
    /// Data records of committed transactions, in LSN order.
    pub redo: Vec<WalRecord>,
    /// Highest LSN seen in the log.
    pub max_lsn: Lsn,
    /// Highest transaction id seen; id allocation resumes past it.
    pub max_txn_id: TxnId,
}

/// Two passes over the record stream, exactly as the recovery protocol
/// prescribes: first collect the committed set, then keep the committed
/// transactions' data records for redo. Records of uncommitted transactions
/// are discarded.
pub fn analyze(records: impl IntoIterator<Item = WalRecord>) -> RecoveryPlan {
    let records: Vec<WalRecord> = records.into_iter().collect();

    let mut plan = RecoveryPlan::default();
    for record in &records {
        plan.max_lsn = plan.max_lsn.max(record.lsn);
        plan.max_txn_id = plan.max_txn_id.max(record.txn_id);
        if record.op == WalOp::Commit {
            plan.committed.insert(record.txn_id);
        }
    }

    plan.redo = records
        .into_iter()
        .filter(|record| record.op.is_data() && plan.committed.contains(&record.txn_id))
        .collect();

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataPayload;
    use page::rid::Rid;

    fn data(lsn: Lsn, txn_id: TxnId, op: WalOp) -> WalRecord {
        WalRecord {
            lsn,
            txn_id,
            op,
            payload: Some(DataPayload {
                table: "t".to_string(),
                rid: Rid::new(1, 0),
                new_rid: Rid::new(1, 0),
                before: None,
                after: Some(vec![0; 8]),
            }),
        }
    }

    fn control(lsn: Lsn, txn_id: TxnId, op: WalOp) -> WalRecord {
        WalRecord {
            lsn,
            txn_id,
            op,
            payload: None,
        }
    }

    #[test]
    fn only_committed_transactions_are_redone() {
        let plan = analyze([
            data(1, 1, WalOp::Insert),
            data(2, 2, WalOp::Insert),
            control(3, 1, WalOp::Commit),
            data(4, 3, WalOp::Insert),
            control(5, 3, WalOp::Rollback),
        ]);

        assert_eq!(plan.committed, HashSet::from([1]));
        assert_eq!(plan.redo.iter().map(|r| r.lsn).collect::<Vec<_>>(), vec![1]);
        assert_eq!(plan.max_lsn, 5);
        assert_eq!(plan.max_txn_id, 3);
    }

    #[test]
    fn redo_keeps_lsn_order_across_interleaved_transactions() {
        let plan = analyze([
            data(1, 1, WalOp::Insert),
            data(2, 2, WalOp::Insert),
            data(3, 1, WalOp::Update),
            control(4, 2, WalOp::Commit),
            control(5, 1, WalOp::Commit),
        ]);

        assert_eq!(
            plan.redo.iter().map(|r| r.lsn).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn empty_log_yields_empty_plan() {
        let plan = analyze([]);
        assert!(plan.committed.is_empty());
        assert!(plan.redo.is_empty());
        assert_eq!(plan.max_lsn, 0);
    }
}
