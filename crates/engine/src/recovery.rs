//! Startup recovery: replays committed work from the log onto the data
//! files, then checkpoints.
//!
//! Heap redo is guarded by each page's LSN (skip when the page already
//! carries the mutation); index redo is guarded logically, by checking for
//! the exact `(key, RID)` pair, which makes it idempotent regardless of
//! which index pages reached disk before the crash.

use crate::engine::Engine;
use crate::errors::EngineResult;
use catalog::CatalogError;
use wal::{DataPayload, WalOp, WalRecord, analyze};

/// Runs full recovery on a freshly opened engine: scan, redo, checkpoint.
pub fn run(engine: &Engine) -> EngineResult<()> {
    let records = engine.wal().iter_from(0)?;
    let plan = analyze(records);

    if !plan.redo.is_empty() {
        tracing::info!(
            committed = plan.committed.len(),
            redo_records = plan.redo.len(),
            "replaying write-ahead log"
        );
    }

    for record in &plan.redo {
        redo_record(engine, record)?;
    }

    engine.txns().set_next_txn_id(plan.max_txn_id + 1);

    // Recovery leaves no live transactions, so this always flushes and
    // truncates, fulfilling the final protocol step.
    engine.checkpoint()?;
    Ok(())
}

fn redo_record(engine: &Engine, record: &WalRecord) -> EngineResult<()> {
    let payload = record
        .payload
        .as_ref()
        .expect("redo plans only contain data records");

    // A table dropped after the logged mutation has no heap to replay into.
    let heap_file = match engine.heap(&payload.table) {
        Ok(heap_file) => heap_file,
        Err(crate::EngineError::Catalog(CatalogError::UnknownTable(_))) => return Ok(()),
        Err(err) => return Err(err),
    };

    match record.op {
        WalOp::Insert => {
            if heap_file.page_lsn(payload.new_rid.page_no)? < record.lsn {
                let after = payload.after.as_deref().unwrap_or_default();
                heap_file.reinsert_at(payload.new_rid, after, record.lsn)?;
            }
        }
        WalOp::Delete => {
            if heap_file.page_lsn(payload.rid.page_no)? < record.lsn {
                match heap_file.delete(payload.rid, record.lsn) {
                    Ok(()) | Err(heap::HeapError::NotFound(_)) => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
        WalOp::Update => redo_update(heap_file.as_ref(), record, payload)?,
        WalOp::Commit | WalOp::Rollback | WalOp::Checkpoint => {
            unreachable!("redo plans only contain data records")
        }
    }

    redo_indexes(engine, payload)
}

fn redo_update(
    heap_file: &heap::HeapFile,
    record: &WalRecord,
    payload: &DataPayload,
) -> EngineResult<()> {
    let after = payload.after.as_deref().unwrap_or_default();

    if payload.new_rid == payload.rid {
        if heap_file.page_lsn(payload.rid.page_no)? < record.lsn {
            match heap_file.update(payload.rid, after, record.lsn) {
                Ok(_) => {}
                // The pre-crash page never made it to disk; the tuple is
                // simply absent. Recreate it at its logged address.
                Err(heap::HeapError::NotFound(_)) => {
                    heap_file.reinsert_at(payload.rid, after, record.lsn)?;
                }
                Err(err) => return Err(err.into()),
            }
        }
        return Ok(());
    }

    // The update moved the tuple: the old page loses it, the new page gains
    // it, each guarded by its own LSN.
    if heap_file.page_lsn(payload.rid.page_no)? < record.lsn {
        match heap_file.delete(payload.rid, record.lsn) {
            Ok(()) | Err(heap::HeapError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
    }
    if heap_file.page_lsn(payload.new_rid.page_no)? < record.lsn {
        heap_file.reinsert_at(payload.new_rid, after, record.lsn)?;
    }
    Ok(())
}

/// Reconciles every index on the table with the logical effect of one data
/// record: old pairs out, new pairs in, both guarded by presence checks.
fn redo_indexes(engine: &Engine, payload: &DataPayload) -> EngineResult<()> {
    let heap_file = engine.heap(&payload.table)?;
    let schema = heap_file.schema().clone();

    let before_values = match &payload.before {
        Some(bytes) => Some(record::decode(&schema, bytes)?),
        None => None,
    };
    let after_values = match &payload.after {
        Some(bytes) => Some(record::decode(&schema, bytes)?),
        None => None,
    };

    for (index_def, tree) in engine.indexes_of(&payload.table)? {
        if let Some(values) = &before_values {
            let key = &values[index_def.column_index];
            let keep = after_values
                .as_ref()
                .map(|after| {
                    payload.new_rid == payload.rid
                        && !after[index_def.column_index].is_null()
                        && !key.is_null()
                        && after[index_def.column_index]
                            .compare(key)
                            .map(|o| o == std::cmp::Ordering::Equal)
                            .unwrap_or(false)
                })
                .unwrap_or(false);
            if !key.is_null() && !keep && tree.contains_pair(key, payload.rid)? {
                tree.delete(key, payload.rid)?;
            }
        }
        if let Some(values) = &after_values {
            let key = &values[index_def.column_index];
            if !key.is_null() && !tree.contains_pair(key, payload.new_rid)? {
                tree.insert(key, payload.new_rid)?;
            }
        }
    }
    Ok(())
}
