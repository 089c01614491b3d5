use crate::cursor::ScanCursor;
use crate::errors::EngineResult;
use crate::recovery;
use buffer::BufferManager;
use catalog::{Catalog, IndexDef, TableDef};
use heap::HeapFile;
use page::rid::Rid;
use pager::FileSet;
use record::{Schema, Value};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};
use txn::TxnManager;
use wal::{DataPayload, SyncPolicy, TxnId, Wal, WalOp};

/// Construction-time knobs; the daemon maps its config file and environment
/// onto this.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub data_dir: PathBuf,
    pub buffer_pages: NonZeroUsize,
    pub wal_sync: SyncPolicy,
}

/// A point-in-time snapshot of engine internals, for diagnostics.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub tables: usize,
    pub indexes: usize,
    pub live_txns: usize,
    pub buffer_pool_size: usize,
    pub buffer_frames_in_use: usize,
    pub buffer_dirty_frames: usize,
    pub next_wal_lsn: u64,
}

/// Process-wide database engine: catalog, file set, buffer pool, write-ahead
/// log and transaction manager bundled into one object that lives for the
/// process.
///
/// Commit protocol: data records are appended to the log as statements
/// execute, COMMIT is appended and fsynced before the call returns, and page
/// flushes are deferred to quiescent checkpoints. Rollback applies the
/// transaction's before-images in reverse, in memory.
#[derive(Debug)]
pub struct Engine {
    catalog: Arc<Catalog>,
    files: Arc<FileSet>,
    buffer: Arc<BufferManager<FileSet>>,
    wal: Arc<Wal>,
    txns: Arc<TxnManager>,
    heaps: RwLock<HashMap<String, Arc<HeapFile>>>,
    indexes: RwLock<HashMap<String, Arc<btree::BTree>>>,
}

impl Engine {
    /// Opens (or initializes) the database under `options.data_dir`, replays
    /// the write-ahead log, and checkpoints.
    pub fn open(options: EngineOptions) -> EngineResult<Self> {
        let catalog = Arc::new(Catalog::open(&options.data_dir)?);
        let files = Arc::new(FileSet::new());
        for table in catalog.list_tables() {
            files.add_file(table.file_id, table.file_path.clone());
        }
        for index in catalog.list_indexes() {
            files.add_file(index.file_id, index.file_path.clone());
        }

        let buffer = Arc::new(BufferManager::new(
            Arc::clone(&files),
            options.buffer_pages.get(),
        ));
        let wal = Arc::new(Wal::open(
            options.data_dir.join("wal.log"),
            options.wal_sync,
        )?);
        let txns = Arc::new(TxnManager::new());

        let engine = Self {
            catalog,
            files,
            buffer,
            wal,
            txns,
            heaps: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
        };

        recovery::run(&engine)?;
        Ok(engine)
    }

    // -----------------------------------------------------------------------
    // DDL
    // -----------------------------------------------------------------------

    /// Creates a table and its backing heap file.
    pub fn create_table(&self, name: &str, schema: Schema) -> EngineResult<TableDef> {
        let def = self.catalog.create_table(name, schema.clone())?;
        self.files.add_file(def.file_id, def.file_path.clone());
        let heap_file = HeapFile::create(
            Arc::clone(&self.files),
            Arc::clone(&self.buffer),
            def.file_id,
            name,
            schema,
        )?;
        self.heaps
            .write()
            .expect("heap cache poisoned")
            .insert(name.to_string(), Arc::new(heap_file));
        // DDL is durable on return: the header page must survive a crash.
        self.files.flush(def.file_id)?;
        Ok(def)
    }

    /// Drops a table, its indexes, and every backing file.
    pub fn drop_table(&self, name: &str) -> EngineResult<()> {
        let (table, indexes) = self.catalog.drop_table(name)?;

        self.heaps.write().expect("heap cache poisoned").remove(name);
        {
            let mut cache = self.indexes.write().expect("index cache poisoned");
            for index in &indexes {
                cache.remove(&index.name);
            }
        }

        for index in indexes {
            self.buffer.discard_file(index.file_id)?;
            self.files.remove_file(index.file_id)?;
        }
        self.buffer.discard_file(table.file_id)?;
        self.files.remove_file(table.file_id)?;
        Ok(())
    }

    /// Creates an index and backfills it from the table's current contents.
    pub fn create_index(
        &self,
        name: &str,
        table_name: &str,
        column: &str,
        unique: bool,
    ) -> EngineResult<IndexDef> {
        let def = self.catalog.create_index(name, table_name, column, unique)?;
        self.files.add_file(def.file_id, def.file_path.clone());

        let tree = btree::BTree::create(
            Arc::clone(&self.files),
            Arc::clone(&self.buffer),
            def.file_id,
            def.key_type,
            unique,
        )?;

        // Backfill from the heap; NULL keys stay out of the index.
        let heap_file = self.heap(table_name)?;
        let schema = heap_file.schema().clone();
        let backfill = (|| -> EngineResult<()> {
            for item in heap_file.scan()? {
                let (rid, bytes) = item?;
                let values = record::decode(&schema, &bytes)?;
                let key = &values[def.column_index];
                if !key.is_null() {
                    tree.insert(key, rid)?;
                }
            }
            Ok(())
        })();

        if let Err(err) = backfill {
            // Unwind the half-built index so the failure leaves no trace.
            let _ = self.catalog.drop_index(name);
            let _ = self.buffer.discard_file(def.file_id);
            let _ = self.files.remove_file(def.file_id);
            return Err(err);
        }

        // DDL is durable on return. The backfilled pages are not covered by
        // the log (only DML is), so they must reach disk here; this touches
        // only the new index's file, never pages of in-flight transactions.
        self.buffer.flush_file(def.file_id)?;
        self.files.flush(def.file_id)?;

        self.indexes
            .write()
            .expect("index cache poisoned")
            .insert(name.to_string(), Arc::new(tree));
        Ok(def)
    }

    /// Drops an index and its backing file.
    pub fn drop_index(&self, name: &str) -> EngineResult<()> {
        let def = self.catalog.drop_index(name)?;
        self.indexes
            .write()
            .expect("index cache poisoned")
            .remove(name);
        self.buffer.discard_file(def.file_id)?;
        self.files.remove_file(def.file_id)?;
        Ok(())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Starts a transaction.
    pub fn begin(&self) -> TxnId {
        self.txns.begin()
    }

    /// Commits: COMMIT record appended and fsynced, then locks released.
    /// Page flushes are deferred to the next quiescent checkpoint; the log
    /// alone carries durability.
    pub fn commit(&self, txn_id: TxnId) -> EngineResult<()> {
        self.txns.begin_commit(txn_id)?;
        self.wal.commit(txn_id)?;
        self.txns.finish_commit(txn_id)?;
        Ok(())
    }

    /// Rolls back: the transaction's mutations are reverted in reverse order
    /// from their logged before-images, then locks are released.
    pub fn rollback(&self, txn_id: TxnId) -> EngineResult<()> {
        let undo_chain = self.txns.begin_abort(txn_id)?;

        for (op, payload) in undo_chain {
            self.apply_undo(op, &payload)?;
        }

        self.wal.rollback(txn_id)?;
        self.txns.finish_abort(txn_id)?;
        Ok(())
    }

    /// Flushes every dirty page and truncates the log. Only runs when no
    /// transaction is live, so uncommitted bytes never reach disk; returns
    /// whether the checkpoint actually happened.
    pub fn checkpoint(&self) -> EngineResult<bool> {
        if self.txns.live_count() > 0 {
            return Ok(false);
        }
        self.buffer.flush_dirty()?;
        self.files.flush_all()?;
        let lsn = self.wal.checkpoint()?;
        self.wal.truncate_to(lsn)?;
        tracing::info!(lsn, "checkpoint complete");
        Ok(true)
    }

    /// Graceful teardown: checkpoint if possible, and in any case make the
    /// log durable.
    pub fn shutdown(&self) -> EngineResult<()> {
        let checkpointed = self.checkpoint()?;
        if !checkpointed {
            self.wal.flush()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // DML
    // -----------------------------------------------------------------------

    /// Inserts a row, maintains every index on the table, and returns the
    /// new RID.
    pub fn insert(&self, txn_id: TxnId, table: &str, values: &[Value]) -> EngineResult<Rid> {
        self.txns.ensure_active(txn_id)?;
        let heap_file = self.heap(table)?;
        let tuple = record::encode(heap_file.schema(), values)?;

        self.txns.lock_table_intention_exclusive(txn_id, table)?;
        let rid = heap_file.insert(&tuple, 0)?;
        self.txns.lock_row_exclusive(txn_id, table, rid)?;

        let payload = DataPayload {
            table: table.to_string(),
            rid,
            new_rid: rid,
            before: None,
            after: Some(tuple),
        };
        let lsn = self.wal.append(txn_id, WalOp::Insert, payload.clone())?;
        heap_file.stamp_page_lsn(rid.page_no, lsn)?;
        self.txns.record_undo(txn_id, WalOp::Insert, payload)?;

        for (index_def, tree) in self.indexes_of(table)? {
            let key = &values[index_def.column_index];
            if !key.is_null() {
                tree.insert(key, rid)?;
            }
        }

        Ok(rid)
    }

    /// Reads one row under a shared row lock.
    pub fn get(&self, txn_id: TxnId, table: &str, rid: Rid) -> EngineResult<Vec<Value>> {
        self.txns.ensure_active(txn_id)?;
        self.txns.lock_row_shared(txn_id, table, rid)?;
        let heap_file = self.heap(table)?;
        let bytes = heap_file.get(rid)?;
        Ok(record::decode(heap_file.schema(), &bytes)?)
    }

    /// Replaces one row. The returned RID differs from `rid` when the new
    /// image no longer fit its page; indexes are repointed either way.
    pub fn update(
        &self,
        txn_id: TxnId,
        table: &str,
        rid: Rid,
        values: &[Value],
    ) -> EngineResult<Rid> {
        self.txns.ensure_active(txn_id)?;
        self.txns.lock_row_exclusive(txn_id, table, rid)?;

        let heap_file = self.heap(table)?;
        let before_bytes = heap_file.get(rid)?;
        let before_values = record::decode(heap_file.schema(), &before_bytes)?;
        let after_bytes = record::encode(heap_file.schema(), values)?;

        let new_rid = heap_file.update(rid, &after_bytes, 0)?;
        if new_rid != rid {
            self.txns.lock_row_exclusive(txn_id, table, new_rid)?;
        }

        let payload = DataPayload {
            table: table.to_string(),
            rid,
            new_rid,
            before: Some(before_bytes),
            after: Some(after_bytes),
        };
        let lsn = self.wal.append(txn_id, WalOp::Update, payload.clone())?;
        heap_file.stamp_page_lsn(rid.page_no, lsn)?;
        if new_rid.page_no != rid.page_no {
            heap_file.stamp_page_lsn(new_rid.page_no, lsn)?;
        }
        self.txns.record_undo(txn_id, WalOp::Update, payload)?;

        // Repoint indexes whose key changed, and every index when the RID
        // moved.
        for (index_def, tree) in self.indexes_of(table)? {
            let old_key = &before_values[index_def.column_index];
            let new_key = &values[index_def.column_index];
            let key_changed = match (old_key.is_null(), new_key.is_null()) {
                (true, true) => false,
                (false, false) => old_key.compare(new_key)? != std::cmp::Ordering::Equal,
                _ => true,
            };
            if key_changed || new_rid != rid {
                if !old_key.is_null() {
                    tree.delete(old_key, rid)?;
                }
                if !new_key.is_null() {
                    tree.insert(new_key, new_rid)?;
                }
            }
        }

        Ok(new_rid)
    }

    /// Deletes one row and its index entries.
    pub fn delete(&self, txn_id: TxnId, table: &str, rid: Rid) -> EngineResult<()> {
        self.txns.ensure_active(txn_id)?;
        self.txns.lock_row_exclusive(txn_id, table, rid)?;

        let heap_file = self.heap(table)?;
        let before_bytes = heap_file.get(rid)?;
        let before_values = record::decode(heap_file.schema(), &before_bytes)?;

        heap_file.delete(rid, 0)?;

        let payload = DataPayload {
            table: table.to_string(),
            rid,
            new_rid: rid,
            before: Some(before_bytes),
            after: None,
        };
        let lsn = self.wal.append(txn_id, WalOp::Delete, payload.clone())?;
        heap_file.stamp_page_lsn(rid.page_no, lsn)?;
        self.txns.record_undo(txn_id, WalOp::Delete, payload)?;

        for (index_def, tree) in self.indexes_of(table)? {
            let key = &before_values[index_def.column_index];
            if !key.is_null() {
                tree.delete(key, rid)?;
            }
        }

        Ok(())
    }

    /// Full-table scan under a table S lock. Rows decode lazily; the cancel
    /// flag aborts the cursor between rows.
    pub fn scan(
        &self,
        txn_id: TxnId,
        table: &str,
        cancel: Arc<AtomicBool>,
    ) -> EngineResult<ScanCursor> {
        self.txns.ensure_active(txn_id)?;
        self.txns.lock_table_shared(txn_id, table)?;
        let heap_file = self.heap(table)?;
        Ok(ScanCursor::new(
            heap_file.scan()?,
            heap_file.schema().clone(),
            cancel,
        ))
    }

    /// Point lookup through an index: the first row whose key equals `key`.
    pub fn index_search(
        &self,
        txn_id: TxnId,
        index_name: &str,
        key: &Value,
    ) -> EngineResult<Option<(Rid, Vec<Value>)>> {
        self.txns.ensure_active(txn_id)?;
        let def = self.catalog.get_index(index_name)?;
        let tree = self.index(index_name)?;

        let Some(rid) = tree.search(key)? else {
            return Ok(None);
        };
        let values = self.get(txn_id, &def.table_name, rid)?;
        Ok(Some((rid, values)))
    }

    /// Ascending index range over `[lo, hi]`, materialized as `(key, RID)`
    /// pairs. The table rows stay untouched; operators fetch them through
    /// [`Engine::get`] as they iterate.
    pub fn index_range(
        &self,
        txn_id: TxnId,
        index_name: &str,
        lo: Option<&Value>,
        hi: Option<&Value>,
    ) -> EngineResult<Vec<(Value, Rid)>> {
        self.txns.ensure_active(txn_id)?;
        let def = self.catalog.get_index(index_name)?;
        self.txns.lock_table_shared(txn_id, &def.table_name)?;

        let tree = self.index(index_name)?;
        let mut pairs = Vec::new();
        for item in tree.range(lo, hi)? {
            pairs.push(item?);
        }
        Ok(pairs)
    }

    /// Diagnostics snapshot.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            tables: self.catalog.list_tables().len(),
            indexes: self.catalog.list_indexes().len(),
            live_txns: self.txns.live_count(),
            buffer_pool_size: self.buffer.pool_size(),
            buffer_frames_in_use: self.buffer.frames_in_use(),
            buffer_dirty_frames: self.buffer.dirty_frames(),
            next_wal_lsn: self.wal.next_lsn(),
        }
    }

    // -----------------------------------------------------------------------
    // Internals shared with recovery
    // -----------------------------------------------------------------------

    pub(crate) fn wal(&self) -> &Wal {
        &self.wal
    }

    pub(crate) fn txns(&self) -> &TxnManager {
        &self.txns
    }

    /// The cached heap file for a table, opened on first use.
    pub(crate) fn heap(&self, table: &str) -> EngineResult<Arc<HeapFile>> {
        {
            let heaps = self.heaps.read().expect("heap cache poisoned");
            if let Some(heap_file) = heaps.get(table) {
                return Ok(Arc::clone(heap_file));
            }
        }
        let def = self.catalog.get_table(table)?;
        let heap_file = Arc::new(HeapFile::open(
            Arc::clone(&self.files),
            Arc::clone(&self.buffer),
            def.file_id,
        )?);
        let mut heaps = self.heaps.write().expect("heap cache poisoned");
        Ok(Arc::clone(
            heaps
                .entry(table.to_string())
                .or_insert_with(|| heap_file),
        ))
    }

    /// The cached B-Tree for an index, opened on first use.
    pub(crate) fn index(&self, name: &str) -> EngineResult<Arc<btree::BTree>> {
        {
            let indexes = self.indexes.read().expect("index cache poisoned");
            if let Some(tree) = indexes.get(name) {
                return Ok(Arc::clone(tree));
            }
        }
        let def = self.catalog.get_index(name)?;
        let tree = Arc::new(btree::BTree::open(
            Arc::clone(&self.files),
            Arc::clone(&self.buffer),
            def.file_id,
        )?);
        let mut indexes = self.indexes.write().expect("index cache poisoned");
        Ok(Arc::clone(
            indexes.entry(name.to_string()).or_insert_with(|| tree),
        ))
    }

    /// Every index on a table, paired with its open tree.
    pub(crate) fn indexes_of(
        &self,
        table: &str,
    ) -> EngineResult<Vec<(IndexDef, Arc<btree::BTree>)>> {
        let mut result = Vec::new();
        for def in self.catalog.indexes_of(table) {
            let tree = self.index(&def.name)?;
            result.push((def, tree));
        }
        Ok(result)
    }

    /// Reverts one logged mutation, newest-first order supplied by the
    /// transaction manager.
    fn apply_undo(&self, op: WalOp, payload: &DataPayload) -> EngineResult<()> {
        let heap_file = self.heap(&payload.table)?;
        let schema = heap_file.schema().clone();

        match op {
            WalOp::Insert => {
                let after = payload.after.as_deref().unwrap_or_default();
                match heap_file.delete(payload.new_rid, 0) {
                    Ok(()) | Err(heap::HeapError::NotFound(_)) => {}
                    Err(err) => return Err(err.into()),
                }
                let values = record::decode(&schema, after)?;
                for (index_def, tree) in self.indexes_of(&payload.table)? {
                    let key = &values[index_def.column_index];
                    if !key.is_null() {
                        tree.delete(key, payload.new_rid)?;
                    }
                }
            }
            WalOp::Delete => {
                let before = payload.before.as_deref().unwrap_or_default();
                heap_file.reinsert_at(payload.rid, before, 0)?;
                let values = record::decode(&schema, before)?;
                for (index_def, tree) in self.indexes_of(&payload.table)? {
                    let key = &values[index_def.column_index];
                    if !key.is_null() && !tree.contains_pair(key, payload.rid)? {
                        tree.insert(key, payload.rid)?;
                    }
                }
            }
            WalOp::Update => {
                let before = payload.before.as_deref().unwrap_or_default();
                let after = payload.after.as_deref().unwrap_or_default();

                if payload.new_rid == payload.rid {
                    heap_file.update(payload.rid, before, 0)?;
                } else {
                    match heap_file.delete(payload.new_rid, 0) {
                        Ok(()) | Err(heap::HeapError::NotFound(_)) => {}
                        Err(err) => return Err(err.into()),
                    }
                    heap_file.reinsert_at(payload.rid, before, 0)?;
                }

                let before_values = record::decode(&schema, before)?;
                let after_values = record::decode(&schema, after)?;
                for (index_def, tree) in self.indexes_of(&payload.table)? {
                    let old_key = &before_values[index_def.column_index];
                    let new_key = &after_values[index_def.column_index];
                    if !new_key.is_null() {
                        tree.delete(new_key, payload.new_rid)?;
                    }
                    if !old_key.is_null() && !tree.contains_pair(old_key, payload.rid)? {
                        tree.insert(old_key, payload.rid)?;
                    }
                }
            }
            WalOp::Commit | WalOp::Rollback | WalOp::Checkpoint => {
                unreachable!("control records never enter an undo chain")
            }
        }
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Best effort: the daemon calls shutdown() explicitly; this covers
        // early exits.
        if let Err(err) = self.wal.flush() {
            tracing::error!(?err, "wal flush on drop failed");
        }
    }
}
