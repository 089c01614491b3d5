use crate::errors::{HeapError, HeapResult};
use crate::scan::HeapScan;
use buffer::BufferManager;
use page::page_id::{FileId, PageId};
use page::page_kind::PageKind;
use page::rid::Rid;
use page::{HEADER_SIZE, PAGE_SIZE};
use pager::{FileSet, HEADER_PAGE_PAYLOAD_OFFSET};
use record::Schema;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Largest tuple a heap page can carry: one slot plus the tuple bytes.
pub const MAX_TUPLE_LEN: usize = PAGE_SIZE - HEADER_SIZE - 4;

/// Table metadata serialized as JSON into the header page.
#[derive(Debug, Serialize, Deserialize)]
struct HeapHeader {
    name: String,
    schema: Schema,
}

/// A heap table file: header page plus unordered slotted data pages.
///
/// All page access goes through the buffer pool except the header page,
/// which is read once at open and rewritten only on create.
#[derive(Debug)]
pub struct HeapFile {
    file_id: FileId,
    files: Arc<FileSet>,
    buffer: Arc<BufferManager<FileSet>>,
    table_name: String,
    schema: Schema,
    /// Page number of the last insert target; probing starts here so bulk
    /// loads do not rescan the whole file per tuple.
    insert_hint: Mutex<u32>,
}

impl HeapFile {
    /// Creates a fresh heap file for `file_id` (already registered with the
    /// file set) and writes the table metadata into the header page.
    pub fn create(
        files: Arc<FileSet>,
        buffer: Arc<BufferManager<FileSet>>,
        file_id: FileId,
        table_name: impl Into<String>,
        schema: Schema,
    ) -> HeapResult<Self> {
        let table_name = table_name.into();
        let pager = files.pager(file_id)?;

        let header = HeapHeader {
            name: table_name.clone(),
            schema: schema.clone(),
        };
        let json = serde_json::to_vec(&header).map_err(HeapError::BadHeader)?;

        let mut page0 = pager.read(0)?;
        let at = HEADER_PAGE_PAYLOAD_OFFSET;
        page0[at..at + 4].copy_from_slice(&(json.len() as u32).to_be_bytes());
        page0[at + 4..at + 4 + json.len()].copy_from_slice(&json);
        pager.write(0, &mut page0)?;

        Ok(Self {
            file_id,
            files,
            buffer,
            table_name,
            schema,
            insert_hint: Mutex::new(1),
        })
    }

    /// Opens an existing heap file, reading the table metadata back from the
    /// header page.
    pub fn open(
        files: Arc<FileSet>,
        buffer: Arc<BufferManager<FileSet>>,
        file_id: FileId,
    ) -> HeapResult<Self> {
        let pager = files.pager(file_id)?;
        let page0 = pager.read(0)?;

        let at = HEADER_PAGE_PAYLOAD_OFFSET;
        let json_len =
            u32::from_be_bytes([page0[at], page0[at + 1], page0[at + 2], page0[at + 3]]) as usize;
        let header: HeapHeader = serde_json::from_slice(&page0[at + 4..at + 4 + json_len])
            .map_err(HeapError::BadHeader)?;

        Ok(Self {
            file_id,
            files,
            buffer,
            table_name: header.name,
            schema: header.schema,
            insert_hint: Mutex::new(1),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    /// Inserts a tuple, returning its RID. Probes from the hint page forward,
    /// allocating a fresh page when nothing has room; the page LSN is stamped
    /// with `lsn`.
    pub fn insert(&self, tuple: &[u8], lsn: u64) -> HeapResult<Rid> {
        if tuple.len() > MAX_TUPLE_LEN {
            return Err(HeapError::TupleTooLarge {
                len: tuple.len(),
                max: MAX_TUPLE_LEN,
            });
        }

        let page_count = self.files.pager(self.file_id)?.page_count();
        let hint = *self.insert_hint.lock().expect("insert hint poisoned");

        // Probe the hinted page first, then every data page after and before it.
        let candidates = (hint..page_count).chain(1..hint.min(page_count));
        for page_no in candidates {
            let page_id = PageId::new(self.file_id, page_no);
            let mut guard = self.buffer.read_page_mut(page_id)?;
            let plan = match guard.plan_insert(tuple.len()) {
                Ok(plan) => plan,
                Err(err) if err.is_page_full() => continue,
                Err(err) => return Err(err.into()),
            };
            let slot_id = guard.insert(plan, tuple)?;
            guard.set_page_lsn(lsn)?;
            drop(guard);

            *self.insert_hint.lock().expect("insert hint poisoned") = page_no;
            return Ok(Rid::new(page_no, slot_id));
        }

        // Nothing had room; extend the file.
        let page_no = self.files.allocate(self.file_id)?;
        let page_id = PageId::new(self.file_id, page_no);
        let mut guard = self.buffer.allocate_new_page(page_id)?;
        guard.initialize(page_id, PageKind::Heap)?;
        let plan = guard.plan_insert(tuple.len())?;
        let slot_id = guard.insert(plan, tuple)?;
        guard.set_page_lsn(lsn)?;
        drop(guard);

        *self.insert_hint.lock().expect("insert hint poisoned") = page_no;
        tracing::trace!(table = %self.table_name, page_no, "extended heap file");
        Ok(Rid::new(page_no, slot_id))
    }

    /// Reads the tuple at `rid`.
    pub fn get(&self, rid: Rid) -> HeapResult<Vec<u8>> {
        let guard = self
            .buffer
            .read_page(PageId::new(self.file_id, rid.page_no))?;
        match guard.row(rid.slot_id) {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(err) if err.is_not_found() => Err(HeapError::NotFound(rid)),
            Err(err) => Err(err.into()),
        }
    }

    /// Replaces the tuple at `rid`, preferring an in-page rewrite. When the
    /// new image no longer fits its page, the tuple moves and the returned
    /// RID differs from `rid` — callers holding index entries must propagate
    /// the new RID to every index on the table.
    pub fn update(&self, rid: Rid, tuple: &[u8], lsn: u64) -> HeapResult<Rid> {
        if tuple.len() > MAX_TUPLE_LEN {
            return Err(HeapError::TupleTooLarge {
                len: tuple.len(),
                max: MAX_TUPLE_LEN,
            });
        }

        {
            let mut guard = self
                .buffer
                .read_page_mut(PageId::new(self.file_id, rid.page_no))?;
            match guard.update_row(rid.slot_id, tuple) {
                Ok(()) => {
                    guard.set_page_lsn(lsn)?;
                    return Ok(rid);
                }
                Err(err) if err.is_page_full() => {
                    // Fall through to delete + reinsert on another page.
                }
                Err(err) if err.is_missing_slot() => return Err(HeapError::NotFound(rid)),
                Err(err) => return Err(err.into()),
            }
            guard.delete_row(rid.slot_id)?;
            guard.set_page_lsn(lsn)?;
        }

        self.insert(tuple, lsn)
    }

    /// Deletes the tuple at `rid`. The slot becomes reusable; its bytes are
    /// reclaimed by in-page compaction on demand.
    pub fn delete(&self, rid: Rid, lsn: u64) -> HeapResult<()> {
        let mut guard = self
            .buffer
            .read_page_mut(PageId::new(self.file_id, rid.page_no))?;
        match guard.delete_row(rid.slot_id) {
            Ok(()) => {
                guard.set_page_lsn(lsn)?;
                Ok(())
            }
            Err(err) if err.is_missing_slot() => Err(HeapError::NotFound(rid)),
            Err(err) => Err(err.into()),
        }
    }

    /// Re-applies a logged insert at its original RID. Recovery only.
    pub fn reinsert_at(&self, rid: Rid, tuple: &[u8], lsn: u64) -> HeapResult<()> {
        let page_count = self.files.pager(self.file_id)?.page_count();
        if rid.page_no >= page_count {
            // The crash happened before the allocated pages reached disk;
            // re-extend the file up to the logged page.
            while self.files.allocate(self.file_id)? < rid.page_no {}
            let page_id = PageId::new(self.file_id, rid.page_no);
            let mut guard = self.buffer.allocate_new_page(page_id)?;
            guard.initialize(page_id, PageKind::Heap)?;
        }

        let page_id = PageId::new(self.file_id, rid.page_no);
        let mut guard = self.buffer.read_page_mut(page_id)?;
        // An allocated-but-never-initialized page is all zeroes, which shows
        // up as free_start == 0 in the header.
        let initialized = guard.header_view()?.get_free_start()? as usize >= HEADER_SIZE;
        if !initialized {
            guard.initialize(page_id, PageKind::Heap)?;
        }
        guard.insert_at_slot(rid.slot_id, tuple)?;
        guard.set_page_lsn(lsn)?;
        Ok(())
    }

    /// Full scan over every live tuple in ascending `(page_no, slot_id)`
    /// order. Restartable by calling `scan` again.
    pub fn scan(&self) -> HeapResult<HeapScan> {
        let page_count = self.files.pager(self.file_id)?.page_count();
        Ok(HeapScan::new(
            Arc::clone(&self.buffer),
            self.file_id,
            page_count,
        ))
    }

    /// Stamps a data page with the LSN of a mutation that was logged after
    /// the page changed (the RID is only known once the change is applied).
    pub fn stamp_page_lsn(&self, page_no: u32, lsn: u64) -> HeapResult<()> {
        let mut guard = self
            .buffer
            .read_page_mut(PageId::new(self.file_id, page_no))?;
        guard.set_page_lsn(lsn)?;
        Ok(())
    }

    /// LSN stored on a data page, for recovery's idempotency check.
    pub fn page_lsn(&self, page_no: u32) -> HeapResult<u64> {
        let page_count = self.files.pager(self.file_id)?.page_count();
        if page_no >= page_count {
            return Ok(0);
        }
        let guard = self.buffer.read_page(PageId::new(self.file_id, page_no))?;
        Ok(guard.page_lsn()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use record::{Column, TypeTag, Value};
    use tempfile::tempdir;

    fn people_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", TypeTag::Int, false),
            Column::new("name", TypeTag::Str, true),
        ])
        .unwrap()
    }

    fn setup() -> (tempfile::TempDir, HeapFile) {
        let dir = tempdir().unwrap();
        let files = Arc::new(FileSet::new());
        files.add_file(1, dir.path().join("people.tbl"));
        let buffer = Arc::new(BufferManager::new(Arc::clone(&files), 16));
        let heap = HeapFile::create(files, buffer, 1, "people", people_schema()).unwrap();
        (dir, heap)
    }

    fn tuple(id: i32, name: &str) -> Vec<u8> {
        record::encode(
            &people_schema(),
            &[Value::Int(id), Value::Str(name.to_string())],
        )
        .unwrap()
    }

    #[test]
    fn insert_then_get_round_trips() {
        let (_dir, heap) = setup();
        let bytes = tuple(1, "ada");
        let rid = heap.insert(&bytes, 1).unwrap();
        assert_eq!(rid, Rid::new(1, 0));
        assert_eq!(heap.get(rid).unwrap(), bytes);
    }

    #[test]
    fn get_after_delete_is_not_found() {
        let (_dir, heap) = setup();
        let rid = heap.insert(&tuple(1, "ada"), 1).unwrap();
        heap.delete(rid, 2).unwrap();
        assert!(matches!(heap.get(rid), Err(HeapError::NotFound(r)) if r == rid));
    }

    #[test]
    fn insert_after_delete_reuses_slot() {
        let (_dir, heap) = setup();
        let _r1 = heap.insert(&tuple(1, "a"), 1).unwrap();
        let r2 = heap.insert(&tuple(2, "b"), 2).unwrap();
        let _r3 = heap.insert(&tuple(3, "c"), 3).unwrap();

        heap.delete(r2, 4).unwrap();
        let r4 = heap.insert(&tuple(4, "d"), 5).unwrap();

        // The freed slot on page 1 is the lowest deleted id, so it comes back.
        assert_eq!(r4, r2);
    }

    #[test]
    fn update_in_place_keeps_rid() {
        let (_dir, heap) = setup();
        let rid = heap.insert(&tuple(1, "long-initial-name"), 1).unwrap();
        let new_bytes = tuple(1, "x");
        let new_rid = heap.update(rid, &new_bytes, 2).unwrap();
        assert_eq!(new_rid, rid);
        assert_eq!(heap.get(rid).unwrap(), new_bytes);
    }

    #[test]
    fn update_that_outgrows_page_moves_tuple() {
        let (_dir, heap) = setup();

        // Two rows share page 1; growing the second past what the page can
        // reclaim forces a relocation.
        let filler = tuple(0, &"f".repeat(1000));
        let _a = heap.insert(&filler, 1).unwrap();
        let victim = heap.insert(&filler, 2).unwrap();

        let grown = tuple(0, &"g".repeat(3200));
        let moved = heap.update(victim, &grown, 3).unwrap();

        assert_ne!(moved, victim);
        assert_eq!(heap.get(moved).unwrap(), grown);
        assert!(matches!(heap.get(victim), Err(HeapError::NotFound(_))));
    }

    #[test]
    fn inserts_spill_to_new_pages() {
        let (_dir, heap) = setup();
        let big = tuple(0, &"x".repeat(1500));
        let mut pages = std::collections::BTreeSet::new();
        for _ in 0..8 {
            let rid = heap.insert(&big, 1).unwrap();
            pages.insert(rid.page_no);
        }
        assert!(pages.len() > 1, "expected inserts to span multiple pages");
    }

    #[test]
    fn oversized_tuple_is_rejected() {
        let (_dir, heap) = setup();
        let huge = vec![0u8; MAX_TUPLE_LEN + 1];
        assert!(matches!(
            heap.insert(&huge, 1),
            Err(HeapError::TupleTooLarge { .. })
        ));
    }

    #[test]
    fn reopen_recovers_schema_from_header_page() {
        let dir = tempdir().unwrap();
        let files = Arc::new(FileSet::new());
        files.add_file(1, dir.path().join("people.tbl"));
        let buffer = Arc::new(BufferManager::new(Arc::clone(&files), 16));
        {
            let heap = HeapFile::create(
                Arc::clone(&files),
                Arc::clone(&buffer),
                1,
                "people",
                people_schema(),
            )
            .unwrap();
            heap.insert(&tuple(1, "ada"), 1).unwrap();
            buffer.flush_dirty().unwrap();
            files.flush_all().unwrap();
        }

        let heap = HeapFile::open(files, buffer, 1).unwrap();
        assert_eq!(heap.table_name(), "people");
        assert_eq!(heap.schema(), &people_schema());
        assert_eq!(heap.get(Rid::new(1, 0)).unwrap(), tuple(1, "ada"));
    }

    #[test]
    fn scan_yields_live_tuples_in_rid_order() {
        let (_dir, heap) = setup();
        let r1 = heap.insert(&tuple(1, "a"), 1).unwrap();
        let r2 = heap.insert(&tuple(2, "b"), 2).unwrap();
        let r3 = heap.insert(&tuple(3, "c"), 3).unwrap();
        heap.delete(r2, 4).unwrap();

        let rows: Vec<_> = heap.scan().unwrap().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(
            rows.iter().map(|(rid, _)| *rid).collect::<Vec<_>>(),
            vec![r1, r3]
        );
        assert_eq!(rows[0].1, tuple(1, "a"));
        assert_eq!(rows[1].1, tuple(3, "c"));
    }
}
