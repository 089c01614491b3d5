//! The B+-tree proper: open/create, point lookup, insert with splits, delete
//! with borrow/merge, and the range-scan entry point.

use crate::errors::{BTreeError, BTreeResult};
use crate::key::{check_key, compare_keys, decode_key, encode_key};
use crate::node::{self, NO_PAGE};
use crate::range::RangeScan;
use buffer::BufferManager;
use buffer::guards::PageWriteGuard;
use page::page_id::{FileId, PageId};
use page::page_kind::PageKind;
use page::rid::{RID_LEN, Rid};
use page::{HEADER_SIZE, PAGE_SIZE};
use pager::{FileSet, HEADER_PAGE_PAYLOAD_OFFSET};
use record::{TypeTag, Value};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex, RwLock};

/// Usable bytes of a node page: everything between header and special tail.
const NODE_CAPACITY: usize = PAGE_SIZE - HEADER_SIZE - 8;

/// Largest key the tree accepts. Bounded so at least four entries fit per
/// node, which keeps splits meaningful.
pub const MAX_KEY_LEN: usize = NODE_CAPACITY / 4 - RID_LEN - 4;

/// Cached copy of the header-page fields that change at runtime.
#[derive(Debug, Clone, Copy)]
struct Meta {
    root: u32,
    height: u16,
}

/// Outcome of a recursive delete.
enum DeleteOutcome {
    NotFound,
    Removed { underflow: bool },
}

/// A page-backed B+-tree over typed keys.
///
/// Structure mutations take the tree latch exclusively; lookups and range
/// scans share it. Within a mutation, node latches are taken one page at a
/// time through the buffer pool.
#[derive(Debug)]
pub struct BTree {
    file_id: FileId,
    files: Arc<FileSet>,
    buffer: Arc<BufferManager<FileSet>>,
    key_type: TypeTag,
    unique: bool,
    meta: Mutex<Meta>,
    latch: RwLock<()>,
}

impl BTree {
    /// Creates a fresh index file with an empty leaf as its root.
    pub fn create(
        files: Arc<FileSet>,
        buffer: Arc<BufferManager<FileSet>>,
        file_id: FileId,
        key_type: TypeTag,
        unique: bool,
    ) -> BTreeResult<Self> {
        if key_type == TypeTag::Bool {
            return Err(BTreeError::KeyTypeMismatch {
                expected: key_type,
                found: "boolean keys are not supported",
            });
        }

        let root = files.allocate(file_id)?;
        let page_id = PageId::new(file_id, root);
        let mut guard = buffer.allocate_new_page(page_id)?;
        guard.initialize(page_id, PageKind::IndexLeaf)?;
        drop(guard);

        let tree = Self {
            file_id,
            files,
            buffer,
            key_type,
            unique,
            meta: Mutex::new(Meta { root, height: 1 }),
            latch: RwLock::new(()),
        };
        tree.write_meta(Meta { root, height: 1 })?;
        Ok(tree)
    }

    /// Opens an existing index file, reading root/type/height from the
    /// header page.
    pub fn open(
        files: Arc<FileSet>,
        buffer: Arc<BufferManager<FileSet>>,
        file_id: FileId,
    ) -> BTreeResult<Self> {
        let pager = files.pager(file_id)?;
        let page0 = pager.read(0)?;
        let at = HEADER_PAGE_PAYLOAD_OFFSET;

        let root = u32::from_be_bytes([page0[at], page0[at + 1], page0[at + 2], page0[at + 3]]);
        let key_type = TypeTag::try_from(page0[at + 4])?;
        let unique = page0[at + 5] != 0;
        let height = u16::from_be_bytes([page0[at + 6], page0[at + 7]]);

        if root == NO_PAGE || height == 0 {
            return Err(BTreeError::CorruptIndex(
                "header page holds no root pointer".to_string(),
            ));
        }

        Ok(Self {
            file_id,
            files,
            buffer,
            key_type,
            unique,
            meta: Mutex::new(Meta { root, height }),
            latch: RwLock::new(()),
        })
    }

    pub fn key_type(&self) -> TypeTag {
        self.key_type
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    /// Height of the tree: 1 for a lone leaf root.
    pub fn height(&self) -> u16 {
        self.meta.lock().expect("btree meta poisoned").height
    }

    #[cfg(test)]
    pub(crate) fn root_page(&self) -> u32 {
        self.meta.lock().expect("btree meta poisoned").root
    }

    /// Point lookup: the RID of the first entry with an equal key.
    pub fn search(&self, key: &Value) -> BTreeResult<Option<Rid>> {
        check_key(key, self.key_type)?;
        let _latch = self.latch.read().expect("btree latch poisoned");

        let mut cursor = self.leaf_position(key)?;
        loop {
            let Some((page_no, pos)) = cursor else {
                return Ok(None);
            };
            let guard = self.buffer.read_page(PageId::new(self.file_id, page_no))?;
            if pos < node::entry_count(&guard)? {
                let (entry_key, rid) = node::leaf_entry(&guard, pos, self.key_type)?;
                return match compare_keys(&entry_key, key)? {
                    Ordering::Equal => Ok(Some(rid)),
                    _ => Ok(None),
                };
            }
            let next = node::leaf_next(&guard)?;
            drop(guard);
            cursor = (next != NO_PAGE).then_some((next, 0));
        }
    }

    /// Whether the exact `(key, RID)` pair is present. Used by recovery to
    /// make index redo idempotent.
    pub fn contains_pair(&self, key: &Value, rid: Rid) -> BTreeResult<bool> {
        check_key(key, self.key_type)?;
        let _latch = self.latch.read().expect("btree latch poisoned");
        Ok(self.locate_pair(key, rid)?.is_some())
    }

    /// Inserts a `(key, RID)` pair, splitting nodes on overflow and growing
    /// the tree when the root splits.
    pub fn insert(&self, key: &Value, rid: Rid) -> BTreeResult<()> {
        check_key(key, self.key_type)?;
        let key_bytes = encode_key(key, self.key_type)?;
        if key_bytes.len() > MAX_KEY_LEN {
            return Err(BTreeError::KeyTooLarge {
                len: key_bytes.len(),
                max: MAX_KEY_LEN,
            });
        }

        let _latch = self.latch.write().expect("btree latch poisoned");

        if self.unique && self.locate_any(key)?.is_some() {
            return Err(BTreeError::DuplicateKey);
        }

        let meta = *self.meta.lock().expect("btree meta poisoned");
        let split = self.insert_rec(meta.root, meta.height, key, &key_bytes, rid)?;

        if let Some((separator, new_child)) = split {
            // The old root split: a new internal root points at both halves.
            let new_root_no = self.files.allocate(self.file_id)?;
            let page_id = PageId::new(self.file_id, new_root_no);
            let mut guard = self.buffer.allocate_new_page(page_id)?;
            guard.initialize(page_id, PageKind::IndexInternal)?;
            node::set_internal_leftmost(&mut guard, meta.root)?;
            guard.insert_entry_at(0, &node::encode_internal_entry(&separator, new_child))?;
            drop(guard);

            let new_meta = Meta {
                root: new_root_no,
                height: meta.height + 1,
            };
            *self.meta.lock().expect("btree meta poisoned") = new_meta;
            self.write_meta(new_meta)?;
            tracing::debug!(file_id = self.file_id, height = new_meta.height, "tree grew");
        }

        Ok(())
    }

    /// Removes the exact `(key, RID)` pair, rebalancing on underflow and
    /// collapsing the root when it ends up with a single child. Returns
    /// whether the pair existed.
    pub fn delete(&self, key: &Value, rid: Rid) -> BTreeResult<bool> {
        check_key(key, self.key_type)?;
        let _latch = self.latch.write().expect("btree latch poisoned");

        let meta = *self.meta.lock().expect("btree meta poisoned");
        let outcome = self.delete_rec(meta.root, meta.height, key, rid)?;
        let found = matches!(outcome, DeleteOutcome::Removed { .. });

        // Shrink the tree while the root is an internal node with no
        // separators left (a single child).
        let mut meta = *self.meta.lock().expect("btree meta poisoned");
        let mut changed = false;
        while meta.height > 1 {
            let root_guard = self.buffer.read_page(PageId::new(self.file_id, meta.root))?;
            if node::entry_count(&root_guard)? > 0 {
                break;
            }
            let only_child = node::internal_leftmost(&root_guard)?;
            drop(root_guard);
            meta = Meta {
                root: only_child,
                height: meta.height - 1,
            };
            changed = true;
        }
        if changed {
            *self.meta.lock().expect("btree meta poisoned") = meta;
            self.write_meta(meta)?;
            tracing::debug!(file_id = self.file_id, height = meta.height, "tree shrank");
        }

        Ok(found)
    }

    /// Ascending range scan over `[lo, hi]`; either bound may be absent.
    pub fn range(&self, lo: Option<&Value>, hi: Option<&Value>) -> BTreeResult<RangeScan<'_>> {
        if let Some(lo) = lo {
            check_key(lo, self.key_type)?;
        }
        if let Some(hi) = hi {
            check_key(hi, self.key_type)?;
        }

        let latch = self.latch.read().expect("btree latch poisoned");

        let (page_no, pos) = match lo {
            Some(lo) => match self.leaf_position(lo)? {
                Some(found) => found,
                None => (NO_PAGE, 0),
            },
            None => (self.leftmost_leaf()?, 0),
        };

        Ok(RangeScan::new(self, latch, page_no, pos, hi.cloned()))
    }

    pub(crate) fn buffer(&self) -> &BufferManager<FileSet> {
        &self.buffer
    }

    // -----------------------------------------------------------------------
    // Descent helpers
    // -----------------------------------------------------------------------

    /// Leftmost leaf of the tree.
    fn leftmost_leaf(&self) -> BTreeResult<u32> {
        let meta = *self.meta.lock().expect("btree meta poisoned");
        let mut page_no = meta.root;
        for _ in 1..meta.height {
            let guard = self.buffer.read_page(PageId::new(self.file_id, page_no))?;
            page_no = node::internal_leftmost(&guard)?;
        }
        Ok(page_no)
    }

    /// Descends to the leftmost leaf that may contain `key` and returns the
    /// first in-leaf position with an entry `>= key`, following the chain
    /// when the position falls off the end of its leaf. `None` when the key
    /// is past the end of the index.
    fn leaf_position(&self, key: &Value) -> BTreeResult<Option<(u32, u16)>> {
        let meta = *self.meta.lock().expect("btree meta poisoned");
        let mut page_no = meta.root;
        for _ in 1..meta.height {
            let guard = self.buffer.read_page(PageId::new(self.file_id, page_no))?;
            let child_index = node::internal_child_index(&guard, self.key_type, key, false)?;
            page_no = node::child_page_at(&guard, child_index, self.key_type)?;
        }

        let mut current = page_no;
        loop {
            let guard = self.buffer.read_page(PageId::new(self.file_id, current))?;
            let pos = node::leaf_lower_bound(&guard, self.key_type, key, None)?;
            if pos < node::entry_count(&guard)? {
                return Ok(Some((current, pos)));
            }
            let next = node::leaf_next(&guard)?;
            if next == NO_PAGE {
                return Ok(None);
            }
            current = next;
        }
    }

    /// First RID with an equal key, if any.
    fn locate_any(&self, key: &Value) -> BTreeResult<Option<Rid>> {
        let Some((page_no, pos)) = self.leaf_position(key)? else {
            return Ok(None);
        };
        let guard = self.buffer.read_page(PageId::new(self.file_id, page_no))?;
        let (entry_key, rid) = node::leaf_entry(&guard, pos, self.key_type)?;
        Ok((compare_keys(&entry_key, key)? == Ordering::Equal).then_some(rid))
    }

    /// Position of the exact `(key, rid)` pair, walking the equal-key run
    /// across leaves.
    fn locate_pair(&self, key: &Value, rid: Rid) -> BTreeResult<Option<(u32, u16)>> {
        let mut cursor = self.leaf_position(key)?;
        while let Some((page_no, mut pos)) = cursor {
            let guard = self.buffer.read_page(PageId::new(self.file_id, page_no))?;
            let count = node::entry_count(&guard)?;
            while pos < count {
                let (entry_key, entry_rid) = node::leaf_entry(&guard, pos, self.key_type)?;
                match compare_keys(&entry_key, key)? {
                    Ordering::Less => unreachable!("leaf entries are sorted"),
                    Ordering::Greater => return Ok(None),
                    Ordering::Equal if entry_rid == rid => return Ok(Some((page_no, pos))),
                    Ordering::Equal => pos += 1,
                }
            }
            let next = node::leaf_next(&guard)?;
            cursor = (next != NO_PAGE).then_some((next, 0));
        }
        Ok(None)
    }

    // -----------------------------------------------------------------------
    // Insert path
    // -----------------------------------------------------------------------

    /// Recursive insert. Returns the separator and new page when this level
    /// split.
    fn insert_rec(
        &self,
        page_no: u32,
        level: u16,
        key: &Value,
        key_bytes: &[u8],
        rid: Rid,
    ) -> BTreeResult<Option<(Vec<u8>, u32)>> {
        if level == 1 {
            return self.insert_into_leaf(page_no, key, key_bytes, rid);
        }

        let (child_index, child_page) = {
            let guard = self.buffer.read_page(PageId::new(self.file_id, page_no))?;
            let child_index = node::internal_child_index(&guard, self.key_type, key, true)?;
            let child_page = node::child_page_at(&guard, child_index, self.key_type)?;
            (child_index, child_page)
        };

        let Some((separator, new_child)) = self.insert_rec(child_page, level - 1, key, key_bytes, rid)?
        else {
            return Ok(None);
        };

        // The child split; its separator goes right after the child's slot.
        let entry = node::encode_internal_entry(&separator, new_child);
        let mut guard = self.buffer.read_page_mut(PageId::new(self.file_id, page_no))?;
        match guard.insert_entry_at(child_index, &entry) {
            Ok(()) => Ok(None),
            Err(err) if err.is_page_full() => {
                self.split_internal(page_no, guard, &separator, &entry)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn insert_into_leaf(
        &self,
        page_no: u32,
        key: &Value,
        key_bytes: &[u8],
        rid: Rid,
    ) -> BTreeResult<Option<(Vec<u8>, u32)>> {
        let entry = node::encode_leaf_entry(key_bytes, rid);
        let mut guard = self.buffer.read_page_mut(PageId::new(self.file_id, page_no))?;
        let pos = node::leaf_lower_bound(&guard, self.key_type, key, Some(rid))?;
        match guard.insert_entry_at(pos, &entry) {
            Ok(()) => Ok(None),
            Err(err) if err.is_page_full() => self.split_leaf(page_no, guard, key, rid, &entry),
            Err(err) => Err(err.into()),
        }
    }

    /// Splits a full leaf around its byte midpoint, relinks the chain, and
    /// places the pending entry in the correct half.
    fn split_leaf(
        &self,
        left_no: u32,
        mut left: PageWriteGuard<'_>,
        key: &Value,
        rid: Rid,
        pending: &[u8],
    ) -> BTreeResult<Option<(Vec<u8>, u32)>> {
        let count = node::entry_count(&left)?;
        if count < 2 {
            return Err(BTreeError::CorruptIndex(
                "cannot split a leaf with fewer than two entries".to_string(),
            ));
        }
        let mid = self.split_index(&left, count)?;

        // Move the upper half into a fresh right sibling.
        let moved: Vec<Vec<u8>> = (mid..count)
            .map(|idx| left.row(idx).map(|bytes| bytes.to_vec()))
            .collect::<Result<_, _>>()?;
        for _ in mid..count {
            left.remove_entry_at(mid)?;
        }

        let right_no = self.files.allocate(self.file_id)?;
        let right_id = PageId::new(self.file_id, right_no);
        let mut right = self.buffer.allocate_new_page(right_id)?;
        right.initialize(right_id, PageKind::IndexLeaf)?;
        for (idx, entry) in moved.iter().enumerate() {
            right.insert_entry_at(idx as u16, entry)?;
        }

        // Chain: left <-> right <-> old next.
        let old_next = node::leaf_next(&left)?;
        node::set_leaf_prev(&mut right, left_no)?;
        node::set_leaf_next(&mut right, old_next)?;
        node::set_leaf_next(&mut left, right_no)?;
        if old_next != NO_PAGE {
            let mut next_guard = self
                .buffer
                .read_page_mut(PageId::new(self.file_id, old_next))?;
            node::set_leaf_prev(&mut next_guard, right_no)?;
        }

        // Place the pending entry in whichever half owns its position.
        let (right_first_key, right_first_rid) =
            node::decode_leaf_entry(&moved[0], self.key_type)?;
        let goes_right = match compare_keys(key, &right_first_key)? {
            Ordering::Less => false,
            Ordering::Greater => true,
            Ordering::Equal => rid >= right_first_rid,
        };
        if goes_right {
            let pos = node::leaf_lower_bound(&right, self.key_type, key, Some(rid))?;
            right.insert_entry_at(pos, pending)?;
        } else {
            let pos = node::leaf_lower_bound(&left, self.key_type, key, Some(rid))?;
            left.insert_entry_at(pos, pending)?;
        }

        // The separator is the key prefix of the right node's first entry.
        let first = right.row(0)?.to_vec();
        let (_, key_len) = decode_key(&first, self.key_type)?;
        Ok(Some((first[..key_len].to_vec(), right_no)))
    }

    /// Splits a full internal node, promoting its middle separator, and
    /// places the pending entry in the correct half.
    fn split_internal(
        &self,
        _left_no: u32,
        mut left: PageWriteGuard<'_>,
        pending_separator: &[u8],
        pending: &[u8],
    ) -> BTreeResult<Option<(Vec<u8>, u32)>> {
        let count = node::entry_count(&left)?;
        if count < 3 {
            return Err(BTreeError::CorruptIndex(
                "cannot split an internal node with fewer than three entries".to_string(),
            ));
        }
        let mid = self.split_index(&left, count)?.clamp(1, count - 2);

        // Promote entry `mid`: its key climbs to the parent, its child
        // becomes the right node's leftmost.
        let promoted = left.row(mid)?.to_vec();
        let (promoted_key, promoted_key_len) = decode_key(&promoted, self.key_type)?;
        let promoted_child =
            u32::from_be_bytes(promoted[promoted_key_len..].try_into().map_err(|_| {
                BTreeError::CorruptIndex("internal entry missing its child".to_string())
            })?);

        let moved: Vec<Vec<u8>> = (mid + 1..count)
            .map(|idx| left.row(idx).map(|bytes| bytes.to_vec()))
            .collect::<Result<_, _>>()?;
        for _ in mid..count {
            left.remove_entry_at(mid)?;
        }

        let right_no = self.files.allocate(self.file_id)?;
        let right_id = PageId::new(self.file_id, right_no);
        let mut right = self.buffer.allocate_new_page(right_id)?;
        right.initialize(right_id, PageKind::IndexInternal)?;
        node::set_internal_leftmost(&mut right, promoted_child)?;
        for (idx, entry) in moved.iter().enumerate() {
            right.insert_entry_at(idx as u16, entry)?;
        }

        // Route the pending separator entry into the correct half.
        let (pending_key, _) = decode_key(pending_separator, self.key_type)?;
        let target_is_right = compare_keys(&pending_key, &promoted_key)? != Ordering::Less;
        if target_is_right {
            let pos = node::internal_child_index(&right, self.key_type, &pending_key, true)?;
            right.insert_entry_at(pos, pending)?;
        } else {
            let pos = node::internal_child_index(&left, self.key_type, &pending_key, true)?;
            left.insert_entry_at(pos, pending)?;
        }

        Ok(Some((promoted[..promoted_key_len].to_vec(), right_no)))
    }

    /// Entry index at which the cumulative entry+slot bytes cross half of the
    /// node's used space.
    fn split_index(&self, page: &PageWriteGuard<'_>, count: u16) -> BTreeResult<u16> {
        let half = page.used_bytes()? / 2;
        let mut acc = 0usize;
        for idx in 0..count {
            acc += page.row(idx)?.len() + 4;
            if acc >= half {
                return Ok((idx + 1).clamp(1, count - 1));
            }
        }
        Ok(count / 2)
    }

    // -----------------------------------------------------------------------
    // Delete path
    // -----------------------------------------------------------------------

    fn delete_rec(
        &self,
        page_no: u32,
        level: u16,
        key: &Value,
        rid: Rid,
    ) -> BTreeResult<DeleteOutcome> {
        if level == 1 {
            return self.delete_from_leaf(page_no, key, rid);
        }

        // Duplicates may straddle children whose separators equal the key;
        // probe every candidate child from the ties-left to the ties-right
        // descent target.
        let (lo, hi) = {
            let guard = self.buffer.read_page(PageId::new(self.file_id, page_no))?;
            let lo = node::internal_child_index(&guard, self.key_type, key, false)?;
            let hi = node::internal_child_index(&guard, self.key_type, key, true)?;
            (lo, hi)
        };

        for child_index in lo..=hi {
            let child_page = {
                let guard = self.buffer.read_page(PageId::new(self.file_id, page_no))?;
                node::child_page_at(&guard, child_index, self.key_type)?
            };

            match self.delete_rec(child_page, level - 1, key, rid)? {
                DeleteOutcome::NotFound => continue,
                DeleteOutcome::Removed { underflow } => {
                    if underflow {
                        self.rebalance_child(page_no, child_index, level)?;
                    }
                    let guard = self.buffer.read_page(PageId::new(self.file_id, page_no))?;
                    let own_underflow = guard.used_bytes()? < guard.entry_capacity()? / 2;
                    return Ok(DeleteOutcome::Removed {
                        underflow: own_underflow,
                    });
                }
            }
        }

        Ok(DeleteOutcome::NotFound)
    }

    fn delete_from_leaf(&self, page_no: u32, key: &Value, rid: Rid) -> BTreeResult<DeleteOutcome> {
        let mut guard = self.buffer.read_page_mut(PageId::new(self.file_id, page_no))?;
        let pos = node::leaf_lower_bound(&guard, self.key_type, key, Some(rid))?;
        if pos >= node::entry_count(&guard)? {
            return Ok(DeleteOutcome::NotFound);
        }
        let (entry_key, entry_rid) = node::leaf_entry(&guard, pos, self.key_type)?;
        if compare_keys(&entry_key, key)? != Ordering::Equal || entry_rid != rid {
            return Ok(DeleteOutcome::NotFound);
        }

        guard.remove_entry_at(pos)?;
        let underflow = guard.used_bytes()? < guard.entry_capacity()? / 2;
        Ok(DeleteOutcome::Removed { underflow })
    }

    /// Restores the fill rule for the child at `child_index`: merge with a
    /// sibling when both fit in one node, borrow one entry otherwise.
    fn rebalance_child(&self, parent_no: u32, child_index: u16, level: u16) -> BTreeResult<()> {
        let children_are_leaves = level == 2;

        let parent_id = PageId::new(self.file_id, parent_no);
        let left_index = {
            let guard = self.buffer.read_page(parent_id)?;
            if node::entry_count(&guard)? == 0 {
                // Single child; nothing to rebalance against. Root collapse
                // handles this case.
                return Ok(());
            }
            if child_index > 0 { child_index - 1 } else { 0 }
        };
        let separator_idx = left_index;

        let (left_no, right_no) = {
            let guard = self.buffer.read_page(parent_id)?;
            (
                node::child_page_at(&guard, left_index, self.key_type)?,
                node::child_page_at(&guard, left_index + 1, self.key_type)?,
            )
        };

        let (left_used, right_used) = {
            let left = self.buffer.read_page(PageId::new(self.file_id, left_no))?;
            let right = self.buffer.read_page(PageId::new(self.file_id, right_no))?;
            (left.used_bytes()?, right.used_bytes()?)
        };

        if children_are_leaves {
            if left_used + right_used <= NODE_CAPACITY {
                self.merge_leaves(parent_no, separator_idx, left_no, right_no)
            } else if left_used < right_used {
                self.borrow_leaf_from_right(parent_no, separator_idx, left_no, right_no)
            } else {
                self.borrow_leaf_from_left(parent_no, separator_idx, left_no, right_no)
            }
        } else {
            let separator_len = {
                let guard = self.buffer.read_page(parent_id)?;
                guard.row(separator_idx)?.len()
            };
            if left_used + right_used + separator_len + 4 <= NODE_CAPACITY {
                self.merge_internals(parent_no, separator_idx, left_no, right_no)
            } else if left_used < right_used {
                self.borrow_internal_from_right(parent_no, separator_idx, left_no, right_no)
            } else {
                self.borrow_internal_from_left(parent_no, separator_idx, left_no, right_no)
            }
        }
    }

    /// Moves every entry of the right leaf into the left one and drops the
    /// separator. The right page is left orphaned; pages are only reclaimed
    /// when the index file is dropped.
    fn merge_leaves(
        &self,
        parent_no: u32,
        separator_idx: u16,
        left_no: u32,
        right_no: u32,
    ) -> BTreeResult<()> {
        let (moved, right_next) = {
            let right = self.buffer.read_page(PageId::new(self.file_id, right_no))?;
            let count = node::entry_count(&right)?;
            let moved: Vec<Vec<u8>> = (0..count)
                .map(|idx| right.row(idx).map(|bytes| bytes.to_vec()))
                .collect::<Result<_, _>>()?;
            (moved, node::leaf_next(&right)?)
        };

        {
            let mut left = self.buffer.read_page_mut(PageId::new(self.file_id, left_no))?;
            let mut insert_at = node::entry_count(&left)?;
            for entry in &moved {
                left.insert_entry_at(insert_at, entry)?;
                insert_at += 1;
            }
            node::set_leaf_next(&mut left, right_next)?;
        }
        if right_next != NO_PAGE {
            let mut next = self
                .buffer
                .read_page_mut(PageId::new(self.file_id, right_next))?;
            node::set_leaf_prev(&mut next, left_no)?;
        }

        let mut parent = self.buffer.read_page_mut(PageId::new(self.file_id, parent_no))?;
        parent.remove_entry_at(separator_idx)?;
        Ok(())
    }

    fn borrow_leaf_from_right(
        &self,
        parent_no: u32,
        separator_idx: u16,
        left_no: u32,
        right_no: u32,
    ) -> BTreeResult<()> {
        let (entry, new_first) = {
            let mut right = self.buffer.read_page_mut(PageId::new(self.file_id, right_no))?;
            let entry = right.row(0)?.to_vec();
            right.remove_entry_at(0)?;
            (entry, right.row(0)?.to_vec())
        };

        {
            let mut left = self.buffer.read_page_mut(PageId::new(self.file_id, left_no))?;
            let insert_at = node::entry_count(&left)?;
            left.insert_entry_at(insert_at, &entry)?;
        }

        let (_, key_len) = decode_key(&new_first, self.key_type)?;
        self.replace_separator(parent_no, separator_idx, &new_first[..key_len], right_no)
    }

    fn borrow_leaf_from_left(
        &self,
        parent_no: u32,
        separator_idx: u16,
        left_no: u32,
        right_no: u32,
    ) -> BTreeResult<()> {
        let entry = {
            let mut left = self.buffer.read_page_mut(PageId::new(self.file_id, left_no))?;
            let last = node::entry_count(&left)? - 1;
            let entry = left.row(last)?.to_vec();
            left.remove_entry_at(last)?;
            entry
        };

        {
            let mut right = self.buffer.read_page_mut(PageId::new(self.file_id, right_no))?;
            right.insert_entry_at(0, &entry)?;
        }

        let (_, key_len) = decode_key(&entry, self.key_type)?;
        self.replace_separator(parent_no, separator_idx, &entry[..key_len], right_no)
    }

    /// Pulls the parent separator down between the two internal children and
    /// appends the right node behind it.
    fn merge_internals(
        &self,
        parent_no: u32,
        separator_idx: u16,
        left_no: u32,
        right_no: u32,
    ) -> BTreeResult<()> {
        let separator_key = {
            let parent = self.buffer.read_page(PageId::new(self.file_id, parent_no))?;
            let entry = parent.row(separator_idx)?.to_vec();
            let (_, key_len) = decode_key(&entry, self.key_type)?;
            entry[..key_len].to_vec()
        };

        let (right_leftmost, moved) = {
            let right = self.buffer.read_page(PageId::new(self.file_id, right_no))?;
            let count = node::entry_count(&right)?;
            let moved: Vec<Vec<u8>> = (0..count)
                .map(|idx| right.row(idx).map(|bytes| bytes.to_vec()))
                .collect::<Result<_, _>>()?;
            (node::internal_leftmost(&right)?, moved)
        };

        {
            let mut left = self.buffer.read_page_mut(PageId::new(self.file_id, left_no))?;
            let mut insert_at = node::entry_count(&left)?;
            left.insert_entry_at(
                insert_at,
                &node::encode_internal_entry(&separator_key, right_leftmost),
            )?;
            insert_at += 1;
            for entry in &moved {
                left.insert_entry_at(insert_at, entry)?;
                insert_at += 1;
            }
        }

        let mut parent = self.buffer.read_page_mut(PageId::new(self.file_id, parent_no))?;
        parent.remove_entry_at(separator_idx)?;
        Ok(())
    }

    fn borrow_internal_from_right(
        &self,
        parent_no: u32,
        separator_idx: u16,
        left_no: u32,
        right_no: u32,
    ) -> BTreeResult<()> {
        let separator_key = {
            let parent = self.buffer.read_page(PageId::new(self.file_id, parent_no))?;
            let entry = parent.row(separator_idx)?.to_vec();
            let (_, key_len) = decode_key(&entry, self.key_type)?;
            entry[..key_len].to_vec()
        };

        // Rotate left: separator comes down over the right node's leftmost
        // child, the right node's first key climbs up.
        let (right_leftmost, first_entry) = {
            let right = self.buffer.read_page(PageId::new(self.file_id, right_no))?;
            (node::internal_leftmost(&right)?, right.row(0)?.to_vec())
        };
        let (_, first_key_len) = decode_key(&first_entry, self.key_type)?;
        let first_child =
            u32::from_be_bytes(first_entry[first_key_len..].try_into().map_err(|_| {
                BTreeError::CorruptIndex("internal entry missing its child".to_string())
            })?);

        {
            let mut left = self.buffer.read_page_mut(PageId::new(self.file_id, left_no))?;
            let insert_at = node::entry_count(&left)?;
            left.insert_entry_at(
                insert_at,
                &node::encode_internal_entry(&separator_key, right_leftmost),
            )?;
        }
        {
            let mut right = self.buffer.read_page_mut(PageId::new(self.file_id, right_no))?;
            node::set_internal_leftmost(&mut right, first_child)?;
            right.remove_entry_at(0)?;
        }

        self.replace_separator(
            parent_no,
            separator_idx,
            &first_entry[..first_key_len],
            right_no,
        )
    }

    fn borrow_internal_from_left(
        &self,
        parent_no: u32,
        separator_idx: u16,
        left_no: u32,
        right_no: u32,
    ) -> BTreeResult<()> {
        let separator_key = {
            let parent = self.buffer.read_page(PageId::new(self.file_id, parent_no))?;
            let entry = parent.row(separator_idx)?.to_vec();
            let (_, key_len) = decode_key(&entry, self.key_type)?;
            entry[..key_len].to_vec()
        };

        // Rotate right: the left node's last entry climbs up, the separator
        // comes down over the right node's old leftmost child.
        let last_entry = {
            let mut left = self.buffer.read_page_mut(PageId::new(self.file_id, left_no))?;
            let last = node::entry_count(&left)? - 1;
            let entry = left.row(last)?.to_vec();
            left.remove_entry_at(last)?;
            entry
        };
        let (_, last_key_len) = decode_key(&last_entry, self.key_type)?;
        let last_child =
            u32::from_be_bytes(last_entry[last_key_len..].try_into().map_err(|_| {
                BTreeError::CorruptIndex("internal entry missing its child".to_string())
            })?);

        {
            let mut right = self.buffer.read_page_mut(PageId::new(self.file_id, right_no))?;
            let old_leftmost = node::internal_leftmost(&right)?;
            right.insert_entry_at(
                0,
                &node::encode_internal_entry(&separator_key, old_leftmost),
            )?;
            node::set_internal_leftmost(&mut right, last_child)?;
        }

        self.replace_separator(parent_no, separator_idx, &last_entry[..last_key_len], right_no)
    }

    /// Swaps the separator key at `separator_idx`, keeping its child pointer.
    fn replace_separator(
        &self,
        parent_no: u32,
        separator_idx: u16,
        new_key: &[u8],
        child: u32,
    ) -> BTreeResult<()> {
        let mut parent = self.buffer.read_page_mut(PageId::new(self.file_id, parent_no))?;
        parent.remove_entry_at(separator_idx)?;
        parent.insert_entry_at(separator_idx, &node::encode_internal_entry(new_key, child))?;
        Ok(())
    }

    /// Persists root/type/unique/height to the header page.
    fn write_meta(&self, meta: Meta) -> BTreeResult<()> {
        let pager = self.files.pager(self.file_id)?;
        let mut page0 = pager.read(0)?;
        let at = HEADER_PAGE_PAYLOAD_OFFSET;
        page0[at..at + 4].copy_from_slice(&meta.root.to_be_bytes());
        page0[at + 4] = u8::from(self.key_type);
        page0[at + 5] = u8::from(self.unique);
        page0[at + 6..at + 8].copy_from_slice(&meta.height.to_be_bytes());
        pager.write(0, &mut page0)?;
        Ok(())
    }
}
