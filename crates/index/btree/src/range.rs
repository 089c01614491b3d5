//! Lazy ascending range scans over the leaf chain.

use crate::btree::BTree;
use crate::errors::BTreeResult;
use crate::key::compare_keys;
use crate::node::{self, NO_PAGE};
use page::page_id::PageId;
use page::rid::Rid;
use record::Value;
use std::cmp::Ordering;
use std::sync::RwLockReadGuard;

/// Pull-based iterator over `(key, RID)` pairs in ascending key order.
///
/// The scan holds the tree latch shared for its lifetime, so structure
/// mutations wait until it is dropped; leaf pages are only latched for the
/// duration of a single `next` call. Restart a scan by asking the tree for a
/// new one.
#[derive(Debug)]
pub struct RangeScan<'a> {
    tree: &'a BTree,
    _latch: RwLockReadGuard<'a, ()>,
    /// Current leaf, [`NO_PAGE`] when exhausted.
    page_no: u32,
    /// Next slot to yield within the current leaf.
    pos: u16,
    /// Inclusive upper bound, unbounded when absent.
    hi: Option<Value>,
    closed: bool,
}

impl<'a> RangeScan<'a> {
    pub(crate) fn new(
        tree: &'a BTree,
        latch: RwLockReadGuard<'a, ()>,
        page_no: u32,
        pos: u16,
        hi: Option<Value>,
    ) -> Self {
        Self {
            tree,
            _latch: latch,
            page_no,
            pos,
            hi,
            closed: false,
        }
    }

    /// Stops the scan; subsequent `next` calls return `None`.
    pub fn close(&mut self) {
        self.closed = true;
    }

    fn step(&mut self) -> BTreeResult<Option<(Value, Rid)>> {
        loop {
            if self.page_no == NO_PAGE {
                return Ok(None);
            }

            let guard = self
                .tree
                .buffer()
                .read_page(PageId::new(self.tree.file_id(), self.page_no))?;

            if self.pos < node::entry_count(&guard)? {
                let (key, rid) = node::leaf_entry(&guard, self.pos, self.tree.key_type())?;
                if let Some(hi) = &self.hi
                    && compare_keys(&key, hi)? == Ordering::Greater
                {
                    self.page_no = NO_PAGE;
                    return Ok(None);
                }
                self.pos += 1;
                return Ok(Some((key, rid)));
            }

            self.page_no = node::leaf_next(&guard)?;
            self.pos = 0;
        }
    }
}

impl Iterator for RangeScan<'_> {
    type Item = BTreeResult<(Value, Rid)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        match self.step() {
            Ok(Some(pair)) => Some(Ok(pair)),
            Ok(None) => {
                self.closed = true;
                None
            }
            Err(err) => {
                self.closed = true;
                Some(Err(err))
            }
        }
    }
}
