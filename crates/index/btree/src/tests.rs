//! Workload tests: randomized insert/delete sequences with structural
//! invariant checks, plus the concrete scenarios the engine relies on.

use crate::btree::BTree;
use crate::key::compare_keys;
use crate::node::{self, NO_PAGE};
use buffer::BufferManager;
use page::page_id::PageId;
use page::rid::Rid;
use pager::FileSet;
use record::{TypeTag, Value};
use std::cmp::Ordering;
use std::sync::Arc;
use tempfile::tempdir;

fn setup(unique: bool) -> (tempfile::TempDir, Arc<FileSet>, Arc<BufferManager<FileSet>>, BTree) {
    let dir = tempdir().unwrap();
    let files = Arc::new(FileSet::new());
    files.add_file(1, dir.path().join("ix.idx"));
    let buffer = Arc::new(BufferManager::new(Arc::clone(&files), 64));
    let tree = BTree::create(
        Arc::clone(&files),
        Arc::clone(&buffer),
        1,
        TypeTag::Int,
        unique,
    )
    .unwrap();
    (dir, files, buffer, tree)
}

fn rid_for(i: i32) -> Rid {
    Rid::new(1 + (i as u32 / 100), (i % 100) as u16)
}

/// Walks the leaf chain and asserts keys are non-decreasing, with RIDs
/// breaking ties, and that sibling pointers are mutually consistent.
fn assert_leaf_chain_sorted(tree: &BTree) -> usize {
    let buffer = tree.buffer();
    let mut seen = 0usize;
    let mut previous: Option<(Value, Rid)> = None;

    let mut scan = tree.range(None, None).unwrap();
    for item in &mut scan {
        let (key, rid) = item.unwrap();
        if let Some((prev_key, prev_rid)) = &previous {
            match compare_keys(prev_key, &key).unwrap() {
                Ordering::Less => {}
                Ordering::Equal => assert!(prev_rid < &rid, "duplicate pair out of order"),
                Ordering::Greater => panic!("keys out of order in leaf chain"),
            }
        }
        previous = Some((key, rid));
        seen += 1;
    }
    drop(scan);

    // Sibling pointers: forward and backward walks agree.
    let mut forward = Vec::new();
    let mut page_no = leftmost_leaf(tree);
    while page_no != NO_PAGE {
        forward.push(page_no);
        let guard = buffer.read_page(PageId::new(tree.file_id(), page_no)).unwrap();
        page_no = node::leaf_next(&guard).unwrap();
    }
    for pair in forward.windows(2) {
        let right = buffer.read_page(PageId::new(tree.file_id(), pair[1])).unwrap();
        assert_eq!(node::leaf_prev(&right).unwrap(), pair[0]);
    }

    seen
}

fn leftmost_leaf(tree: &BTree) -> u32 {
    let buffer = tree.buffer();
    let mut current = tree.root_page();
    for _ in 1..tree.height() {
        let guard = buffer
            .read_page(PageId::new(tree.file_id(), current))
            .unwrap();
        current = node::internal_leftmost(&guard).unwrap();
    }
    current
}

#[test]
fn empty_tree_finds_nothing() {
    let (_dir, _files, _buffer, tree) = setup(false);
    assert_eq!(tree.search(&Value::Int(1)).unwrap(), None);
    assert!(!tree.delete(&Value::Int(1), Rid::new(1, 0)).unwrap());
    assert_eq!(tree.range(None, None).unwrap().count(), 0);
}

#[test]
fn single_leaf_insert_and_search() {
    let (_dir, _files, _buffer, tree) = setup(false);
    for i in [5, 1, 9, 3, 7] {
        tree.insert(&Value::Int(i), rid_for(i)).unwrap();
    }
    assert_eq!(tree.search(&Value::Int(3)).unwrap(), Some(rid_for(3)));
    assert_eq!(tree.search(&Value::Int(4)).unwrap(), None);
    assert_eq!(assert_leaf_chain_sorted(&tree), 5);
    assert_eq!(tree.height(), 1);
}

#[test]
fn thousand_inserts_split_and_stay_sorted() {
    let (_dir, _files, _buffer, tree) = setup(false);
    // Insert in a scrambled order to exercise splits on both edges.
    for i in 0..1000 {
        let key = (i * 613) % 1000;
        tree.insert(&Value::Int(key), rid_for(key)).unwrap();
    }
    assert_eq!(assert_leaf_chain_sorted(&tree), 1000);
    assert!(tree.height() > 1, "1000 int keys must overflow one leaf");

    for probe in [0, 1, 499, 998, 999] {
        assert_eq!(
            tree.search(&Value::Int(probe)).unwrap(),
            Some(rid_for(probe)),
            "probe {probe}"
        );
    }
}

#[test]
fn range_scan_returns_inclusive_bounds() {
    let (_dir, _files, _buffer, tree) = setup(false);
    for i in 1..=1000 {
        tree.insert(&Value::Int(i), rid_for(i)).unwrap();
    }

    let keys: Vec<i32> = tree
        .range(Some(&Value::Int(100)), Some(&Value::Int(105)))
        .unwrap()
        .map(|item| match item.unwrap().0 {
            Value::Int(k) => k,
            other => panic!("unexpected key {other}"),
        })
        .collect();
    assert_eq!(keys, vec![100, 101, 102, 103, 104, 105]);
}

#[test]
fn range_scan_unbounded_ends() {
    let (_dir, _files, _buffer, tree) = setup(false);
    for i in 1..=50 {
        tree.insert(&Value::Int(i), rid_for(i)).unwrap();
    }

    assert_eq!(tree.range(None, Some(&Value::Int(10))).unwrap().count(), 10);
    assert_eq!(tree.range(Some(&Value::Int(41)), None).unwrap().count(), 10);
    assert_eq!(tree.range(None, None).unwrap().count(), 50);
}

#[test]
fn duplicate_keys_coexist_and_delete_by_pair() {
    let (_dir, _files, _buffer, tree) = setup(false);
    let key = Value::Int(7);
    let rids = [Rid::new(1, 0), Rid::new(1, 1), Rid::new(2, 0)];
    for rid in rids {
        tree.insert(&key, rid).unwrap();
    }
    for i in 0..200 {
        tree.insert(&Value::Int(1000 + i), rid_for(i)).unwrap();
    }

    assert!(tree.contains_pair(&key, rids[1]).unwrap());
    assert!(tree.delete(&key, rids[1]).unwrap());
    assert!(!tree.contains_pair(&key, rids[1]).unwrap());
    assert!(tree.contains_pair(&key, rids[0]).unwrap());
    assert!(tree.contains_pair(&key, rids[2]).unwrap());

    // Deleting a pair that never existed reports false.
    assert!(!tree.delete(&key, Rid::new(9, 9)).unwrap());
}

#[test]
fn unique_index_rejects_duplicate_key() {
    let (_dir, _files, _buffer, tree) = setup(true);
    tree.insert(&Value::Int(1), Rid::new(1, 0)).unwrap();
    assert!(matches!(
        tree.insert(&Value::Int(1), Rid::new(1, 1)),
        Err(crate::errors::BTreeError::DuplicateKey)
    ));
    // A different key is fine.
    tree.insert(&Value::Int(2), Rid::new(1, 1)).unwrap();
}

#[test]
fn delete_everything_shrinks_tree_back() {
    let (_dir, _files, _buffer, tree) = setup(false);
    for i in 0..800 {
        tree.insert(&Value::Int(i), rid_for(i)).unwrap();
    }
    let grown_height = tree.height();
    assert!(grown_height > 1);

    for i in 0..800 {
        assert!(tree.delete(&Value::Int(i), rid_for(i)).unwrap(), "key {i}");
    }
    assert_eq!(assert_leaf_chain_sorted(&tree), 0);
    assert_eq!(tree.height(), 1, "empty tree must collapse to a lone leaf");
    assert_eq!(tree.search(&Value::Int(5)).unwrap(), None);
}

#[test]
fn random_insert_delete_workload_preserves_order() {
    let (_dir, _files, _buffer, tree) = setup(false);
    let mut expected: std::collections::BTreeSet<(i32, Rid)> = Default::default();

    let mut state = 0x2545F4914F6CDD1Du64;
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    for _ in 0..3000 {
        let key = (next() % 500) as i32;
        let rid = Rid::new(1, (next() % 32) as u16);
        if next() % 3 == 0 {
            let existed = expected.remove(&(key, rid));
            assert_eq!(tree.delete(&Value::Int(key), rid).unwrap(), existed);
        } else if expected.insert((key, rid)) {
            tree.insert(&Value::Int(key), rid).unwrap();
        }
    }

    let live = assert_leaf_chain_sorted(&tree);
    assert_eq!(live, expected.len());
    for (key, rid) in &expected {
        assert!(tree.contains_pair(&Value::Int(*key), *rid).unwrap());
    }
}

#[test]
fn tree_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let files = Arc::new(FileSet::new());
    files.add_file(1, dir.path().join("ix.idx"));
    let buffer = Arc::new(BufferManager::new(Arc::clone(&files), 64));

    {
        let tree = BTree::create(
            Arc::clone(&files),
            Arc::clone(&buffer),
            1,
            TypeTag::Int,
            false,
        )
        .unwrap();
        for i in 0..500 {
            tree.insert(&Value::Int(i), rid_for(i)).unwrap();
        }
        buffer.flush_dirty().unwrap();
        files.flush_all().unwrap();
    }

    let buffer2 = Arc::new(BufferManager::new(Arc::clone(&files), 64));
    let tree = BTree::open(files, buffer2, 1).unwrap();
    assert_eq!(tree.key_type(), TypeTag::Int);
    assert_eq!(assert_leaf_chain_sorted(&tree), 500);
    assert_eq!(tree.search(&Value::Int(123)).unwrap(), Some(rid_for(123)));
}

#[test]
fn string_keys_sort_byte_lexicographically() {
    let dir = tempdir().unwrap();
    let files = Arc::new(FileSet::new());
    files.add_file(1, dir.path().join("ix.idx"));
    let buffer = Arc::new(BufferManager::new(Arc::clone(&files), 64));
    let tree = BTree::create(files, buffer, 1, TypeTag::Str, false).unwrap();

    for name in ["pear", "apple", "Apple", "banana"] {
        tree.insert(&Value::Str(name.into()), Rid::new(1, 0)).unwrap();
    }

    let keys: Vec<String> = tree
        .range(None, None)
        .unwrap()
        .map(|item| match item.unwrap().0 {
            Value::Str(s) => s,
            other => panic!("unexpected key {other}"),
        })
        .collect();
    assert_eq!(keys, vec!["Apple", "apple", "banana", "pear"]);
}

#[test]
fn key_type_mismatch_is_rejected() {
    let (_dir, _files, _buffer, tree) = setup(false);
    assert!(matches!(
        tree.insert(&Value::Str("1".into()), Rid::new(1, 0)),
        Err(crate::errors::BTreeError::KeyTypeMismatch { .. })
    ));
    assert!(matches!(
        tree.search(&Value::Null),
        Err(crate::errors::BTreeError::KeyTypeMismatch { .. })
    ));
}
