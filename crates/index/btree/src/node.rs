//! Helpers for reading and writing B-Tree node pages.
//!
//! Nodes reuse the slotted-page carrier with entries kept sorted by slot
//! position. Leaves pair each key with a 6-byte RID and link to their
//! siblings through the special tail; internal nodes pair each key with the
//! child holding keys `>=` that key, and keep the child left of every key in
//! the special tail.

use crate::errors::{BTreeError, BTreeResult};
use crate::key::{compare_keys, decode_key};
use binary_helpers::be::{read_be, write_be};
use page::Page;
use page::page_kind::FLAG_INDEX_LEAF;
use page::rid::{RID_LEN, Rid};
use record::{TypeTag, Value};
use std::cmp::Ordering;

/// Sentinel for "no sibling / no child": page 0 is always the file header,
/// never a node.
pub const NO_PAGE: u32 = 0;

/// Whether this node page is a leaf (header flags bit 0).
pub fn is_leaf(page: &Page) -> BTreeResult<bool> {
    Ok(page.flags()? & FLAG_INDEX_LEAF != 0)
}

/// Number of entries in the node.
pub fn entry_count(page: &Page) -> BTreeResult<u16> {
    Ok(page.slot_count()?)
}

// ---------------------------------------------------------------------------
// Special tail accessors
// ---------------------------------------------------------------------------

fn special_u32(page: &Page, at: usize) -> BTreeResult<u32> {
    let special = page.special()?;
    read_be::<u32>(special, at).map_err(|_| corrupt("special tail too short"))
}

fn set_special_u32(page: &mut Page, at: usize, value: u32) -> BTreeResult<()> {
    let special = page.special_mut()?;
    write_be::<u32>(special, at, value).map_err(|_| corrupt("special tail too short"))
}

/// Previous leaf in the chain, [`NO_PAGE`] for the first leaf.
pub fn leaf_prev(page: &Page) -> BTreeResult<u32> {
    special_u32(page, 0)
}

/// Next leaf in the chain, [`NO_PAGE`] for the last leaf.
pub fn leaf_next(page: &Page) -> BTreeResult<u32> {
    special_u32(page, 4)
}

pub fn set_leaf_prev(page: &mut Page, page_no: u32) -> BTreeResult<()> {
    set_special_u32(page, 0, page_no)
}

pub fn set_leaf_next(page: &mut Page, page_no: u32) -> BTreeResult<()> {
    set_special_u32(page, 4, page_no)
}

/// Child holding keys smaller than every key in an internal node.
pub fn internal_leftmost(page: &Page) -> BTreeResult<u32> {
    special_u32(page, 0)
}

pub fn set_internal_leftmost(page: &mut Page, page_no: u32) -> BTreeResult<()> {
    set_special_u32(page, 0, page_no)
}

// ---------------------------------------------------------------------------
// Entry encode/decode
// ---------------------------------------------------------------------------

pub fn encode_leaf_entry(key_bytes: &[u8], rid: Rid) -> Vec<u8> {
    let mut entry = Vec::with_capacity(key_bytes.len() + RID_LEN);
    entry.extend_from_slice(key_bytes);
    entry.extend_from_slice(&rid.to_bytes());
    entry
}

pub fn decode_leaf_entry(bytes: &[u8], tag: TypeTag) -> BTreeResult<(Value, Rid)> {
    let (key, used) = decode_key(bytes, tag)?;
    let rid =
        Rid::from_bytes(&bytes[used..]).map_err(|_| corrupt("leaf entry missing its RID"))?;
    Ok((key, rid))
}

pub fn encode_internal_entry(key_bytes: &[u8], child: u32) -> Vec<u8> {
    let mut entry = Vec::with_capacity(key_bytes.len() + 4);
    entry.extend_from_slice(key_bytes);
    entry.extend_from_slice(&child.to_be_bytes());
    entry
}

pub fn decode_internal_entry(bytes: &[u8], tag: TypeTag) -> BTreeResult<(Value, u32)> {
    let (key, used) = decode_key(bytes, tag)?;
    let child =
        read_be::<u32>(bytes, used).map_err(|_| corrupt("internal entry missing its child"))?;
    Ok((key, child))
}

/// Reads and decodes leaf entry `idx`.
pub fn leaf_entry(page: &Page, idx: u16, tag: TypeTag) -> BTreeResult<(Value, Rid)> {
    decode_leaf_entry(page.row(idx)?, tag)
}

/// Reads and decodes internal entry `idx`.
pub fn internal_entry(page: &Page, idx: u16, tag: TypeTag) -> BTreeResult<(Value, u32)> {
    decode_internal_entry(page.row(idx)?, tag)
}

// ---------------------------------------------------------------------------
// Position searches
// ---------------------------------------------------------------------------

/// First slot whose `(key, rid)` is `>=` the probe. With `rid = None` the
/// probe behaves as `(key, smallest possible RID)`, landing on the first
/// entry of an equal-key run.
pub fn leaf_lower_bound(
    page: &Page,
    tag: TypeTag,
    key: &Value,
    rid: Option<Rid>,
) -> BTreeResult<u16> {
    let count = entry_count(page)?;
    let mut lo = 0u16;
    let mut hi = count;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let (entry_key, entry_rid) = leaf_entry(page, mid, tag)?;
        let ordering = match compare_keys(&entry_key, key)? {
            Ordering::Equal => match rid {
                Some(probe_rid) => entry_rid.cmp(&probe_rid),
                None => Ordering::Greater,
            },
            other => other,
        };
        if ordering == Ordering::Less {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

/// Index of the child to follow for `key` in an internal node, counting the
/// leftmost child as 0 and entry `i`'s child as `i + 1`.
///
/// With `ties_right` the descent follows the last separator `<= key`
/// (inserts route duplicates right); without it, the last separator `< key`
/// (searches start at the leftmost leaf that may hold the key).
pub fn internal_child_index(
    page: &Page,
    tag: TypeTag,
    key: &Value,
    ties_right: bool,
) -> BTreeResult<u16> {
    let count = entry_count(page)?;
    let mut lo = 0u16;
    let mut hi = count;
    // Binary search for the number of separators the probe passes.
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let (separator, _) = internal_entry(page, mid, tag)?;
        let passes = match compare_keys(&separator, key)? {
            Ordering::Less => true,
            Ordering::Equal => ties_right,
            Ordering::Greater => false,
        };
        if passes {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

/// Page number of the child at `child_index` (0 = leftmost).
pub fn child_page_at(page: &Page, child_index: u16, tag: TypeTag) -> BTreeResult<u32> {
    if child_index == 0 {
        internal_leftmost(page)
    } else {
        Ok(internal_entry(page, child_index - 1, tag)?.1)
    }
}

/// Rewrites the child pointer at `child_index`, keeping its separator.
pub fn set_child_page_at(page: &mut Page, child_index: u16, child: u32) -> BTreeResult<()> {
    if child_index == 0 {
        return set_internal_leftmost(page, child);
    }
    let entry_idx = child_index - 1;
    let mut rewritten = page.row(entry_idx)?.to_vec();
    let key_len = rewritten.len() - 4;
    rewritten[key_len..].copy_from_slice(&child.to_be_bytes());
    page.update_row(entry_idx, &rewritten)?;
    Ok(())
}

fn corrupt(message: &str) -> BTreeError {
    BTreeError::CorruptIndex(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::encode_key;
    use page::page_id::PageId;
    use page::page_kind::PageKind;

    fn leaf_with_keys(keys: &[(i32, Rid)]) -> Page {
        let mut page = Page::new_zeroed(PageId::new(1, 1));
        page.initialize(PageId::new(1, 1), PageKind::IndexLeaf)
            .unwrap();
        for (idx, (key, rid)) in keys.iter().enumerate() {
            let key_bytes = encode_key(&Value::Int(*key), TypeTag::Int).unwrap();
            let entry = encode_leaf_entry(&key_bytes, *rid);
            page.insert_entry_at(idx as u16, &entry).unwrap();
        }
        page
    }

    #[test]
    fn sibling_pointers_round_trip() {
        let mut page = leaf_with_keys(&[]);
        assert_eq!(leaf_prev(&page).unwrap(), NO_PAGE);
        assert_eq!(leaf_next(&page).unwrap(), NO_PAGE);

        set_leaf_prev(&mut page, 7).unwrap();
        set_leaf_next(&mut page, 9).unwrap();
        assert_eq!(leaf_prev(&page).unwrap(), 7);
        assert_eq!(leaf_next(&page).unwrap(), 9);
    }

    #[test]
    fn leaf_entries_decode_back() {
        let rid = Rid::new(3, 1);
        let page = leaf_with_keys(&[(10, rid)]);
        let (key, decoded_rid) = leaf_entry(&page, 0, TypeTag::Int).unwrap();
        assert_eq!(key, Value::Int(10));
        assert_eq!(decoded_rid, rid);
    }

    #[test]
    fn lower_bound_without_rid_lands_on_first_duplicate() {
        let page = leaf_with_keys(&[
            (5, Rid::new(1, 0)),
            (7, Rid::new(1, 1)),
            (7, Rid::new(1, 2)),
            (9, Rid::new(1, 3)),
        ]);
        assert_eq!(
            leaf_lower_bound(&page, TypeTag::Int, &Value::Int(7), None).unwrap(),
            1
        );
        assert_eq!(
            leaf_lower_bound(&page, TypeTag::Int, &Value::Int(6), None).unwrap(),
            1
        );
        assert_eq!(
            leaf_lower_bound(&page, TypeTag::Int, &Value::Int(10), None).unwrap(),
            4
        );
    }

    #[test]
    fn lower_bound_with_rid_disambiguates_duplicates() {
        let page = leaf_with_keys(&[
            (7, Rid::new(1, 1)),
            (7, Rid::new(1, 5)),
            (7, Rid::new(2, 0)),
        ]);
        assert_eq!(
            leaf_lower_bound(&page, TypeTag::Int, &Value::Int(7), Some(Rid::new(1, 5))).unwrap(),
            1
        );
        assert_eq!(
            leaf_lower_bound(&page, TypeTag::Int, &Value::Int(7), Some(Rid::new(3, 0))).unwrap(),
            3
        );
    }

    #[test]
    fn internal_child_index_tie_handling() {
        let mut page = Page::new_zeroed(PageId::new(1, 2));
        page.initialize(PageId::new(1, 2), PageKind::IndexInternal)
            .unwrap();
        set_internal_leftmost(&mut page, 10).unwrap();
        for (idx, (key, child)) in [(5, 11u32), (9, 12u32)].iter().enumerate() {
            let key_bytes = encode_key(&Value::Int(*key), TypeTag::Int).unwrap();
            page.insert_entry_at(idx as u16, &encode_internal_entry(&key_bytes, *child))
                .unwrap();
        }

        // Probe below every separator goes to the leftmost child.
        assert_eq!(
            internal_child_index(&page, TypeTag::Int, &Value::Int(3), true).unwrap(),
            0
        );
        // Equal separator: inserts go right, searches stay left.
        assert_eq!(
            internal_child_index(&page, TypeTag::Int, &Value::Int(5), true).unwrap(),
            1
        );
        assert_eq!(
            internal_child_index(&page, TypeTag::Int, &Value::Int(5), false).unwrap(),
            0
        );
        assert_eq!(
            internal_child_index(&page, TypeTag::Int, &Value::Int(100), true).unwrap(),
            2
        );

        assert_eq!(child_page_at(&page, 0, TypeTag::Int).unwrap(), 10);
        assert_eq!(child_page_at(&page, 1, TypeTag::Int).unwrap(), 11);
        assert_eq!(child_page_at(&page, 2, TypeTag::Int).unwrap(), 12);
    }

    #[test]
    fn set_child_page_rewrites_pointer_in_place() {
        let mut page = Page::new_zeroed(PageId::new(1, 2));
        page.initialize(PageId::new(1, 2), PageKind::IndexInternal)
            .unwrap();
        set_internal_leftmost(&mut page, 10).unwrap();
        let key_bytes = encode_key(&Value::Int(5), TypeTag::Int).unwrap();
        page.insert_entry_at(0, &encode_internal_entry(&key_bytes, 11))
            .unwrap();

        set_child_page_at(&mut page, 1, 42).unwrap();
        assert_eq!(child_page_at(&page, 1, TypeTag::Int).unwrap(), 42);
        // Separator untouched.
        let (key, _) = internal_entry(&page, 0, TypeTag::Int).unwrap();
        assert_eq!(key, Value::Int(5));
    }
}
