//! Workload tests driving random insert/update/delete/compact sequences and
//! checking the structural invariants of the slotted page after every step.

use crate::page::api::Page;
use crate::page_id::PageId;
use crate::page_kind::PageKind;
use crate::{HEADER_SIZE, PAGE_SIZE};
use std::collections::BTreeMap;

/// Small deterministic xorshift generator so the workloads are reproducible.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

/// Asserts every structural invariant of the page:
/// directory arithmetic, slot bounds, and non-overlapping tuple regions.
fn assert_page_invariants(page: &Page) {
    let header = page.header_ref().unwrap();
    let num_slots = header.get_num_slots().unwrap() as usize;
    let free_start = header.get_free_start().unwrap() as usize;
    let free_end = header.get_free_end().unwrap() as usize;
    let special_start = header.get_special_start().unwrap() as usize;

    assert_eq!(num_slots * 4 + HEADER_SIZE, free_start);
    assert!(free_start <= free_end, "free_start must not pass free_end");
    assert!(free_end <= special_start);
    assert!(special_start <= PAGE_SIZE);

    let slot_array = page.slot_array_ref().unwrap();
    let mut regions: Vec<(usize, usize)> = Vec::new();
    for idx in 0..num_slots {
        let slot = slot_array.slot_ref(idx as u16).unwrap();
        let offset = slot.offset().unwrap() as usize;
        let length = slot.length().unwrap() as usize;
        if length == 0 {
            continue;
        }
        assert!(offset >= free_end, "live tuple below free_end");
        assert!(offset + length <= special_start, "live tuple past region end");
        regions.push((offset, offset + length));
    }

    regions.sort();
    for pair in regions.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "tuple regions overlap");
    }
}

fn tuple_bytes(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

#[test]
fn random_workload_preserves_invariants_and_content() {
    let mut rng = XorShift(0x5DEECE66D);
    let mut page = Page::new_empty(PageId::new(1, 1), PageKind::Heap).unwrap();

    // Mirror of what the page should contain: slot -> bytes.
    let mut expected: BTreeMap<u16, Vec<u8>> = BTreeMap::new();

    for round in 0..2_000u32 {
        match rng.below(5) {
            // insert
            0 | 1 => {
                let len = 1 + rng.below(200) as usize;
                let bytes = tuple_bytes(round as u8, len);
                if let Ok(plan) = page.plan_insert(len) {
                    let slot = page.insert(plan, &bytes).unwrap();
                    assert!(
                        expected.insert(slot, bytes).is_none(),
                        "insert reused a live slot"
                    );
                }
            }
            // delete
            2 => {
                if let Some(&slot) = expected.keys().next() {
                    page.delete_row(slot).unwrap();
                    expected.remove(&slot);
                }
            }
            // update
            3 => {
                if let Some(&slot) = expected.keys().last() {
                    let len = 1 + rng.below(300) as usize;
                    let bytes = tuple_bytes(round as u8, len);
                    match page.update_row(slot, &bytes) {
                        Ok(()) => {
                            expected.insert(slot, bytes);
                        }
                        Err(err) => assert!(err.is_page_full()),
                    }
                }
            }
            // compact
            _ => {
                page.compact().unwrap();
            }
        }

        assert_page_invariants(&page);
    }

    // Every expected tuple must read back unchanged.
    for (slot, bytes) in &expected {
        assert_eq!(page.row(*slot).unwrap(), bytes.as_slice());
    }
}

#[test]
fn compaction_preserves_live_multiset_and_slot_ids() {
    let mut rng = XorShift(42);
    let mut page = Page::new_empty(PageId::new(1, 1), PageKind::Heap).unwrap();
    let mut expected: BTreeMap<u16, Vec<u8>> = BTreeMap::new();

    for i in 0..40u8 {
        let len = 10 + rng.below(60) as usize;
        let bytes = tuple_bytes(i, len);
        let plan = page.plan_insert(len).unwrap();
        let slot = page.insert(plan, &bytes).unwrap();
        expected.insert(slot, bytes);
    }
    for slot in [3u16, 7, 11, 19, 23] {
        page.delete_row(slot).unwrap();
        expected.remove(&slot);
    }

    page.compact().unwrap();
    assert_page_invariants(&page);

    assert_eq!(page.slot_count().unwrap(), 40);
    for (slot, bytes) in &expected {
        assert_eq!(page.row(*slot).unwrap(), bytes.as_slice());
    }
}
