//! Defines the insertion plan struct for placing tuples into pages, along with related enums.

/// Defines whether a new slot should be created for the tuple or an existing
/// deleted slot can be reused when inserting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionSlot {
    /// A new slot should be appended to the directory for the tuple.
    New,
    /// The deleted slot at this index can be reused for the tuple.
    Reuse(u16),
}

/// Represents a plan for inserting a tuple into a page.
///
/// Plans are computed by `Page::plan_insert` before any mutation happens, so
/// callers (the heap file in particular) can pick a different page when the
/// plan fails without having touched this one.
#[derive(Debug, Clone, Copy)]
pub struct InsertionPlan {
    /// The slot information for the insertion.
    pub slot: InsertionSlot,
    /// Whether the page must be compacted before the tuple bytes fit
    /// contiguously in the free gap.
    pub compact_first: bool,
}
