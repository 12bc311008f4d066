use std::sync::Arc;

use crate::common::{RecordId, Result, SlotId, INVALID_PAGE_ID};
use crate::tuple::{Schema, Tuple};

/// Placeholder rid for tuples that were never resident as a heap row
/// (join/aggregate/sort output, DML count tuples).
pub fn synthetic_rid() -> RecordId {
    RecordId::new(INVALID_PAGE_ID, SlotId::new(0))
}

/// Pull-based (volcano-style) operator. `Next` is called until it returns
/// `Ok(None)`; `Init` may be called again afterward to rescan (required by
/// nested-loop join, which re-`Init`s its inner child per outer tuple).
pub trait Executor {
    fn init(&mut self) -> Result<()>;

    /// Returns the next (tuple, rid) pair, or `None` once exhausted. The
    /// rid is meaningful for scans; synthetic tuples (join/aggregate
    /// output, DML counts) use an invalid placeholder rid.
    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>>;

    fn output_schema(&self) -> &Arc<Schema>;
}

/// Drains an executor into a `Vec`, a convenience used by operators that
/// must materialize their entire input (Sort, Aggregation, HashJoin build
/// side).
pub fn collect_all(executor: &mut dyn Executor) -> Result<Vec<Tuple>> {
    let mut out = Vec::new();
    while let Some((tuple, _)) = executor.next()? {
        out.push(tuple);
    }
    Ok(out)
}
