use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::tuple::{Schema, Tuple};

use super::executor::{synthetic_rid, Executor};
use super::sort::{compare_by, OrderByExpr};

/// One heap entry. `Ord` is the *reverse* of the requested sort order, so
/// `BinaryHeap`'s max (the next entry `pop`ped) is always the current
/// worst-of-the-kept-N row — the one to evict when a better row arrives.
/// `seq` breaks ties in original arrival order (stable).
struct HeapEntry {
    tuple: Tuple,
    seq: usize,
    order_by: Arc<Vec<OrderByExpr>>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // `compare_by` already yields the requested final order (its
        // "lesser" entries sort first); using it directly as `Ord` means
        // the entries that are *worse* under that order compare
        // `Greater`, so `BinaryHeap::pop` (which returns the `Ord`-max)
        // naturally returns the worst-kept row to evict.
        compare_by(&self.order_by, &self.tuple, &other.tuple)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Maintains a bounded max-heap of capacity N under the reverse of the
/// sort order: for each input tuple, push and pop-worst when size
/// exceeds N. On exhaustion, drains the heap (worst-first) and reverses
/// to yield rows in ascending order under the requested comparator.
pub struct TopNExecutor {
    child: Box<dyn Executor>,
    order_by: Arc<Vec<OrderByExpr>>,
    n: usize,
    schema: Arc<Schema>,
    output: Vec<Tuple>,
    position: usize,
}

impl TopNExecutor {
    pub fn new(child: Box<dyn Executor>, order_by: Vec<OrderByExpr>, n: usize) -> Self {
        let schema = Arc::clone(child.output_schema());
        Self {
            child,
            order_by: Arc::new(order_by),
            n,
            schema,
            output: Vec::new(),
            position: 0,
        }
    }
}

impl Executor for TopNExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(self.n + 1);
        let mut seq = 0usize;

        if self.n > 0 {
            while let Some((tuple, _rid)) = self.child.next()? {
                heap.push(HeapEntry {
                    tuple,
                    seq,
                    order_by: Arc::clone(&self.order_by),
                });
                seq += 1;
                if heap.len() > self.n {
                    heap.pop();
                }
            }
        }

        let mut popped: Vec<Tuple> = Vec::with_capacity(heap.len());
        while let Some(entry) = heap.pop() {
            popped.push(entry.tuple);
        }
        popped.reverse();
        self.output = popped;
        self.position = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.position >= self.output.len() {
            return Ok(None);
        }
        let tuple = self.output[self.position].clone();
        self.position += 1;
        Ok(Some((tuple, synthetic_rid())))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
