use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{CrabError, PageId, RecordId, Result};

use super::btree_page::BTreeNodeRef;

/// Forward-only iterator over a B+ tree's leaf chain.
///
/// Holds no latch between calls to `next()`: each step acquires a read
/// guard on the current leaf, reads one entry (or follows the sibling
/// pointer), and releases it before returning. A concurrent split of a
/// leaf this iterator has already passed, or of one it hasn't reached
/// yet, is invisible to it; a split of the exact leaf it's paused on
/// between calls can cause it to miss or repeat entries at that boundary,
/// which this index does not guard against (callers needing strict
/// snapshot isolation should take locks through the lock manager).
pub struct BTreeIterator {
    bpm: Arc<BufferPoolManager>,
    current_page_id: Option<PageId>,
    current_index: usize,
    end_key: Option<u32>,
    done: bool,
}

impl BTreeIterator {
    /// Starts iteration at the beginning of `start_page_id`, optionally
    /// bounded (inclusive) by `end_key`. `None` means scan to the end of
    /// the tree.
    pub fn new(bpm: Arc<BufferPoolManager>, start_page_id: PageId, end_key: Option<u32>) -> Self {
        Self::starting_at(bpm, start_page_id, 0, end_key)
    }

    /// Starts iteration at `start_index` within `start_page_id`, for
    /// resuming a scan partway through a leaf (e.g. after `BTreeIndex::begin_at`).
    pub fn starting_at(
        bpm: Arc<BufferPoolManager>,
        start_page_id: PageId,
        start_index: usize,
        end_key: Option<u32>,
    ) -> Self {
        Self {
            bpm,
            current_page_id: Some(start_page_id),
            current_index: start_index,
            end_key,
            done: false,
        }
    }

    pub fn next(&mut self) -> Result<Option<(u32, RecordId)>> {
        if self.done {
            return Ok(None);
        }

        while let Some(page_id) = self.current_page_id {
            let next_page = {
                let guard = self
                    .bpm
                    .checked_read_page(page_id)?
                    .ok_or(CrabError::PageNotFound(page_id))?;
                let node = BTreeNodeRef::new(guard.data());

                if self.current_index < node.num_keys() as usize {
                    let key = node.get_key(self.current_index);

                    if let Some(end_key) = self.end_key {
                        if key > end_key {
                            self.done = true;
                            return Ok(None);
                        }
                    }

                    let value = node.get_value(self.current_index);
                    self.current_index += 1;
                    return Ok(Some((key, value)));
                }

                node.next_page_id()
            };

            self.current_page_id = next_page;
            self.current_index = 0;
        }

        self.done = true;
        Ok(None)
    }

    /// True once the iterator has exhausted the tree (or its end bound).
    /// Matches this iterator's `next() == Ok(None)` state without
    /// requiring a call that mutates position.
    pub fn is_end(&self) -> bool {
        self.done
    }
}

impl Iterator for BTreeIterator {
    type Item = Result<(u32, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match BTreeIterator::next(self) {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
