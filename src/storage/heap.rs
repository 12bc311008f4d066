use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::{CrabError, PageId, RecordId, Result};

use super::page::{TablePage, TablePageRef};

/// A table's storage: a singly-forward, doubly-linked chain of table pages
/// under the buffer pool, extended with a fresh page whenever the current
/// last page has no room. Mirrors the way `BTreeIndex` glues `BTreeNode`
/// pages together, but without any latch crabbing — heap pages aren't a
/// tree, so insert/scan only ever touch one page at a time.
pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    table_id: u32,
    first_page_id: PageId,
    last_page_id: Mutex<PageId>,
}

impl TableHeap {
    /// Creates a new, empty table heap with a single page.
    pub fn new(bpm: Arc<BufferPoolManager>, table_id: u32) -> Result<Self> {
        let page_id = bpm.new_page()?;
        {
            let mut guard = bpm
                .checked_write_page(page_id)?
                .ok_or(CrabError::PageNotFound(page_id))?;
            let mut page = TablePage::new(guard.data_mut());
            page.init(page_id, table_id);
        }

        Ok(Self {
            bpm,
            table_id,
            first_page_id: page_id,
            last_page_id: Mutex::new(page_id),
        })
    }

    /// Reopens a table heap whose pages already exist on disk.
    pub fn open(bpm: Arc<BufferPoolManager>, table_id: u32, first_page_id: PageId) -> Result<Self> {
        let mut last_page_id = first_page_id;
        loop {
            let guard = bpm
                .checked_read_page(last_page_id)?
                .ok_or(CrabError::PageNotFound(last_page_id))?;
            let page = TablePageRef::new(guard.data());
            match page.next_page_id() {
                Some(next) => last_page_id = next,
                None => break,
            }
        }

        Ok(Self {
            bpm,
            table_id,
            first_page_id,
            last_page_id: Mutex::new(last_page_id),
        })
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Inserts a tuple, appending a new page to the chain if the current
    /// last page has no room for it.
    pub fn insert_tuple(&self, data: &[u8]) -> Result<RecordId> {
        let mut last_page_id = self.last_page_id.lock();

        {
            let mut guard = self
                .bpm
                .checked_write_page(*last_page_id)?
                .ok_or(CrabError::PageNotFound(*last_page_id))?;
            let mut page = TablePage::new(guard.data_mut());
            if page.can_insert(data.len()) {
                return page.insert_tuple(data);
            }
        }

        // Last page is full: allocate and link a new one, then insert there.
        let new_page_id = self.bpm.new_page()?;
        {
            let mut new_guard = self
                .bpm
                .checked_write_page(new_page_id)?
                .ok_or(CrabError::PageNotFound(new_page_id))?;
            let mut new_page = TablePage::new(new_guard.data_mut());
            new_page.init(new_page_id, self.table_id);
            new_page.set_prev_page_id(Some(*last_page_id));

            let mut old_guard = self
                .bpm
                .checked_write_page(*last_page_id)?
                .ok_or(CrabError::PageNotFound(*last_page_id))?;
            let mut old_page = TablePage::new(old_guard.data_mut());
            old_page.set_next_page_id(Some(new_page_id));
            drop(old_guard);

            let rid = new_page.insert_tuple(data)?;
            *last_page_id = new_page_id;
            return Ok(rid);
        }
    }

    pub fn get_tuple(&self, rid: RecordId) -> Result<Vec<u8>> {
        let guard = self
            .bpm
            .checked_read_page(rid.page_id)?
            .ok_or(CrabError::PageNotFound(rid.page_id))?;
        let page = TablePageRef::new(guard.data());
        page.get_tuple(rid.slot_id).map(|t| t.to_vec())
    }

    /// Updates a tuple in place. The new data must fit within the slot the
    /// tuple already occupies; callers that might grow a tuple should
    /// delete and reinsert instead.
    pub fn update_tuple(&self, rid: RecordId, data: &[u8]) -> Result<()> {
        let mut guard = self
            .bpm
            .checked_write_page(rid.page_id)?
            .ok_or(CrabError::PageNotFound(rid.page_id))?;
        let mut page = TablePage::new(guard.data_mut());
        page.update_tuple(rid.slot_id, data)
    }

    pub fn delete_tuple(&self, rid: RecordId) -> Result<()> {
        let mut guard = self
            .bpm
            .checked_write_page(rid.page_id)?
            .ok_or(CrabError::PageNotFound(rid.page_id))?;
        let mut page = TablePage::new(guard.data_mut());
        page.delete_tuple(rid.slot_id)
    }

    /// A forward iterator over every live tuple in the heap, in page-chain
    /// then slot order. Holds no latch between calls to `next()`, same
    /// tradeoff as `BTreeIterator`.
    pub fn iter(&self) -> TableHeapIterator<'_> {
        TableHeapIterator {
            heap: self,
            current_page_id: Some(self.first_page_id),
            record_ids: Vec::new(),
            index: 0,
        }
    }
}

pub struct TableHeapIterator<'a> {
    heap: &'a TableHeap,
    current_page_id: Option<PageId>,
    record_ids: Vec<RecordId>,
    index: usize,
}

impl<'a> Iterator for TableHeapIterator<'a> {
    type Item = Result<(RecordId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.index < self.record_ids.len() {
                let rid = self.record_ids[self.index];
                self.index += 1;
                return Some(self.heap.get_tuple(rid).map(|tuple| (rid, tuple)));
            }

            let page_id = self.current_page_id?;
            let guard = match self.heap.bpm.checked_read_page(page_id) {
                Ok(Some(guard)) => guard,
                Ok(None) => return Some(Err(CrabError::PageNotFound(page_id))),
                Err(e) => return Some(Err(e)),
            };
            let page = TablePageRef::new(guard.data());
            self.record_ids = page.record_ids().collect();
            self.index = 0;
            self.current_page_id = page.next_page_id();

            if self.record_ids.is_empty() && self.current_page_id.is_none() {
                return None;
            }
        }
    }
}
