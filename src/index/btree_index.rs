use std::collections::VecDeque;
use std::sync::Arc;

use log::trace;

use crate::buffer::{BufferPoolManager, WritePageGuard};
use crate::common::{
    CrabError, PageId, RecordId, Result, DEFAULT_INTERNAL_MAX_SIZE, DEFAULT_LEAF_MAX_SIZE,
};

use super::btree_page::{BTreeNode, BTreeNodeRef, KeyValuePair};
use super::header_page::{BTreeHeaderPage, BTreeHeaderPageRef};
use super::key_comparator::{IntegerComparator, KeyComparator};
use super::BTreeIterator;

/// Concurrent B+ tree index, guarded by latch crabbing over buffer pool
/// page guards rather than its own lock table.
///
/// Reads release a page's latch before acquiring the next one down (an
/// intermediate page can be concurrently split or merged, but never while
/// a reader still holds a latch on it). Writes walk down holding every
/// ancestor's write latch until they reach a node "safe" for the
/// operation at hand — one that cannot itself need to split or merge —
/// at which point every ancestor above it is released. The header page
/// (which stores the root page id) is always the first latch taken, so a
/// root split/merge is handled by the same logic as any other level.
pub struct BTreeIndex {
    header_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    leaf_max_size: usize,
    internal_max_size: usize,
    comparator: Arc<dyn KeyComparator>,
}

enum Guard {
    Header(WritePageGuard),
    Node(WritePageGuard),
}

impl Guard {
    fn data(&self) -> &[u8] {
        match self {
            Guard::Header(g) => g.data(),
            Guard::Node(g) => g.data(),
        }
    }
}

impl BTreeIndex {
    pub fn new(bpm: Arc<BufferPoolManager>) -> Result<Self> {
        Self::with_sizes(bpm, DEFAULT_LEAF_MAX_SIZE, DEFAULT_INTERNAL_MAX_SIZE)
    }

    pub fn with_sizes(
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        let root_page_id = bpm.new_page()?;
        {
            let mut guard = bpm
                .checked_write_page(root_page_id)?
                .ok_or(CrabError::PageNotFound(root_page_id))?;
            let mut node = BTreeNode::new(guard.data_mut());
            node.init(root_page_id, true);
        }

        let header_page_id = bpm.new_page()?;
        {
            let mut guard = bpm
                .checked_write_page(header_page_id)?
                .ok_or(CrabError::PageNotFound(header_page_id))?;
            let mut header = BTreeHeaderPage::new(guard.data_mut());
            header.init(root_page_id);
        }

        Ok(Self {
            header_page_id,
            bpm,
            leaf_max_size,
            internal_max_size,
            comparator: Arc::new(IntegerComparator),
        })
    }

    pub fn open(header_page_id: PageId, bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            header_page_id,
            bpm,
            leaf_max_size: DEFAULT_LEAF_MAX_SIZE,
            internal_max_size: DEFAULT_INTERNAL_MAX_SIZE,
            comparator: Arc::new(IntegerComparator),
        }
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    pub fn comparator(&self) -> &dyn KeyComparator {
        self.comparator.as_ref()
    }

    fn compare_keys(&self, a: u32, b: u32) -> std::cmp::Ordering {
        self.comparator.compare(&a.to_le_bytes(), &b.to_le_bytes())
    }

    pub fn root_page_id(&self) -> Result<PageId> {
        let guard = self
            .bpm
            .checked_read_page(self.header_page_id)?
            .ok_or(CrabError::PageNotFound(self.header_page_id))?;
        BTreeHeaderPageRef::new(guard.data())
            .root_page_id()
            .ok_or(CrabError::IndexCorrupted("missing root page id".into()))
    }

    fn read_child_for_key(node: &BTreeNodeRef<'_>, key: u32) -> PageId {
        let pos = node.search_key(key);
        let num_keys = node.num_keys() as usize;
        let child_index = if pos < num_keys && node.get_key(pos) == key {
            pos + 1
        } else {
            pos
        };
        node.get_child(child_index)
    }

    /// Read-crabbing descent: each page's read guard is dropped before the
    /// next one is fetched, so no two page latches are ever held at once.
    pub fn search(&self, key: u32) -> Result<Option<RecordId>> {
        let leaf_page_id = self.find_leaf_read(key)?;

        let guard = self
            .bpm
            .checked_read_page(leaf_page_id)?
            .ok_or(CrabError::PageNotFound(leaf_page_id))?;
        let node = BTreeNodeRef::new(guard.data());

        let pos = node.search_key(key);
        if pos < node.num_keys() as usize
            && self.compare_keys(node.get_key(pos), key) == std::cmp::Ordering::Equal
        {
            Ok(Some(node.get_value(pos)))
        } else {
            Ok(None)
        }
    }

    fn find_leaf_read(&self, key: u32) -> Result<PageId> {
        let mut current_page_id = self.root_page_id()?;

        loop {
            let next_page_id = {
                let guard = self
                    .bpm
                    .checked_read_page(current_page_id)?
                    .ok_or(CrabError::PageNotFound(current_page_id))?;
                let node = BTreeNodeRef::new(guard.data());

                if node.is_leaf() {
                    return Ok(current_page_id);
                }

                Self::read_child_for_key(&node, key)
            };

            current_page_id = next_page_id;
        }
    }

    /// Returns a forward iterator starting at the first key in the tree.
    pub fn begin(&self) -> Result<BTreeIterator> {
        let mut current = self.root_page_id()?;
        loop {
            let guard = self
                .bpm
                .checked_read_page(current)?
                .ok_or(CrabError::PageNotFound(current))?;
            let node = BTreeNodeRef::new(guard.data());
            if node.is_leaf() {
                break;
            }
            current = node.get_child(0);
        }
        Ok(BTreeIterator::new(self.bpm.clone(), current, None))
    }

    /// Returns a forward iterator starting at the first key >= `key`.
    pub fn begin_at(&self, key: u32) -> Result<BTreeIterator> {
        let leaf = self.find_leaf_read(key)?;
        let start_index = {
            let guard = self
                .bpm
                .checked_read_page(leaf)?
                .ok_or(CrabError::PageNotFound(leaf))?;
            BTreeNodeRef::new(guard.data()).search_key(key)
        };
        Ok(BTreeIterator::starting_at(self.bpm.clone(), leaf, start_index, None))
    }

    pub fn range_scan(&self, start_key: u32, end_key: u32) -> Result<Vec<(u32, RecordId)>> {
        let leaf = self.find_leaf_read(start_key)?;
        let start_index = {
            let guard = self
                .bpm
                .checked_read_page(leaf)?
                .ok_or(CrabError::PageNotFound(leaf))?;
            BTreeNodeRef::new(guard.data()).search_key(start_key)
        };
        let mut iter = BTreeIterator::starting_at(self.bpm.clone(), leaf, start_index, Some(end_key));
        let mut results = Vec::new();
        while let Some(pair) = iter.next()? {
            results.push(pair);
        }
        Ok(results)
    }

    fn is_safe_for_insert(node: &BTreeNodeRef<'_>, max_size: usize) -> bool {
        (node.num_keys() as usize) < max_size
    }

    fn is_safe_for_delete(node: &BTreeNodeRef<'_>, min_size: usize, is_root: bool) -> bool {
        if is_root {
            // The root never underflows in the structural sense: it's
            // allowed to have as few as one child (or zero keys as a leaf).
            true
        } else {
            (node.num_keys() as usize) > min_size
        }
    }

    fn max_size_for(&self, is_leaf: bool) -> usize {
        if is_leaf {
            self.leaf_max_size
        } else {
            self.internal_max_size
        }
    }

    fn min_size_for(&self, is_leaf: bool) -> usize {
        self.max_size_for(is_leaf) / 2
    }

    /// Descends from the header page to the target leaf, write-latching
    /// every ancestor and dropping them once a node "safe" for the
    /// operation (per `safe`) is reached. Returns the full remaining
    /// latch stack, deepest page last.
    fn descend_write(
        &self,
        key: u32,
        safe: impl Fn(&BTreeNodeRef<'_>, usize, bool) -> bool,
    ) -> Result<VecDeque<Guard>> {
        let mut stack: VecDeque<Guard> = VecDeque::new();

        let header_guard = self
            .bpm
            .checked_write_page(self.header_page_id)?
            .ok_or(CrabError::PageNotFound(self.header_page_id))?;
        stack.push_back(Guard::Header(header_guard));

        let mut current_id = BTreeHeaderPageRef::new(stack.back().unwrap().data())
            .root_page_id()
            .ok_or(CrabError::IndexCorrupted("missing root page id".into()))?;
        let mut depth = 0usize;

        loop {
            let node_guard = self
                .bpm
                .checked_write_page(current_id)?
                .ok_or(CrabError::PageNotFound(current_id))?;
            let is_leaf = BTreeNodeRef::new(node_guard.data()).is_leaf();
            let max_size = self.max_size_for(is_leaf);
            // True only for the tree's actual root, regardless of how many
            // ancestor guards we're still holding at this point.
            let is_root = depth == 0;
            depth += 1;
            let node_is_safe = {
                let node = BTreeNodeRef::new(node_guard.data());
                safe(&node, max_size, is_root)
            };

            stack.push_back(Guard::Node(node_guard));

            if node_is_safe {
                trace!("btree: page {current_id:?} is safe, releasing ancestors");
                while stack.len() > 1 {
                    stack.pop_front();
                }
            }

            if is_leaf {
                return Ok(stack);
            }

            let child_id = {
                let back = stack.back().unwrap();
                let node = BTreeNodeRef::new(back.data());
                Self::read_child_for_key(&node, key)
            };
            current_id = child_id;
        }
    }

    pub fn insert(&self, key: u32, value: RecordId) -> Result<bool> {
        let mut stack = self.descend_write(key, |node, max_size, _is_root| {
            Self::is_safe_for_insert(node, max_size)
        })?;

        let leaf_guard = match stack.pop_back().unwrap() {
            Guard::Node(g) => g,
            Guard::Header(_) => unreachable!("leaf is never the header page"),
        };
        let leaf_page_id = leaf_guard.page_id();

        // Duplicate key check before mutating.
        {
            let node = BTreeNodeRef::new(leaf_guard.data());
            let pos = node.search_key(key);
            if pos < node.num_keys() as usize
                && self.compare_keys(node.get_key(pos), key) == std::cmp::Ordering::Equal
            {
                return Ok(false);
            }
        }

        let overflow = {
            let mut guard = leaf_guard;
            let mut node = BTreeNode::new(guard.data_mut());
            node.insert_key_value(key, value)?;
            node.num_keys() as usize > self.leaf_max_size
        };

        if !overflow {
            return Ok(true);
        }

        self.split_leaf_and_propagate(leaf_page_id, stack)?;
        Ok(true)
    }

    fn split_leaf_and_propagate(
        &self,
        leaf_page_id: PageId,
        mut ancestors: VecDeque<Guard>,
    ) -> Result<()> {
        let (separator_key, right_pairs, next_page_id, parent_page_id) = {
            let mut guard = self
                .bpm
                .checked_write_page(leaf_page_id)?
                .ok_or(CrabError::PageNotFound(leaf_page_id))?;
            let mut node = BTreeNode::new(guard.data_mut());
            let next = node.next_page_id();
            let parent = node.parent_page_id();
            let (sep_key, pairs) = node.split_leaf();
            (sep_key, pairs, next, parent)
        };

        let new_leaf_id = self.bpm.new_page()?;
        {
            let mut new_guard = self
                .bpm
                .checked_write_page(new_leaf_id)?
                .ok_or(CrabError::PageNotFound(new_leaf_id))?;
            let mut new_node = BTreeNode::new(new_guard.data_mut());
            new_node.init(new_leaf_id, true);
            new_node.insert_pairs(&right_pairs);
            new_node.set_parent_page_id(parent_page_id);
            new_node.set_next_page_id(next_page_id);
            new_node.set_prev_page_id(Some(leaf_page_id));
        }
        {
            let mut guard = self
                .bpm
                .checked_write_page(leaf_page_id)?
                .ok_or(CrabError::PageNotFound(leaf_page_id))?;
            let mut node = BTreeNode::new(guard.data_mut());
            node.set_next_page_id(Some(new_leaf_id));
        }
        if let Some(next_id) = next_page_id {
            let mut next_guard = self
                .bpm
                .checked_write_page(next_id)?
                .ok_or(CrabError::PageNotFound(next_id))?;
            let mut next_node = BTreeNode::new(next_guard.data_mut());
            next_node.set_prev_page_id(Some(new_leaf_id));
        }

        self.insert_into_parent(leaf_page_id, separator_key, new_leaf_id, &mut ancestors)
    }

    /// Inserts `(key, new_child_id)` into the parent of `left_child_id`,
    /// consuming write guards from the ancestor stack we were left
    /// holding from the original descent. If the stack is empty the
    /// split propagated above where we crabbed to, which only happens
    /// at the root.
    fn insert_into_parent(
        &self,
        left_child_id: PageId,
        key: u32,
        new_child_id: PageId,
        ancestors: &mut VecDeque<Guard>,
    ) -> Result<()> {
        let parent_guard = match ancestors.pop_back() {
            Some(Guard::Node(g)) => g,
            Some(Guard::Header(header_guard)) => {
                // left_child_id was the root: build a new root above it.
                let new_root_id = self.bpm.new_page()?;
                {
                    let mut root_guard = self
                        .bpm
                        .checked_write_page(new_root_id)?
                        .ok_or(CrabError::PageNotFound(new_root_id))?;
                    let mut root_node = BTreeNode::new(root_guard.data_mut());
                    root_node.init(new_root_id, false);
                    root_node.insert_keys_children(&[key], &[left_child_id, new_child_id]);
                }
                for child_id in [left_child_id, new_child_id] {
                    let mut guard = self
                        .bpm
                        .checked_write_page(child_id)?
                        .ok_or(CrabError::PageNotFound(child_id))?;
                    let mut node = BTreeNode::new(guard.data_mut());
                    node.set_parent_page_id(Some(new_root_id));
                }
                let mut header_guard = header_guard;
                let mut header = BTreeHeaderPage::new(header_guard.data_mut());
                header.set_root_page_id(new_root_id);
                return Ok(());
            }
            None => unreachable!("ancestor stack always starts with the header page"),
        };

        let parent_id = parent_guard.page_id();
        let overflow = {
            let mut guard = parent_guard;
            let mut node = BTreeNode::new(guard.data_mut());
            node.insert_key_child(key, new_child_id)?;
            node.num_keys() as usize > self.internal_max_size
        };

        {
            let mut child_guard = self
                .bpm
                .checked_write_page(new_child_id)?
                .ok_or(CrabError::PageNotFound(new_child_id))?;
            let mut child_node = BTreeNode::new(child_guard.data_mut());
            child_node.set_parent_page_id(Some(parent_id));
        }

        if !overflow {
            return Ok(());
        }

        let (separator_key, right_keys, right_children) = {
            let mut guard = self
                .bpm
                .checked_write_page(parent_id)?
                .ok_or(CrabError::PageNotFound(parent_id))?;
            let mut node = BTreeNode::new(guard.data_mut());
            node.split_internal()
        };

        let new_internal_id = self.bpm.new_page()?;
        {
            let mut new_guard = self
                .bpm
                .checked_write_page(new_internal_id)?
                .ok_or(CrabError::PageNotFound(new_internal_id))?;
            let mut new_node = BTreeNode::new(new_guard.data_mut());
            new_node.init(new_internal_id, false);
            new_node.insert_keys_children(&right_keys, &right_children);
        }
        for child_id in &right_children {
            let mut child_guard = self
                .bpm
                .checked_write_page(*child_id)?
                .ok_or(CrabError::PageNotFound(*child_id))?;
            let mut child_node = BTreeNode::new(child_guard.data_mut());
            child_node.set_parent_page_id(Some(new_internal_id));
        }

        self.insert_into_parent(parent_id, separator_key, new_internal_id, ancestors)
    }

    pub fn delete(&self, key: u32) -> Result<bool> {
        let mut stack = self.descend_write(key, |node, max_size, is_root| {
            Self::is_safe_for_delete(node, max_size / 2, is_root)
        })?;

        let leaf_guard = match stack.pop_back().unwrap() {
            Guard::Node(g) => g,
            Guard::Header(_) => unreachable!("leaf is never the header page"),
        };
        let leaf_page_id = leaf_guard.page_id();

        let (removed, underflow) = {
            let mut guard = leaf_guard;
            let mut node = BTreeNode::new(guard.data_mut());
            let removed = node.remove_key_value(key).is_some();
            let underflow = removed && node.is_underflow(self.min_size_for(true)) && stack.len() > 0;
            (removed, underflow)
        };

        if !removed || !underflow {
            return Ok(removed);
        }

        self.rebalance_after_delete(leaf_page_id, true, stack)?;
        Ok(true)
    }

    /// Rebalances `page_id` (known to be underflowing) by borrowing a key
    /// from a sibling if one can spare it, or merging with a sibling
    /// otherwise. Recurses up through `ancestors` if a merge causes the
    /// parent to underflow in turn.
    fn rebalance_after_delete(
        &self,
        page_id: PageId,
        is_leaf: bool,
        mut ancestors: VecDeque<Guard>,
    ) -> Result<()> {
        let parent_guard = match ancestors.pop_back() {
            Some(Guard::Node(g)) => g,
            Some(Guard::Header(header_guard)) => {
                // page_id is the root. If it's an internal node with a
                // single remaining child, that child becomes the new root.
                ancestors.push_back(Guard::Header(header_guard));
                return self.collapse_root_if_needed(page_id, is_leaf, ancestors);
            }
            None => unreachable!(),
        };

        let parent_id = parent_guard.page_id();
        let (keys, children) = {
            let mut guard = parent_guard;
            let node = BTreeNode::new(guard.data_mut());
            node.all_keys_children()
        };

        let child_index = children
            .iter()
            .position(|&c| c == page_id)
            .expect("page must be a child of its latched parent");

        // Prefer borrowing from the right sibling, then the left sibling
        // (only when this is the last child pointer do we fall back to the
        // left); merge follows the same adjacency preference.
        let is_last_child = child_index + 1 == children.len();

        if !is_last_child {
            let right_id = children[child_index + 1];
            if self.try_borrow_right(page_id, right_id, parent_id, child_index, is_leaf)? {
                return Ok(());
            }
        }
        if child_index > 0 {
            let left_id = children[child_index - 1];
            if self.try_borrow_left(page_id, left_id, parent_id, child_index - 1, is_leaf)? {
                return Ok(());
            }
        }

        // No sibling could lend a key: merge.
        let (merge_left, merge_right, separator_index) = if !is_last_child {
            (page_id, children[child_index + 1], child_index)
        } else {
            (children[child_index - 1], page_id, child_index - 1)
        };
        let bridge_key = keys[separator_index];

        self.merge_nodes(merge_left, merge_right, is_leaf, bridge_key)?;

        let parent_guard = self
            .bpm
            .checked_write_page(parent_id)?
            .ok_or(CrabError::PageNotFound(parent_id))?;
        let mut guard = parent_guard;
        let mut parent_node = BTreeNode::new(guard.data_mut());
        let removed_child_index = if merge_right == page_id {
            // merge_right (page_id) was absorbed into merge_left; the
            // child slot that disappears is `child_index`, bound by the
            // key at `separator_index`.
            child_index
        } else {
            child_index + 1
        };
        parent_node.remove_child_at(removed_child_index);
        drop(guard);

        let parent_underflow = {
            let guard = self
                .bpm
                .checked_read_page(parent_id)?
                .ok_or(CrabError::PageNotFound(parent_id))?;
            BTreeNodeRef::new(guard.data()).is_underflow(self.min_size_for(false))
        };

        if parent_underflow {
            self.rebalance_after_delete(parent_id, false, ancestors)
        } else {
            Ok(())
        }
    }

    fn collapse_root_if_needed(
        &self,
        root_id: PageId,
        is_leaf: bool,
        mut ancestors: VecDeque<Guard>,
    ) -> Result<()> {
        if is_leaf {
            return Ok(());
        }
        let single_child = {
            let guard = self
                .bpm
                .checked_read_page(root_id)?
                .ok_or(CrabError::PageNotFound(root_id))?;
            let node = BTreeNodeRef::new(guard.data());
            if node.num_keys() == 0 {
                Some(node.get_child(0))
            } else {
                None
            }
        };

        if let Some(new_root) = single_child {
            let header_guard = match ancestors.pop_back() {
                Some(Guard::Header(g)) => g,
                _ => unreachable!("root collapse always sees the header page"),
            };
            let mut header_guard = header_guard;
            let mut header = BTreeHeaderPage::new(header_guard.data_mut());
            header.set_root_page_id(new_root);

            let mut child_guard = self
                .bpm
                .checked_write_page(new_root)?
                .ok_or(CrabError::PageNotFound(new_root))?;
            let mut child_node = BTreeNode::new(child_guard.data_mut());
            child_node.set_parent_page_id(None);
        }

        Ok(())
    }

    fn try_borrow_left(
        &self,
        page_id: PageId,
        left_id: PageId,
        parent_id: PageId,
        separator_index: usize,
        is_leaf: bool,
    ) -> Result<bool> {
        let min_size = self.min_size_for(is_leaf);
        let left_can_lend = {
            let guard = self
                .bpm
                .checked_read_page(left_id)?
                .ok_or(CrabError::PageNotFound(left_id))?;
            (BTreeNodeRef::new(guard.data()).num_keys() as usize) > min_size
        };
        if !left_can_lend {
            return Ok(false);
        }

        if is_leaf {
            let (borrowed_key, borrowed_value) = {
                let mut guard = self
                    .bpm
                    .checked_write_page(left_id)?
                    .ok_or(CrabError::PageNotFound(left_id))?;
                let mut node = BTreeNode::new(guard.data_mut());
                let mut pairs = node.all_pairs();
                let last = pairs.pop().unwrap();
                node.insert_pairs(&pairs);
                (last.key, last.value)
            };
            {
                let mut guard = self
                    .bpm
                    .checked_write_page(page_id)?
                    .ok_or(CrabError::PageNotFound(page_id))?;
                let mut node = BTreeNode::new(guard.data_mut());
                node.insert_key_value(borrowed_key, borrowed_value)?;
            }
            let mut parent_guard = self
                .bpm
                .checked_write_page(parent_id)?
                .ok_or(CrabError::PageNotFound(parent_id))?;
            let mut parent_node = BTreeNode::new(parent_guard.data_mut());
            let (mut keys, children) = parent_node.all_keys_children();
            keys[separator_index] = borrowed_key;
            parent_node.insert_keys_children(&keys, &children);
        } else {
            let (separator_key, borrowed_key, moved_child) = {
                let mut left_guard = self
                    .bpm
                    .checked_write_page(left_id)?
                    .ok_or(CrabError::PageNotFound(left_id))?;
                let mut left_node = BTreeNode::new(left_guard.data_mut());
                let (mut keys, mut children) = left_node.all_keys_children();
                let borrowed_key = keys.pop().unwrap();
                let moved_child = children.pop().unwrap();
                left_node.insert_keys_children(&keys, &children);

                let parent_guard = self
                    .bpm
                    .checked_read_page(parent_id)?
                    .ok_or(CrabError::PageNotFound(parent_id))?;
                let separator_key = BTreeNodeRef::new(parent_guard.data()).get_key(separator_index);
                (separator_key, borrowed_key, moved_child)
            };
            {
                let mut guard = self
                    .bpm
                    .checked_write_page(page_id)?
                    .ok_or(CrabError::PageNotFound(page_id))?;
                let mut node = BTreeNode::new(guard.data_mut());
                let (mut keys, mut children) = node.all_keys_children();
                keys.insert(0, separator_key);
                children.insert(0, moved_child);
                node.insert_keys_children(&keys, &children);
            }
            {
                let mut child_guard = self
                    .bpm
                    .checked_write_page(moved_child)?
                    .ok_or(CrabError::PageNotFound(moved_child))?;
                let mut child_node = BTreeNode::new(child_guard.data_mut());
                child_node.set_parent_page_id(Some(page_id));
            }
            let mut parent_guard = self
                .bpm
                .checked_write_page(parent_id)?
                .ok_or(CrabError::PageNotFound(parent_id))?;
            let mut parent_node = BTreeNode::new(parent_guard.data_mut());
            let (mut keys, children) = parent_node.all_keys_children();
            keys[separator_index] = borrowed_key;
            parent_node.insert_keys_children(&keys, &children);
        }

        Ok(true)
    }

    fn try_borrow_right(
        &self,
        page_id: PageId,
        right_id: PageId,
        parent_id: PageId,
        separator_index: usize,
        is_leaf: bool,
    ) -> Result<bool> {
        let min_size = self.min_size_for(is_leaf);
        let right_can_lend = {
            let guard = self
                .bpm
                .checked_read_page(right_id)?
                .ok_or(CrabError::PageNotFound(right_id))?;
            (BTreeNodeRef::new(guard.data()).num_keys() as usize) > min_size
        };
        if !right_can_lend {
            return Ok(false);
        }

        if is_leaf {
            let (borrowed_key, borrowed_value, new_separator) = {
                let mut guard = self
                    .bpm
                    .checked_write_page(right_id)?
                    .ok_or(CrabError::PageNotFound(right_id))?;
                let mut node = BTreeNode::new(guard.data_mut());
                let mut pairs = node.all_pairs();
                let first = pairs.remove(0);
                node.insert_pairs(&pairs);
                let new_separator = pairs.first().map(|p| p.key).unwrap_or(first.key);
                (first.key, first.value, new_separator)
            };
            {
                let mut guard = self
                    .bpm
                    .checked_write_page(page_id)?
                    .ok_or(CrabError::PageNotFound(page_id))?;
                let mut node = BTreeNode::new(guard.data_mut());
                node.insert_key_value(borrowed_key, borrowed_value)?;
            }
            let mut parent_guard = self
                .bpm
                .checked_write_page(parent_id)?
                .ok_or(CrabError::PageNotFound(parent_id))?;
            let mut parent_node = BTreeNode::new(parent_guard.data_mut());
            let (mut keys, children) = parent_node.all_keys_children();
            keys[separator_index] = new_separator;
            parent_node.insert_keys_children(&keys, &children);
        } else {
            let (moved_key, moved_child, new_separator) = {
                let mut right_guard = self
                    .bpm
                    .checked_write_page(right_id)?
                    .ok_or(CrabError::PageNotFound(right_id))?;
                let mut right_node = BTreeNode::new(right_guard.data_mut());
                let (mut keys, mut children) = right_node.all_keys_children();
                let new_separator = keys.remove(0);
                let moved_child = children.remove(0);
                right_node.insert_keys_children(&keys, &children);

                let parent_guard = self
                    .bpm
                    .checked_read_page(parent_id)?
                    .ok_or(CrabError::PageNotFound(parent_id))?;
                let moved_key = BTreeNodeRef::new(parent_guard.data()).get_key(separator_index);
                (moved_key, moved_child, new_separator)
            };
            {
                let mut guard = self
                    .bpm
                    .checked_write_page(page_id)?
                    .ok_or(CrabError::PageNotFound(page_id))?;
                let mut node = BTreeNode::new(guard.data_mut());
                let (mut keys, mut children) = node.all_keys_children();
                keys.push(moved_key);
                children.push(moved_child);
                node.insert_keys_children(&keys, &children);
            }
            {
                let mut child_guard = self
                    .bpm
                    .checked_write_page(moved_child)?
                    .ok_or(CrabError::PageNotFound(moved_child))?;
                let mut child_node = BTreeNode::new(child_guard.data_mut());
                child_node.set_parent_page_id(Some(page_id));
            }
            let mut parent_guard = self
                .bpm
                .checked_write_page(parent_id)?
                .ok_or(CrabError::PageNotFound(parent_id))?;
            let mut parent_node = BTreeNode::new(parent_guard.data_mut());
            let (mut keys, children) = parent_node.all_keys_children();
            keys[separator_index] = new_separator;
            parent_node.insert_keys_children(&keys, &children);
        }

        Ok(true)
    }

    /// Merges `right_id`'s contents into `left_id` and deallocates
    /// `right_id`. For internal nodes, `bridge_key` is the separator that
    /// used to sit between them in their parent; it joins left's last
    /// child to right's first child in the merged node's key sequence.
    fn merge_nodes(
        &self,
        left_id: PageId,
        right_id: PageId,
        is_leaf: bool,
        bridge_key: u32,
    ) -> Result<()> {
        if is_leaf {
            let mut left_pairs = {
                let guard = self
                    .bpm
                    .checked_read_page(left_id)?
                    .ok_or(CrabError::PageNotFound(left_id))?;
                BTreeNodeRef::new(guard.data()).all_pairs()
            };
            let (right_pairs, right_next): (Vec<KeyValuePair>, Option<PageId>) = {
                let guard = self
                    .bpm
                    .checked_read_page(right_id)?
                    .ok_or(CrabError::PageNotFound(right_id))?;
                let node = BTreeNodeRef::new(guard.data());
                (node.all_pairs(), node.next_page_id())
            };
            left_pairs.extend(right_pairs);

            {
                let mut guard = self
                    .bpm
                    .checked_write_page(left_id)?
                    .ok_or(CrabError::PageNotFound(left_id))?;
                let mut node = BTreeNode::new(guard.data_mut());
                node.insert_pairs(&left_pairs);
                node.set_next_page_id(right_next);
            }
            if let Some(next_id) = right_next {
                let mut guard = self
                    .bpm
                    .checked_write_page(next_id)?
                    .ok_or(CrabError::PageNotFound(next_id))?;
                let mut node = BTreeNode::new(guard.data_mut());
                node.set_prev_page_id(Some(left_id));
            }
        } else {
            let (mut left_keys, mut left_children) = {
                let guard = self
                    .bpm
                    .checked_read_page(left_id)?
                    .ok_or(CrabError::PageNotFound(left_id))?;
                BTreeNodeRef::new(guard.data()).all_keys_children()
            };
            let (right_keys, right_children) = {
                let guard = self
                    .bpm
                    .checked_read_page(right_id)?
                    .ok_or(CrabError::PageNotFound(right_id))?;
                BTreeNodeRef::new(guard.data()).all_keys_children()
            };
            left_keys.push(bridge_key);
            left_keys.extend(right_keys);
            left_children.extend(right_children.clone());

            for child_id in &right_children {
                let mut guard = self
                    .bpm
                    .checked_write_page(*child_id)?
                    .ok_or(CrabError::PageNotFound(*child_id))?;
                let mut node = BTreeNode::new(guard.data_mut());
                node.set_parent_page_id(Some(left_id));
            }

            {
                let mut guard = self
                    .bpm
                    .checked_write_page(left_id)?
                    .ok_or(CrabError::PageNotFound(left_id))?;
                let mut node = BTreeNode::new(guard.data_mut());
                node.insert_keys_children(&left_keys, &left_children);
            }
        }

        self.bpm.delete_page(right_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{PageId, RecordId, SlotId};
    use crate::storage::disk::DiskManager;
    use tempfile::NamedTempFile;

    fn new_index(pool_size: usize) -> (BTreeIndex, Arc<BufferPoolManager>, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let disk_manager = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(pool_size, 2, disk_manager));
        let index = BTreeIndex::with_sizes(bpm.clone(), 4, 4).unwrap();
        (index, bpm, temp_file)
    }

    #[test]
    fn test_simple_insert_search() {
        let (index, _bpm, _temp) = new_index(20);
        let record1 = RecordId::new(PageId::new(100), SlotId::new(0));
        let record2 = RecordId::new(PageId::new(100), SlotId::new(1));
        let record3 = RecordId::new(PageId::new(101), SlotId::new(0));

        assert!(index.insert(10, record1).unwrap());
        assert!(index.insert(20, record2).unwrap());
        assert!(index.insert(30, record3).unwrap());

        assert_eq!(index.search(10).unwrap(), Some(record1));
        assert_eq!(index.search(20).unwrap(), Some(record2));
        assert_eq!(index.search(30).unwrap(), Some(record3));
        assert_eq!(index.search(40).unwrap(), None);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let (index, _bpm, _temp) = new_index(20);
        let record = RecordId::new(PageId::new(1), SlotId::new(0));
        assert!(index.insert(5, record).unwrap());
        assert!(!index.insert(5, record).unwrap());
    }

    #[test]
    fn test_insert_triggers_split() {
        let (index, _bpm, _temp) = new_index(50);
        for i in 0..30u32 {
            let record = RecordId::new(PageId::new(i), SlotId::new(0));
            assert!(index.insert(i, record).unwrap());
        }
        for i in 0..30u32 {
            assert_eq!(
                index.search(i).unwrap(),
                Some(RecordId::new(PageId::new(i), SlotId::new(0)))
            );
        }
    }

    #[test]
    fn test_range_scan() {
        let (index, _bpm, _temp) = new_index(50);
        for i in 0..20u32 {
            index
                .insert(i, RecordId::new(PageId::new(i), SlotId::new(0)))
                .unwrap();
        }
        let results = index.range_scan(5, 10).unwrap();
        let keys: Vec<u32> = results.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_forward_iterator_full_scan() {
        let (index, _bpm, _temp) = new_index(50);
        for i in 0..20u32 {
            index
                .insert(i, RecordId::new(PageId::new(i), SlotId::new(0)))
                .unwrap();
        }
        let mut iter = index.begin().unwrap();
        let mut count = 0;
        let mut prev = None;
        while let Some((k, _)) = iter.next().unwrap() {
            if let Some(p) = prev {
                assert!(k > p);
            }
            prev = Some(k);
            count += 1;
        }
        assert_eq!(count, 20);
    }

    #[test]
    fn test_delete_simple() {
        let (index, _bpm, _temp) = new_index(50);
        for i in 0..10u32 {
            index
                .insert(i, RecordId::new(PageId::new(i), SlotId::new(0)))
                .unwrap();
        }
        assert!(index.delete(5).unwrap());
        assert_eq!(index.search(5).unwrap(), None);
        assert!(!index.delete(5).unwrap());

        for i in [0, 1, 2, 3, 4, 6, 7, 8, 9] {
            assert!(index.search(i).unwrap().is_some());
        }
    }

    #[test]
    fn test_delete_with_merges() {
        let (index, _bpm, _temp) = new_index(50);
        for i in 0..40u32 {
            index
                .insert(i, RecordId::new(PageId::new(i), SlotId::new(0)))
                .unwrap();
        }
        for i in 0..35u32 {
            assert!(index.delete(i).unwrap(), "failed to delete {i}");
        }
        for i in 0..35u32 {
            assert_eq!(index.search(i).unwrap(), None);
        }
        for i in 35..40u32 {
            assert!(index.search(i).unwrap().is_some());
        }
    }
}
