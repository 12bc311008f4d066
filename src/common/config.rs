use super::types::{FrameId, PageId};

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Invalid page ID constant
pub const INVALID_PAGE_ID: PageId = PageId(u32::MAX);

/// Invalid frame ID constant
pub const INVALID_FRAME_ID: FrameId = FrameId(u32::MAX);

/// Default K value for LRU-K replacement policy
pub const DEFAULT_LRUK_K: usize = 2;

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 10;

/// Default max number of (key, value) slots in a leaf page
pub const DEFAULT_LEAF_MAX_SIZE: usize = 128;

/// Default max number of (key, child) slots in an internal page
pub const DEFAULT_INTERNAL_MAX_SIZE: usize = 128;

/// Default deadlock detection polling interval, in milliseconds
pub const DEFAULT_DEADLOCK_DETECTION_INTERVAL_MS: u64 = 50;

/// Key prefix size for fast comparisons
pub const KEY_PREFIX_SIZE: usize = 16;

/// Process-wide configuration knobs, gathered from the environment/external
/// interfaces described for the buffer pool, B+ tree, and lock manager.
///
/// Individual subsystems also accept their parameters directly (so they can
/// be unit-tested in isolation); `Config` is the aggregate a full `Database`
/// would be constructed from.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Number of frames in the buffer pool.
    pub pool_size: usize,
    /// K for the LRU-K replacer.
    pub replacer_k: usize,
    /// Max (key, value) slots per B+ tree leaf page.
    pub leaf_max_size: usize,
    /// Max (key, child) slots per B+ tree internal page.
    pub internal_max_size: usize,
    /// Deadlock detector polling interval.
    pub deadlock_detection_interval_ms: u64,
    /// Whether the background deadlock detector thread runs at all.
    pub enable_deadlock_detection: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_BUFFER_POOL_SIZE,
            replacer_k: DEFAULT_LRUK_K,
            leaf_max_size: DEFAULT_LEAF_MAX_SIZE,
            internal_max_size: DEFAULT_INTERNAL_MAX_SIZE,
            deadlock_detection_interval_ms: DEFAULT_DEADLOCK_DETECTION_INTERVAL_MS,
            enable_deadlock_detection: true,
        }
    }
}
