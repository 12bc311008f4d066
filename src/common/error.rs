use thiserror::Error;

use super::types::{FrameId, PageId, Oid, TxnId};

/// Reason a transaction was aborted by the lock manager.
///
/// Kept as its own enum (rather than a string) so callers can match on the
/// reason without string comparison.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    #[error("lock requested while transaction is in SHRINKING phase")]
    LockOnShrinking,
    #[error("shared lock requested under READ_UNCOMMITTED isolation")]
    LockSharedOnReadUncommitted,
    #[error("another upgrade is already pending on this queue")]
    UpgradeConflict,
    #[error("requested upgrade is not reachable from the currently held mode")]
    IncompatibleUpgrade,
    #[error("unlock requested but transaction holds no lock on this resource")]
    AttemptedUnlockButNoLockHeld,
    #[error("table unlocked before unlocking all rows held on it")]
    TableUnlockedBeforeUnlockingRows,
    #[error("intention lock (IS/IX/SIX) requested at row granularity")]
    AttemptedIntentionLockOnRow,
    #[error("row lock requested without a compatible table-level intention lock")]
    TableLockNotPresent,
    #[error("transaction was selected as a deadlock victim")]
    DeadlockVictim,
    #[error("lock requested by a transaction that has already committed or aborted")]
    TransactionNotActive,
}

/// Database error types
#[derive(Error, Debug)]
pub enum CrabError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Frame {0} not found")]
    FrameNotFound(FrameId),

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Invalid frame ID: {0}")]
    InvalidFrameId(FrameId),

    #[error("Page {0} is still pinned")]
    PageStillPinned(PageId),

    #[error("Failed to evict page")]
    EvictionFailed,

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Page overflow: tuple size {tuple_size} exceeds available space {available}")]
    PageOverflow { tuple_size: usize, available: usize },

    #[error("Invalid slot ID: {0}")]
    InvalidSlotId(u16),

    #[error("Slot {0} is empty")]
    EmptySlot(u16),

    #[error("Page is full")]
    PageFull,

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Table {0} already exists")]
    TableAlreadyExists(u32),

    #[error("Table {0} not found")]
    TableNotFound(u32),

    #[error("Directory page is full")]
    DirectoryFull,

    #[error("Invalid database file")]
    InvalidDatabaseFile,

    #[error("Duplicate key: {0}")]
    DuplicateKey(u32),

    #[error("Key not found")]
    KeyNotFound,

    #[error("Index {0} not found")]
    IndexNotFound(u32),

    #[error("Index corrupted: {0}")]
    IndexCorrupted(String),

    #[error("Catalog object {0} not found")]
    CatalogNotFound(Oid),

    #[error("Replacer invariant violated: frame {0} is not evictable")]
    ReplacerInvariant(FrameId),

    #[error("transaction {0}: {1}")]
    TransactionAbort(TxnId, AbortReason),
}

pub type Result<T> = std::result::Result<T, CrabError>;
