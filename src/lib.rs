//! crabdb - a disk-oriented teaching RDBMS storage and execution core.
//!
//! This crate provides the storage, concurrency, and execution layers of a
//! relational database management system with a disk-oriented architecture.
//! The system stores data on persistent storage and uses a buffer pool to
//! cache frequently accessed pages in memory; transactions coordinate
//! through a hierarchical lock manager enforcing strict two-phase locking.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): disk I/O and page organization
//!   - `DiskManager` / `DiskScheduler`: synchronous page I/O and an
//!     asynchronous request queue in front of it
//!   - `TablePage`: table-specific slotted page format with a linked-list
//!     next-page pointer
//!   - `TableHeap`: an ordered sequence of `TablePage`s forming one table
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: fetches pages from disk and caches them in memory
//!   - `LruKReplacer`: LRU-K page replacement policy
//!   - `ReadPageGuard` / `WritePageGuard`: RAII guards for thread-safe page access
//!
//! - **Index** (`index`): a latch-crabbing concurrent B+ tree (`BTreeIndex`)
//!   supporting point lookup, insert, delete, and ordered forward iteration
//!
//! - **Concurrency** (`concurrency`): hierarchical multi-mode locking
//!   (`LockManager`) enforcing strict two-phase locking across isolation
//!   levels, with background deadlock detection
//!
//! - **Transactions** (`txn`): `Transaction` and `TransactionManager`,
//!   tracking per-transaction isolation level, state, and held locks
//!
//! - **Catalog** (`catalog`): table and index metadata (`Catalog` trait,
//!   `SimpleCatalog`)
//!
//! - **Tuple** (`tuple`): the row data model (`Schema`, `Tuple`, `Value`)
//!
//! - **Execution** (`execution`): the pull-based (volcano-style) query
//!   executor kernel, a `PlanNode` tree, and an optimizer rewrite pass
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use crabdb::buffer::BufferPoolManager;
//! use crabdb::storage::disk::DiskManager;
//! use crabdb::storage::page::TablePage;
//! use crabdb::common::PageId;
//!
//! // Create a disk manager for a database file
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//!
//! // Create a buffer pool with 100 frames and LRU-2 replacement
//! let bpm = BufferPoolManager::new(100, 2, disk_manager);
//!
//! // Allocate a new page
//! let page_id = bpm.new_page().unwrap();
//!
//! // Write data to the page
//! {
//!     let mut guard = bpm.checked_write_page(page_id).unwrap().unwrap();
//!     let mut page = TablePage::new(guard.data_mut());
//!     page.init(page_id, 1); // table_id = 1
//!     page.insert_tuple(b"Hello, World!").unwrap();
//! }
//!
//! // Flush changes to disk
//! bpm.flush_page(page_id).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod concurrency;
pub mod execution;
pub mod index;
pub mod storage;
pub mod tuple;
pub mod txn;

// Re-export commonly used types at the crate root
pub use common::{CrabError, PageId, RecordId, Result, SlotId};
