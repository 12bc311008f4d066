//! Hierarchical multi-mode locking, enforcing strict two-phase locking
//! across isolation levels. `LockManager` is the only writer of a
//! transaction's lock sets; operators call it for every row/table they
//! touch and let it decide compatibility, upgrades, and deadlock victims.

mod lock_manager;

pub use lock_manager::LockManager;
