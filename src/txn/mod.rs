//! Transaction state external to the lock manager: isolation level, the
//! GROWING/SHRINKING/COMMITTED/ABORTED state machine, and the lock sets a
//! transaction currently holds. The lock manager only ever reads and
//! writes through this narrow interface.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{Oid, RecordId, TxnId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

/// The five hierarchical lock modes. Row locks are only ever `Shared` or
/// `Exclusive`; the intention modes exist at table granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    IntentionShared,
    IntentionExclusive,
    Shared,
    SharedIntentionExclusive,
    Exclusive,
}

#[derive(Debug, Default)]
struct LockSets {
    table_locks: HashMap<Oid, LockMode>,
    row_locks: HashMap<(Oid, RecordId), LockMode>,
}

/// A single transaction's external view: its id, isolation level, state,
/// and the locks it currently holds. Lock-set mutation goes through the
/// transaction's own latch so lock manager and operator threads can touch
/// different transactions concurrently.
pub struct Transaction {
    txn_id: TxnId,
    isolation_level: IsolationLevel,
    state: Mutex<TransactionState>,
    locks: Mutex<LockSets>,
}

impl Transaction {
    pub fn new(txn_id: TxnId, isolation_level: IsolationLevel) -> Self {
        Self {
            txn_id,
            isolation_level,
            state: Mutex::new(TransactionState::Growing),
            locks: Mutex::new(LockSets::default()),
        }
    }

    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }

    pub fn table_lock_mode(&self, oid: Oid) -> Option<LockMode> {
        self.locks.lock().table_locks.get(&oid).copied()
    }

    pub fn add_table_lock(&self, oid: Oid, mode: LockMode) {
        self.locks.lock().table_locks.insert(oid, mode);
    }

    pub fn remove_table_lock(&self, oid: Oid, mode: LockMode) {
        let mut locks = self.locks.lock();
        if let Entry::Occupied(entry) = locks.table_locks.entry(oid) {
            if *entry.get() == mode {
                entry.remove();
            }
        }
    }

    pub fn row_lock_mode(&self, oid: Oid, rid: RecordId) -> Option<LockMode> {
        self.locks.lock().row_locks.get(&(oid, rid)).copied()
    }

    pub fn add_row_lock(&self, oid: Oid, rid: RecordId, mode: LockMode) {
        self.locks.lock().row_locks.insert((oid, rid), mode);
    }

    pub fn remove_row_lock(&self, oid: Oid, rid: RecordId, mode: LockMode) {
        let mut locks = self.locks.lock();
        if let Entry::Occupied(entry) = locks.row_locks.entry((oid, rid)) {
            if *entry.get() == mode {
                entry.remove();
            }
        }
    }

    pub fn has_row_locks_on_table(&self, oid: Oid) -> bool {
        self.locks.lock().row_locks.keys().any(|(t, _)| *t == oid)
    }

    /// Every row this transaction holds an S or X lock on for `oid`.
    pub fn rows_locked_on_table(&self, oid: Oid) -> HashSet<RecordId> {
        self.locks
            .lock()
            .row_locks
            .keys()
            .filter(|(t, _)| *t == oid)
            .map(|(_, rid)| *rid)
            .collect()
    }
}

/// Allocates transaction ids and keeps every live `Transaction` reachable
/// by id, the way `BufferPoolManager` keeps every resident page reachable
/// by its page table.
pub struct TransactionManager {
    next_txn_id: AtomicU64,
    transactions: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            next_txn_id: AtomicU64::new(0),
            transactions: Mutex::new(HashMap::new()),
        }
    }

    pub fn begin(&self, isolation_level: IsolationLevel) -> Arc<Transaction> {
        let txn_id = TxnId::new(self.next_txn_id.fetch_add(1, Ordering::SeqCst));
        let txn = Arc::new(Transaction::new(txn_id, isolation_level));
        self.transactions.lock().insert(txn_id, Arc::clone(&txn));
        txn
    }

    pub fn get(&self, txn_id: TxnId) -> Option<Arc<Transaction>> {
        self.transactions.lock().get(&txn_id).cloned()
    }

    pub fn commit(&self, txn: &Transaction) {
        txn.set_state(TransactionState::Committed);
    }

    pub fn abort(&self, txn: &Transaction) {
        txn.set_state(TransactionState::Aborted);
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{PageId, SlotId};

    #[test]
    fn test_begin_assigns_unique_ids() {
        let mgr = TransactionManager::new();
        let t1 = mgr.begin(IsolationLevel::RepeatableRead);
        let t2 = mgr.begin(IsolationLevel::RepeatableRead);
        assert_ne!(t1.txn_id(), t2.txn_id());
        assert_eq!(t1.state(), TransactionState::Growing);
    }

    #[test]
    fn test_table_lock_set_roundtrip() {
        let txn = Transaction::new(TxnId::new(0), IsolationLevel::RepeatableRead);
        let oid = Oid::new(1);
        assert_eq!(txn.table_lock_mode(oid), None);

        txn.add_table_lock(oid, LockMode::Shared);
        assert_eq!(txn.table_lock_mode(oid), Some(LockMode::Shared));

        txn.remove_table_lock(oid, LockMode::Shared);
        assert_eq!(txn.table_lock_mode(oid), None);
    }

    #[test]
    fn test_row_locks_on_table() {
        let txn = Transaction::new(TxnId::new(0), IsolationLevel::ReadCommitted);
        let oid = Oid::new(1);
        let rid = RecordId::new(PageId::new(3), SlotId::new(0));

        assert!(!txn.has_row_locks_on_table(oid));
        txn.add_row_lock(oid, rid, LockMode::Exclusive);
        assert!(txn.has_row_locks_on_table(oid));
        assert_eq!(txn.rows_locked_on_table(oid).len(), 1);

        txn.remove_row_lock(oid, rid, LockMode::Exclusive);
        assert!(!txn.has_row_locks_on_table(oid));
    }

    #[test]
    fn test_transaction_manager_lookup() {
        let mgr = TransactionManager::new();
        let txn = mgr.begin(IsolationLevel::ReadUncommitted);
        let found = mgr.get(txn.txn_id()).unwrap();
        assert_eq!(found.txn_id(), txn.txn_id());

        mgr.commit(&txn);
        assert_eq!(txn.state(), TransactionState::Committed);
    }
}
