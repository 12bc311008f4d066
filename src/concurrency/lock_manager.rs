use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::common::{AbortReason, Config, CrabError, Oid, RecordId, Result, TxnId};
use crate::txn::{IsolationLevel, LockMode, Transaction, TransactionManager, TransactionState};

fn compatible(requested: LockMode, held: LockMode) -> bool {
    use LockMode::*;
    matches!(
        (requested, held),
        (IntentionShared, IntentionShared)
            | (IntentionShared, IntentionExclusive)
            | (IntentionExclusive, IntentionShared)
            | (IntentionShared, Shared)
            | (Shared, IntentionShared)
            | (IntentionShared, SharedIntentionExclusive)
            | (SharedIntentionExclusive, IntentionShared)
            | (IntentionExclusive, IntentionExclusive)
            | (Shared, Shared)
    )
}

fn upgrade_allowed(from: LockMode, to: LockMode) -> bool {
    use LockMode::*;
    matches!(
        (from, to),
        (IntentionShared, Shared)
            | (IntentionShared, Exclusive)
            | (IntentionShared, IntentionExclusive)
            | (IntentionShared, SharedIntentionExclusive)
            | (Shared, Exclusive)
            | (Shared, SharedIntentionExclusive)
            | (IntentionExclusive, Exclusive)
            | (IntentionExclusive, SharedIntentionExclusive)
            | (SharedIntentionExclusive, Exclusive)
    )
}

struct LockRequest {
    txn_id: TxnId,
    mode: LockMode,
    granted: bool,
}

#[derive(Default)]
struct LockQueue {
    requests: VecDeque<LockRequest>,
    upgrading: Option<TxnId>,
}

/// Grant is allowed iff the request is compatible with every currently
/// granted request (wherever queued) and with every earlier still-waiting
/// request (fairness: no jumping the queue). The requester's own entry is
/// excluded by identity wherever it appears.
fn grant_allowed(queue: &LockQueue, txn_id: TxnId, mode: LockMode) -> bool {
    let self_index = match queue
        .requests
        .iter()
        .position(|r| r.txn_id == txn_id && r.mode == mode)
    {
        Some(i) => i,
        None => return false,
    };

    for (i, req) in queue.requests.iter().enumerate() {
        if req.txn_id == txn_id {
            continue;
        }
        if req.granted {
            if !compatible(mode, req.mode) {
                return false;
            }
        } else if i < self_index && !compatible(mode, req.mode) {
            return false;
        }
    }
    true
}

struct QueueHandle {
    queue: Mutex<LockQueue>,
    condvar: Condvar,
}

impl QueueHandle {
    fn new() -> Self {
        Self {
            queue: Mutex::new(LockQueue::default()),
            condvar: Condvar::new(),
        }
    }
}

struct Inner {
    table_queues: Mutex<HashMap<Oid, Arc<QueueHandle>>>,
    row_queues: Mutex<HashMap<(Oid, RecordId), Arc<QueueHandle>>>,
}

/// Table- and row-granularity multi-mode lock manager implementing strict
/// two-phase locking: table locks use the full IS/IX/S/SIX/X hierarchy, row
/// locks are S/X only and require a compatible table-level intention lock.
/// A background thread periodically scans the wait-for graph for cycles and
/// aborts the youngest transaction in any it finds, the same
/// spawn-and-join-on-drop shape as `DiskScheduler`'s worker thread.
pub struct LockManager {
    inner: Arc<Inner>,
    txn_manager: Arc<TransactionManager>,
    shutdown: Arc<AtomicBool>,
    detector_handle: Option<JoinHandle<()>>,
}

impl LockManager {
    pub fn new(txn_manager: Arc<TransactionManager>, config: &Config) -> Self {
        let inner = Arc::new(Inner {
            table_queues: Mutex::new(HashMap::new()),
            row_queues: Mutex::new(HashMap::new()),
        });
        let shutdown = Arc::new(AtomicBool::new(false));

        let detector_handle = if config.enable_deadlock_detection {
            let inner = Arc::clone(&inner);
            let txn_manager = Arc::clone(&txn_manager);
            let shutdown = Arc::clone(&shutdown);
            let interval = Duration::from_millis(config.deadlock_detection_interval_ms);
            Some(thread::spawn(move || {
                Self::run_detector(inner, txn_manager, shutdown, interval);
            }))
        } else {
            None
        };

        Self {
            inner,
            txn_manager,
            shutdown,
            detector_handle,
        }
    }

    fn get_or_create_table_queue(&self, oid: Oid) -> Arc<QueueHandle> {
        let mut queues = self.inner.table_queues.lock();
        Arc::clone(queues.entry(oid).or_insert_with(|| Arc::new(QueueHandle::new())))
    }

    fn get_or_create_row_queue(&self, oid: Oid, rid: RecordId) -> Arc<QueueHandle> {
        let mut queues = self.inner.row_queues.lock();
        Arc::clone(
            queues
                .entry((oid, rid))
                .or_insert_with(|| Arc::new(QueueHandle::new())),
        )
    }

    fn abort_err(&self, txn: &Transaction, reason: AbortReason) -> CrabError {
        txn.set_state(TransactionState::Aborted);
        CrabError::TransactionAbort(txn.txn_id(), reason)
    }

    fn check_txn_active(&self, txn: &Transaction) -> Result<()> {
        match txn.state() {
            TransactionState::Aborted | TransactionState::Committed => {
                Err(CrabError::TransactionAbort(
                    txn.txn_id(),
                    AbortReason::TransactionNotActive,
                ))
            }
            _ => Ok(()),
        }
    }

    fn check_isolation(&self, txn: &Transaction, mode: LockMode) -> Result<()> {
        match txn.isolation_level() {
            IsolationLevel::RepeatableRead => {
                if txn.state() != TransactionState::Growing {
                    return Err(self.abort_err(txn, AbortReason::LockOnShrinking));
                }
            }
            IsolationLevel::ReadCommitted => {
                if txn.state() == TransactionState::Shrinking
                    && !matches!(mode, LockMode::Shared | LockMode::IntentionShared)
                {
                    return Err(self.abort_err(txn, AbortReason::LockOnShrinking));
                }
            }
            IsolationLevel::ReadUncommitted => {
                if matches!(
                    mode,
                    LockMode::Shared | LockMode::IntentionShared | LockMode::SharedIntentionExclusive
                ) {
                    return Err(self.abort_err(txn, AbortReason::LockSharedOnReadUncommitted));
                }
                if txn.state() != TransactionState::Growing {
                    return Err(self.abort_err(txn, AbortReason::LockOnShrinking));
                }
            }
        }
        Ok(())
    }

    /// Shared wait/grant loop for both table and row queues. `current_mode`
    /// is whichever mode `txn` already holds on this resource, if any.
    fn acquire(
        &self,
        handle: &Arc<QueueHandle>,
        txn: &Transaction,
        mode: LockMode,
        current_mode: Option<LockMode>,
    ) -> Result<bool> {
        let mut queue = handle.queue.lock();

        if let Some(current_mode) = current_mode {
            if current_mode == mode {
                return Ok(true);
            }

            if queue.upgrading.is_some() && queue.upgrading != Some(txn.txn_id()) {
                drop(queue);
                return Err(self.abort_err(txn, AbortReason::UpgradeConflict));
            }
            if !upgrade_allowed(current_mode, mode) {
                drop(queue);
                return Err(self.abort_err(txn, AbortReason::IncompatibleUpgrade));
            }

            queue
                .requests
                .retain(|r| !(r.txn_id == txn.txn_id() && r.mode == current_mode));
            queue.upgrading = Some(txn.txn_id());

            let insert_at = queue
                .requests
                .iter()
                .rposition(|r| r.granted)
                .map(|i| i + 1)
                .unwrap_or(0);
            queue.requests.insert(
                insert_at,
                LockRequest {
                    txn_id: txn.txn_id(),
                    mode,
                    granted: false,
                },
            );
        } else {
            queue.requests.push_back(LockRequest {
                txn_id: txn.txn_id(),
                mode,
                granted: false,
            });
        }

        loop {
            if txn.state() == TransactionState::Aborted {
                queue.requests.retain(|r| r.txn_id != txn.txn_id());
                if queue.upgrading == Some(txn.txn_id()) {
                    queue.upgrading = None;
                }
                handle.condvar.notify_all();
                return Err(CrabError::TransactionAbort(
                    txn.txn_id(),
                    AbortReason::DeadlockVictim,
                ));
            }

            if grant_allowed(&queue, txn.txn_id(), mode) {
                for req in queue.requests.iter_mut() {
                    if req.txn_id == txn.txn_id() && req.mode == mode {
                        req.granted = true;
                    }
                }
                if queue.upgrading == Some(txn.txn_id()) {
                    queue.upgrading = None;
                }
                handle.condvar.notify_all();
                return Ok(true);
            }

            handle.condvar.wait(&mut queue);
        }
    }

    pub fn lock_table(&self, txn: &Arc<Transaction>, mode: LockMode, oid: Oid) -> Result<bool> {
        self.check_txn_active(txn)?;
        self.check_isolation(txn, mode)?;

        let handle = self.get_or_create_table_queue(oid);
        let current_mode = txn.table_lock_mode(oid);
        let granted = self.acquire(&handle, txn, mode, current_mode)?;

        if granted {
            if let Some(old_mode) = current_mode {
                if old_mode != mode {
                    txn.remove_table_lock(oid, old_mode);
                }
            }
            txn.add_table_lock(oid, mode);
        }
        Ok(granted)
    }

    pub fn unlock_table(&self, txn: &Arc<Transaction>, oid: Oid) -> Result<()> {
        let mode = txn
            .table_lock_mode(oid)
            .ok_or_else(|| self.abort_err(txn, AbortReason::AttemptedUnlockButNoLockHeld))?;

        if txn.has_row_locks_on_table(oid) {
            return Err(self.abort_err(txn, AbortReason::TableUnlockedBeforeUnlockingRows));
        }

        let handle = self.get_or_create_table_queue(oid);
        {
            let mut queue = handle.queue.lock();
            queue
                .requests
                .retain(|r| !(r.txn_id == txn.txn_id() && r.mode == mode));
            handle.condvar.notify_all();
        }
        txn.remove_table_lock(oid, mode);

        match txn.isolation_level() {
            IsolationLevel::RepeatableRead => {
                if matches!(mode, LockMode::Shared | LockMode::Exclusive) {
                    txn.set_state(TransactionState::Shrinking);
                }
            }
            IsolationLevel::ReadCommitted | IsolationLevel::ReadUncommitted => {
                if mode == LockMode::Exclusive {
                    txn.set_state(TransactionState::Shrinking);
                }
            }
        }
        Ok(())
    }

    pub fn lock_row(
        &self,
        txn: &Arc<Transaction>,
        mode: LockMode,
        oid: Oid,
        rid: RecordId,
    ) -> Result<bool> {
        if !matches!(mode, LockMode::Shared | LockMode::Exclusive) {
            return Err(self.abort_err(txn, AbortReason::AttemptedIntentionLockOnRow));
        }
        self.check_txn_active(txn)?;
        self.check_isolation(txn, mode)?;

        let has_required_table_lock = match mode {
            LockMode::Shared => txn.table_lock_mode(oid).is_some(),
            LockMode::Exclusive => matches!(
                txn.table_lock_mode(oid),
                Some(LockMode::IntentionExclusive)
                    | Some(LockMode::Exclusive)
                    | Some(LockMode::SharedIntentionExclusive)
            ),
            _ => unreachable!(),
        };
        if !has_required_table_lock {
            return Err(self.abort_err(txn, AbortReason::TableLockNotPresent));
        }

        let handle = self.get_or_create_row_queue(oid, rid);
        let current_mode = txn.row_lock_mode(oid, rid);
        let granted = self.acquire(&handle, txn, mode, current_mode)?;

        if granted {
            if let Some(old_mode) = current_mode {
                if old_mode != mode {
                    txn.remove_row_lock(oid, rid, old_mode);
                }
            }
            txn.add_row_lock(oid, rid, mode);
        }
        Ok(granted)
    }

    pub fn unlock_row(&self, txn: &Arc<Transaction>, oid: Oid, rid: RecordId) -> Result<()> {
        let mode = txn
            .row_lock_mode(oid, rid)
            .ok_or_else(|| self.abort_err(txn, AbortReason::AttemptedUnlockButNoLockHeld))?;

        let handle = self.get_or_create_row_queue(oid, rid);
        {
            let mut queue = handle.queue.lock();
            queue
                .requests
                .retain(|r| !(r.txn_id == txn.txn_id() && r.mode == mode));
            handle.condvar.notify_all();
        }
        txn.remove_row_lock(oid, rid, mode);

        match txn.isolation_level() {
            IsolationLevel::RepeatableRead => {
                txn.set_state(TransactionState::Shrinking);
            }
            IsolationLevel::ReadCommitted | IsolationLevel::ReadUncommitted => {
                if mode == LockMode::Exclusive {
                    txn.set_state(TransactionState::Shrinking);
                }
            }
        }
        Ok(())
    }

    fn run_detector(
        inner: Arc<Inner>,
        txn_manager: Arc<TransactionManager>,
        shutdown: Arc<AtomicBool>,
        interval: Duration,
    ) {
        while !shutdown.load(Ordering::Relaxed) {
            thread::sleep(interval);
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            Self::detect_and_resolve(&inner, &txn_manager);
        }
    }

    fn snapshot_edges(inner: &Inner) -> HashMap<TxnId, (HashSet<TxnId>, Vec<Arc<QueueHandle>>)> {
        let mut graph: HashMap<TxnId, HashSet<TxnId>> = HashMap::new();
        let mut touched: HashMap<TxnId, Vec<Arc<QueueHandle>>> = HashMap::new();

        let accumulate = |handle: &Arc<QueueHandle>,
                           graph: &mut HashMap<TxnId, HashSet<TxnId>>,
                           touched: &mut HashMap<TxnId, Vec<Arc<QueueHandle>>>| {
            let queue = handle.queue.lock();
            let granted: Vec<TxnId> = queue
                .requests
                .iter()
                .filter(|r| r.granted)
                .map(|r| r.txn_id)
                .collect();
            for req in queue.requests.iter() {
                touched.entry(req.txn_id).or_default().push(Arc::clone(handle));
                if !req.granted {
                    let waits_for = graph.entry(req.txn_id).or_default();
                    for &holder in &granted {
                        if holder != req.txn_id {
                            waits_for.insert(holder);
                        }
                    }
                }
            }
        };

        for handle in inner.table_queues.lock().values() {
            accumulate(handle, &mut graph, &mut touched);
        }
        for handle in inner.row_queues.lock().values() {
            accumulate(handle, &mut graph, &mut touched);
        }

        let mut merged = HashMap::new();
        for (txn_id, handles) in touched {
            let waits_for = graph.remove(&txn_id).unwrap_or_default();
            merged.insert(txn_id, (waits_for, handles));
        }
        merged
    }

    fn detect_and_resolve(inner: &Arc<Inner>, txn_manager: &Arc<TransactionManager>) {
        let snapshot = Self::snapshot_edges(inner);
        let graph: HashMap<TxnId, HashSet<TxnId>> = snapshot
            .iter()
            .map(|(&txn_id, (waits_for, _))| (txn_id, waits_for.clone()))
            .collect();

        if let Some(cycle) = find_cycle(&graph) {
            let victim = *cycle.iter().max().unwrap();
            if let Some(txn) = txn_manager.get(victim) {
                txn.set_state(TransactionState::Aborted);
            }
            if let Some((_, handles)) = snapshot.get(&victim) {
                for handle in handles {
                    handle.condvar.notify_all();
                }
            }
        }
    }
}

impl Drop for LockManager {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.detector_handle.take() {
            let _ = handle.join();
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    White,
    Gray,
    Black,
}

/// DFS cycle search over a wait-for graph snapshot. Node/neighbor
/// iteration order is sorted for determinism across runs.
fn find_cycle(graph: &HashMap<TxnId, HashSet<TxnId>>) -> Option<Vec<TxnId>> {
    let mut color: HashMap<TxnId, VisitState> = HashMap::new();
    let mut stack: Vec<TxnId> = Vec::new();

    let mut nodes: Vec<TxnId> = graph.keys().copied().collect();
    nodes.sort();

    for start in nodes {
        if color.get(&start).copied().unwrap_or(VisitState::White) == VisitState::White {
            if let Some(cycle) = dfs_visit(start, graph, &mut color, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

fn dfs_visit(
    node: TxnId,
    graph: &HashMap<TxnId, HashSet<TxnId>>,
    color: &mut HashMap<TxnId, VisitState>,
    stack: &mut Vec<TxnId>,
) -> Option<Vec<TxnId>> {
    color.insert(node, VisitState::Gray);
    stack.push(node);

    if let Some(neighbors) = graph.get(&node) {
        let mut sorted: Vec<TxnId> = neighbors.iter().copied().collect();
        sorted.sort();

        for next in sorted {
            match color.get(&next).copied().unwrap_or(VisitState::White) {
                VisitState::White => {
                    if let Some(cycle) = dfs_visit(next, graph, color, stack) {
                        return Some(cycle);
                    }
                }
                VisitState::Gray => {
                    let start_index = stack.iter().position(|&n| n == next).unwrap();
                    return Some(stack[start_index..].to_vec());
                }
                VisitState::Black => {}
            }
        }
    }

    stack.pop();
    color.insert(node, VisitState::Black);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{PageId, SlotId};
    use std::sync::Barrier;

    fn new_manager() -> (Arc<TransactionManager>, LockManager) {
        let txn_manager = Arc::new(TransactionManager::new());
        let config = Config {
            enable_deadlock_detection: false,
            ..Config::default()
        };
        let lock_manager = LockManager::new(Arc::clone(&txn_manager), &config);
        (txn_manager, lock_manager)
    }

    #[test]
    fn test_simple_table_lock_grant() {
        let (txn_manager, lm) = new_manager();
        let txn = txn_manager.begin(IsolationLevel::RepeatableRead);
        let oid = Oid::new(1);

        assert!(lm.lock_table(&txn, LockMode::Shared, oid).unwrap());
        assert_eq!(txn.table_lock_mode(oid), Some(LockMode::Shared));

        assert!(lm.lock_table(&txn, LockMode::Shared, oid).unwrap());

        lm.unlock_table(&txn, oid).unwrap();
        assert_eq!(txn.table_lock_mode(oid), None);
        assert_eq!(txn.state(), TransactionState::Shrinking);
    }

    #[test]
    fn test_incompatible_locks_block_until_released() {
        let (txn_manager, lm) = new_manager();
        let lm = Arc::new(lm);
        let oid = Oid::new(1);

        let txn_a = txn_manager.begin(IsolationLevel::RepeatableRead);
        assert!(lm.lock_table(&txn_a, LockMode::Exclusive, oid).unwrap());

        let txn_b = txn_manager.begin(IsolationLevel::RepeatableRead);
        let lm2 = Arc::clone(&lm);
        let txn_b2 = Arc::clone(&txn_b);
        let barrier = Arc::new(Barrier::new(2));
        let barrier2 = Arc::clone(&barrier);

        let handle = thread::spawn(move || {
            barrier2.wait();
            lm2.lock_table(&txn_b2, LockMode::Shared, oid).unwrap()
        });

        barrier.wait();
        thread::sleep(Duration::from_millis(50));
        lm.unlock_table(&txn_a, oid).unwrap();

        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_upgrade_lattice_rejects_bad_upgrade() {
        let (txn_manager, lm) = new_manager();
        let txn = txn_manager.begin(IsolationLevel::RepeatableRead);
        let oid = Oid::new(1);

        lm.lock_table(&txn, LockMode::SharedIntentionExclusive, oid)
            .unwrap();
        let err = lm.lock_table(&txn, LockMode::Shared, oid).unwrap_err();
        assert!(matches!(
            err,
            CrabError::TransactionAbort(_, AbortReason::IncompatibleUpgrade)
        ));
    }

    #[test]
    fn test_row_lock_requires_table_intention() {
        let (txn_manager, lm) = new_manager();
        let txn = txn_manager.begin(IsolationLevel::RepeatableRead);
        let oid = Oid::new(1);
        let rid = RecordId::new(PageId::new(0), SlotId::new(0));

        let err = lm.lock_row(&txn, LockMode::Shared, oid, rid).unwrap_err();
        assert!(matches!(
            err,
            CrabError::TransactionAbort(_, AbortReason::TableLockNotPresent)
        ));

        lm.lock_table(&txn, LockMode::IntentionShared, oid).unwrap();
        assert!(lm.lock_row(&txn, LockMode::Shared, oid, rid).unwrap());
    }

    #[test]
    fn test_table_unlock_before_row_unlock_aborts() {
        let (txn_manager, lm) = new_manager();
        let txn = txn_manager.begin(IsolationLevel::RepeatableRead);
        let oid = Oid::new(1);
        let rid = RecordId::new(PageId::new(0), SlotId::new(0));

        lm.lock_table(&txn, LockMode::IntentionExclusive, oid).unwrap();
        lm.lock_row(&txn, LockMode::Exclusive, oid, rid).unwrap();

        let err = lm.unlock_table(&txn, oid).unwrap_err();
        assert!(matches!(
            err,
            CrabError::TransactionAbort(_, AbortReason::TableUnlockedBeforeUnlockingRows)
        ));
    }

    #[test]
    fn test_read_uncommitted_rejects_shared() {
        let (txn_manager, lm) = new_manager();
        let txn = txn_manager.begin(IsolationLevel::ReadUncommitted);
        let oid = Oid::new(1);

        let err = lm.lock_table(&txn, LockMode::Shared, oid).unwrap_err();
        assert!(matches!(
            err,
            CrabError::TransactionAbort(_, AbortReason::LockSharedOnReadUncommitted)
        ));
    }

    #[test]
    fn test_deadlock_detector_aborts_youngest() {
        let txn_manager = Arc::new(TransactionManager::new());
        let config = Config {
            enable_deadlock_detection: true,
            deadlock_detection_interval_ms: 20,
            ..Config::default()
        };
        let lm = Arc::new(LockManager::new(Arc::clone(&txn_manager), &config));

        let oid_a = Oid::new(1);
        let oid_b = Oid::new(2);
        let txn_1 = txn_manager.begin(IsolationLevel::RepeatableRead);
        let txn_2 = txn_manager.begin(IsolationLevel::RepeatableRead);

        lm.lock_table(&txn_1, LockMode::Exclusive, oid_a).unwrap();
        lm.lock_table(&txn_2, LockMode::Exclusive, oid_b).unwrap();

        let lm2 = Arc::clone(&lm);
        let txn_1b = Arc::clone(&txn_1);
        let h1 = thread::spawn(move || lm2.lock_table(&txn_1b, LockMode::Exclusive, oid_b));

        thread::sleep(Duration::from_millis(10));

        let lm3 = Arc::clone(&lm);
        let txn_2b = Arc::clone(&txn_2);
        let h2 = thread::spawn(move || lm3.lock_table(&txn_2b, LockMode::Exclusive, oid_a));

        // txn_2 (younger) should be chosen as victim and its wait should
        // resolve to an error rather than hang forever.
        let r2 = h2.join().unwrap();
        assert!(r2.is_err());

        lm.unlock_table(&txn_1, oid_a).unwrap();
        lm.unlock_table(&txn_1, oid_b).unwrap();
        let r1 = h1.join().unwrap();
        assert!(r1.unwrap());
    }
}
