//! Table/index metadata lookup for the executor kernel.
//!
//! A production catalog would itself be a table, persisted through the
//! buffer pool like any other relation. That is explicitly out of scope
//! here: `SimpleCatalog` is an in-memory registry good enough to hand
//! executors the `TableHeap`/`BTreeIndex`/`Schema` handles they need.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{CrabError, Oid, Result};
use crate::index::BTreeIndex;
use crate::storage::TableHeap;
use crate::tuple::Schema;

/// Metadata about one index defined over a table: which table it indexes,
/// and which (single) column of that table supplies the B+ tree key.
///
/// The underlying `BTreeIndex` only stores `u32` keys, so an index can
/// only be built over a column whose values fit in one: in practice,
/// `DataType::Integer`.
#[derive(Clone)]
pub struct IndexInfo {
    pub oid: Oid,
    pub name: String,
    pub table_oid: Oid,
    pub key_column: usize,
    pub index: Arc<BTreeIndex>,
}

/// Narrow lookup surface executors need. Kept as a trait so tests can
/// swap in a stub catalog without a buffer pool.
pub trait Catalog: Send + Sync {
    fn table_heap(&self, oid: Oid) -> Result<Arc<TableHeap>>;
    fn table_schema(&self, oid: Oid) -> Result<Arc<Schema>>;
    fn table_oid(&self, name: &str) -> Result<Oid>;
    fn indexes_on_table(&self, oid: Oid) -> Vec<IndexInfo>;
    fn index(&self, oid: Oid) -> Result<Arc<BTreeIndex>>;
}

struct TableEntry {
    name: String,
    heap: Arc<TableHeap>,
    schema: Arc<Schema>,
}

#[derive(Default)]
struct Registry {
    next_oid: u32,
    tables: HashMap<Oid, TableEntry>,
    table_names: HashMap<String, Oid>,
    indexes: HashMap<Oid, IndexInfo>,
    indexes_by_table: HashMap<Oid, Vec<Oid>>,
}

/// In-memory catalog, mirroring the buffer pool's "reachable by id"
/// page-table pattern but keyed by `Oid` instead of `PageId`.
pub struct SimpleCatalog {
    registry: Mutex<Registry>,
}

impl SimpleCatalog {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn create_table(
        &self,
        name: impl Into<String>,
        schema: Arc<Schema>,
        heap: Arc<TableHeap>,
    ) -> Result<Oid> {
        let name = name.into();
        let mut registry = self.registry.lock();
        if registry.table_names.contains_key(&name) {
            return Err(CrabError::TableAlreadyExists(heap.table_id()));
        }
        let oid = Oid::new(registry.next_oid);
        registry.next_oid += 1;
        registry.table_names.insert(name.clone(), oid);
        registry.tables.insert(
            oid,
            TableEntry {
                name,
                heap,
                schema,
            },
        );
        Ok(oid)
    }

    pub fn create_index(
        &self,
        name: impl Into<String>,
        table_oid: Oid,
        key_column: usize,
        index: Arc<BTreeIndex>,
    ) -> Result<Oid> {
        let mut registry = self.registry.lock();
        if !registry.tables.contains_key(&table_oid) {
            return Err(CrabError::CatalogNotFound(table_oid));
        }
        let oid = Oid::new(registry.next_oid);
        registry.next_oid += 1;
        registry.indexes.insert(
            oid,
            IndexInfo {
                oid,
                name: name.into(),
                table_oid,
                key_column,
                index,
            },
        );
        registry.indexes_by_table.entry(table_oid).or_default().push(oid);
        Ok(oid)
    }

    pub fn table_name(&self, oid: Oid) -> Result<String> {
        self.registry
            .lock()
            .tables
            .get(&oid)
            .map(|e| e.name.clone())
            .ok_or(CrabError::CatalogNotFound(oid))
    }
}

impl Default for SimpleCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for SimpleCatalog {
    fn table_heap(&self, oid: Oid) -> Result<Arc<TableHeap>> {
        self.registry
            .lock()
            .tables
            .get(&oid)
            .map(|e| Arc::clone(&e.heap))
            .ok_or(CrabError::CatalogNotFound(oid))
    }

    fn table_schema(&self, oid: Oid) -> Result<Arc<Schema>> {
        self.registry
            .lock()
            .tables
            .get(&oid)
            .map(|e| Arc::clone(&e.schema))
            .ok_or(CrabError::CatalogNotFound(oid))
    }

    fn table_oid(&self, name: &str) -> Result<Oid> {
        self.registry
            .lock()
            .table_names
            .get(name)
            .copied()
            .ok_or(CrabError::CatalogNotFound(Oid::new(u32::MAX)))
    }

    fn indexes_on_table(&self, oid: Oid) -> Vec<IndexInfo> {
        let registry = self.registry.lock();
        registry
            .indexes_by_table
            .get(&oid)
            .into_iter()
            .flatten()
            .filter_map(|idx_oid| registry.indexes.get(idx_oid).cloned())
            .collect()
    }

    fn index(&self, oid: Oid) -> Result<Arc<BTreeIndex>> {
        self.registry
            .lock()
            .indexes
            .get(&oid)
            .map(|e| Arc::clone(&e.index))
            .ok_or(CrabError::CatalogNotFound(oid))
    }
}
