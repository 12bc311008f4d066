use std::sync::Arc;

use crate::catalog::{Catalog, IndexInfo};
use crate::common::{CrabError, Oid, RecordId, Result};
use crate::storage::TableHeap;
use crate::tuple::{DataType, Schema, Tuple, TupleBuilder, Value};

use super::executor::{synthetic_rid, Executor};
use super::expression::Expr;

fn count_schema() -> Arc<Schema> {
    Arc::new(Schema::builder().column("count", DataType::BigInt).build())
}

fn count_tuple(schema: &Arc<Schema>, count: i64) -> Tuple {
    TupleBuilder::new(Arc::clone(schema)).value(count).build()
}

/// Extracts the B+ tree key for an index entry from a tuple, per the
/// index's single key column. The underlying tree only stores `u32`
/// keys, so the column's value must be (coercible to) a 32-bit integer.
fn index_key(tuple: &Tuple, info: &IndexInfo) -> Result<u32> {
    match tuple.value(info.key_column) {
        Some(Value::Integer(v)) => Ok(*v as u32),
        Some(Value::SmallInt(v)) => Ok(*v as u32),
        Some(Value::TinyInt(v)) => Ok(*v as u32),
        _ => Err(CrabError::IndexCorrupted(format!(
            "index {} key column {} is not an integer value",
            info.name, info.key_column
        ))),
    }
}

/// Drains its child; for each tuple, inserts into the heap and keeps
/// every index on the table current. Emits exactly one count tuple.
pub struct InsertExecutor {
    child: Box<dyn Executor>,
    heap: Arc<TableHeap>,
    indexes: Vec<IndexInfo>,
    schema: Arc<Schema>,
    done: bool,
}

impl InsertExecutor {
    pub fn new(catalog: &dyn Catalog, table_oid: Oid, child: Box<dyn Executor>) -> Result<Self> {
        Ok(Self {
            child,
            heap: catalog.table_heap(table_oid)?,
            indexes: catalog.indexes_on_table(table_oid),
            schema: count_schema(),
            done: false,
        })
    }
}

impl Executor for InsertExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut count: i64 = 0;
        while let Some((tuple, _rid)) = self.child.next()? {
            let bytes = tuple
                .to_bytes()
                .ok_or_else(|| CrabError::IndexCorrupted("tuple failed to serialize".into()))?;
            let rid = self.heap.insert_tuple(&bytes)?;
            for info in &self.indexes {
                let key = index_key(&tuple, info)?;
                info.index.insert(key, rid)?;
            }
            count += 1;
        }

        Ok(Some((count_tuple(&self.schema, count), synthetic_rid())))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

/// Drains its child; for each (tuple, rid): marks the old heap slot
/// deleted, computes a new tuple from `target_expressions` evaluated
/// over the old tuple, inserts it (new rid), and re-keys every index from
/// old-key/old-rid to new-key/new-rid. One-tuple count output.
pub struct UpdateExecutor {
    child: Box<dyn Executor>,
    heap: Arc<TableHeap>,
    indexes: Vec<IndexInfo>,
    target_expressions: Vec<Expr>,
    schema: Arc<Schema>,
    done: bool,
}

impl UpdateExecutor {
    pub fn new(
        catalog: &dyn Catalog,
        table_oid: Oid,
        child: Box<dyn Executor>,
        target_expressions: Vec<Expr>,
    ) -> Result<Self> {
        Ok(Self {
            child,
            heap: catalog.table_heap(table_oid)?,
            indexes: catalog.indexes_on_table(table_oid),
            target_expressions,
            schema: count_schema(),
            done: false,
        })
    }
}

impl Executor for UpdateExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut count: i64 = 0;
        while let Some((old_tuple, old_rid)) = self.child.next()? {
            let old_keys: Vec<u32> = self
                .indexes
                .iter()
                .map(|info| index_key(&old_tuple, info))
                .collect::<Result<_>>()?;

            let new_values: Vec<Value> = self
                .target_expressions
                .iter()
                .map(|expr| expr.evaluate(Some(&old_tuple), None))
                .collect();
            let new_tuple = Tuple::new(Arc::clone(old_tuple.schema()), new_values);

            self.heap.delete_tuple(old_rid)?;
            let new_bytes = new_tuple
                .to_bytes()
                .ok_or_else(|| CrabError::IndexCorrupted("tuple failed to serialize".into()))?;
            let new_rid = self.heap.insert_tuple(&new_bytes)?;

            for (info, old_key) in self.indexes.iter().zip(old_keys) {
                info.index.delete(old_key)?;
                let new_key = index_key(&new_tuple, info)?;
                info.index.insert(new_key, new_rid)?;
            }

            count += 1;
        }

        Ok(Some((count_tuple(&self.schema, count), synthetic_rid())))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

/// Drains its child; for each (tuple, rid), marks the heap slot deleted
/// and removes every index entry keyed off it. One-tuple count output.
pub struct DeleteExecutor {
    child: Box<dyn Executor>,
    heap: Arc<TableHeap>,
    indexes: Vec<IndexInfo>,
    schema: Arc<Schema>,
    done: bool,
}

impl DeleteExecutor {
    pub fn new(catalog: &dyn Catalog, table_oid: Oid, child: Box<dyn Executor>) -> Result<Self> {
        Ok(Self {
            child,
            heap: catalog.table_heap(table_oid)?,
            indexes: catalog.indexes_on_table(table_oid),
            schema: count_schema(),
            done: false,
        })
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut count: i64 = 0;
        while let Some((tuple, rid)) = self.child.next()? {
            for info in &self.indexes {
                let key = index_key(&tuple, info)?;
                info.index.delete(key)?;
            }
            self.heap.delete_tuple(rid)?;
            count += 1;
        }

        Ok(Some((count_tuple(&self.schema, count), synthetic_rid())))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
