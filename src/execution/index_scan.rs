use std::sync::Arc;

use crate::catalog::Catalog;
use crate::common::{CrabError, Oid, RecordId, Result};
use crate::index::{BTreeIndex, BTreeIterator};
use crate::storage::TableHeap;
use crate::tuple::{Schema, Tuple};

use super::executor::Executor;

/// Scans a B+ tree index in key order, resolving each matching rid
/// against the owning table's heap.
pub struct IndexScanExecutor {
    index: Arc<BTreeIndex>,
    heap: Arc<TableHeap>,
    schema: Arc<Schema>,
    start_key: Option<u32>,
    end_key: Option<u32>,
    iter: Option<BTreeIterator>,
}

impl IndexScanExecutor {
    pub fn new(
        catalog: &dyn Catalog,
        table_oid: Oid,
        index_oid: Oid,
        start_key: Option<u32>,
        end_key: Option<u32>,
    ) -> Result<Self> {
        let index = catalog.index(index_oid)?;
        let heap = catalog.table_heap(table_oid)?;
        let schema = catalog.table_schema(table_oid)?;
        Ok(Self {
            index,
            heap,
            schema,
            start_key,
            end_key,
            iter: None,
        })
    }
}

impl Executor for IndexScanExecutor {
    fn init(&mut self) -> Result<()> {
        self.iter = Some(match self.start_key {
            Some(key) => self.index.begin_at(key)?,
            None => self.index.begin()?,
        });
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        let iter = self
            .iter
            .as_mut()
            .expect("IndexScanExecutor::next called before init");

        while let Some((key, rid)) = iter.next()? {
            if let Some(end_key) = self.end_key {
                if key > end_key {
                    return Ok(None);
                }
            }
            match self.heap.get_tuple(rid) {
                Ok(bytes) => {
                    let tuple = Tuple::from_bytes(Arc::clone(&self.schema), &bytes).ok_or_else(
                        || CrabError::IndexCorrupted("malformed tuple bytes".to_string()),
                    )?;
                    return Ok(Some((tuple, rid)));
                }
                Err(CrabError::EmptySlot(_)) | Err(CrabError::InvalidSlotId(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
