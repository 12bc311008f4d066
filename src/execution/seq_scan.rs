use std::sync::Arc;

use crate::catalog::Catalog;
use crate::common::{CrabError, RecordId, Result};
use crate::storage::TableHeap;
use crate::tuple::{Schema, Tuple};

use super::executor::Executor;

/// Scans every live tuple of a table heap in page-chain order.
pub struct SeqScanExecutor {
    heap: Arc<TableHeap>,
    schema: Arc<Schema>,
    cursor: Vec<(RecordId, Vec<u8>)>,
    position: usize,
}

impl SeqScanExecutor {
    pub fn new(catalog: &dyn Catalog, table_oid: crate::common::Oid) -> Result<Self> {
        let heap = catalog.table_heap(table_oid)?;
        let schema = catalog.table_schema(table_oid)?;
        Ok(Self {
            heap,
            schema,
            cursor: Vec::new(),
            position: 0,
        })
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<()> {
        self.cursor = self
            .heap
            .iter()
            .collect::<Result<Vec<_>>>()?;
        self.position = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        while self.position < self.cursor.len() {
            let (rid, bytes) = &self.cursor[self.position];
            self.position += 1;
            let tuple = Tuple::from_bytes(Arc::clone(&self.schema), bytes)
                .ok_or_else(|| CrabError::IndexCorrupted("malformed tuple bytes".to_string()))?;
            return Ok(Some((tuple, *rid)));
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPoolManager;
    use crate::catalog::SimpleCatalog;
    use crate::storage::disk::DiskManager;
    use crate::tuple::{DataType, TupleBuilder};
    use tempfile::NamedTempFile;

    fn setup() -> (SimpleCatalog, crate::common::Oid, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let disk = Arc::new(DiskManager::new(file.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(10, 2, disk));
        let schema = Arc::new(Schema::builder().column("id", DataType::Integer).build());
        let heap = Arc::new(TableHeap::new(Arc::clone(&bpm), 1).unwrap());

        for i in 0..3 {
            let tuple = TupleBuilder::new(Arc::clone(&schema)).value(i as i32).build();
            heap.insert_tuple(&tuple.to_bytes().unwrap()).unwrap();
        }

        let catalog = SimpleCatalog::new();
        let oid = catalog.create_table("t", schema, heap).unwrap();
        (catalog, oid, file)
    }

    #[test]
    fn test_seq_scan_returns_all_rows() {
        let (catalog, oid, _file) = setup();
        let mut exec = SeqScanExecutor::new(&catalog, oid).unwrap();
        exec.init().unwrap();

        let mut values = Vec::new();
        while let Some((tuple, _rid)) = exec.next().unwrap() {
            values.push(tuple.value(0).unwrap().clone());
        }
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_reinit_rescans() {
        let (catalog, oid, _file) = setup();
        let mut exec = SeqScanExecutor::new(&catalog, oid).unwrap();
        exec.init().unwrap();
        assert!(exec.next().unwrap().is_some());
        exec.init().unwrap();
        let mut count = 0;
        while exec.next().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }
}
