use std::sync::Arc;

use crabdb::buffer::BufferPoolManager;
use crabdb::catalog::{Catalog, SimpleCatalog};
use crabdb::common::RecordId;
use crabdb::execution::{collect_all, Executor, InsertExecutor, SeqScanExecutor};
use crabdb::index::BTreeIndex;
use crabdb::storage::disk::DiskManager;
use crabdb::storage::TableHeap;
use crabdb::tuple::{DataType, Schema, Tuple, TupleBuilder};

/// Feeds a fixed set of in-memory tuples to a DML executor, standing in
/// for a VALUES clause or an upstream plan subtree.
struct ValuesExecutor {
    schema: Arc<Schema>,
    rows: Vec<Tuple>,
    position: usize,
}

impl Executor for ValuesExecutor {
    fn init(&mut self) -> crabdb::Result<()> {
        self.position = 0;
        Ok(())
    }

    fn next(&mut self) -> crabdb::Result<Option<(Tuple, RecordId)>> {
        if self.position >= self.rows.len() {
            return Ok(None);
        }
        let tuple = self.rows[self.position].clone();
        self.position += 1;
        Ok(Some((tuple, crabdb::execution::synthetic_rid())))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

fn main() {
    env_logger::init();
    println!("crabdb - a disk-oriented teaching RDBMS in Rust");
    println!("================================================\n");

    let db_path = "demo.db";
    let disk_manager = Arc::new(DiskManager::new(db_path).expect("failed to create disk manager"));
    println!("created disk manager for: {db_path}");

    let bpm = Arc::new(BufferPoolManager::new(10, 2, disk_manager));
    println!("created buffer pool manager with 10 frames\n");

    let schema = Arc::new(
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::VarChar(32))
            .build(),
    );
    let heap = Arc::new(TableHeap::new(Arc::clone(&bpm), 1).expect("failed to create table heap"));
    let index = Arc::new(BTreeIndex::new(Arc::clone(&bpm)).expect("failed to create index"));

    let catalog = SimpleCatalog::new();
    let table_oid = catalog
        .create_table("greetings", Arc::clone(&schema), heap)
        .expect("failed to register table");
    let index_oid = catalog
        .create_index("greetings_id_idx", table_oid, 0, index)
        .expect("failed to register index");
    println!("created table 'greetings' (oid {table_oid:?}) with index (oid {index_oid:?})\n");

    let rows = vec![
        TupleBuilder::new(Arc::clone(&schema))
            .value(1i32)
            .value("Hello, World!")
            .build(),
        TupleBuilder::new(Arc::clone(&schema))
            .value(2i32)
            .value("This is crabdb")
            .build(),
        TupleBuilder::new(Arc::clone(&schema))
            .value(3i32)
            .value("A teaching RDBMS in Rust")
            .build(),
    ];
    let source = Box::new(ValuesExecutor {
        schema: Arc::clone(&schema),
        rows,
        position: 0,
    });

    let mut insert = InsertExecutor::new(&catalog, table_oid, source).expect("failed to plan insert");
    insert.init().expect("failed to init insert");
    let (count_tuple, _) = insert
        .next()
        .expect("insert failed")
        .expect("insert produced no count row");
    println!("inserted {:?} rows\n", count_tuple.value(0).unwrap());

    let mut scan = SeqScanExecutor::new(&catalog, table_oid).expect("failed to plan scan");
    scan.init().expect("failed to init scan");
    println!("scanning 'greetings':");
    for tuple in collect_all(&mut scan).expect("scan failed") {
        println!("  - {:?}", tuple.values());
    }

    std::fs::remove_file(db_path).ok();
    println!("\ndemo completed successfully!");
}
