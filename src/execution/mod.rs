//! Pull-based (volcano-style) query executor kernel. A `PlanNode` tree is
//! optimized, then built into a tree of `Executor` trait objects that
//! `init`/`next` pull rows one at a time, each depending only on its
//! children's `Executor` interface.

mod aggregation;
mod dml;
mod executor;
mod expression;
mod index_scan;
mod join;
mod limit;
mod optimizer;
mod plan;
mod seq_scan;
mod sort;
mod topn;

pub use aggregation::{AggregateExpr, AggregateFunction, AggregationExecutor};
pub use dml::{DeleteExecutor, InsertExecutor, UpdateExecutor};
pub use executor::{collect_all, synthetic_rid, Executor};
pub use expression::{BinaryOp, Expr, Side};
pub use index_scan::IndexScanExecutor;
pub use join::{HashJoinExecutor, JoinType, NestedLoopJoinExecutor};
pub use limit::LimitExecutor;
pub use optimizer::optimize;
pub use plan::PlanNode;
pub use seq_scan::SeqScanExecutor;
pub use sort::{Direction, OrderByExpr, SortExecutor};
pub use topn::TopNExecutor;
