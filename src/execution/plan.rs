use std::sync::Arc;

use crate::catalog::Catalog;
use crate::common::{Oid, Result};
use crate::tuple::Schema;

use super::aggregation::{AggregateExpr, AggregationExecutor};
use super::dml::{DeleteExecutor, InsertExecutor, UpdateExecutor};
use super::executor::Executor;
use super::expression::Expr;
use super::index_scan::IndexScanExecutor;
use super::join::{HashJoinExecutor, JoinType, NestedLoopJoinExecutor};
use super::limit::LimitExecutor;
use super::seq_scan::SeqScanExecutor;
use super::sort::{OrderByExpr, SortExecutor};
use super::topn::TopNExecutor;

/// A logical plan tree, built up by a caller (a SQL planner is out of
/// scope) and turned into an executor tree via `build`. Kept separate
/// from `Executor` so the optimizer can rewrite it without running
/// anything.
pub enum PlanNode {
    SeqScan {
        table_oid: Oid,
    },
    IndexScan {
        table_oid: Oid,
        index_oid: Oid,
        start_key: Option<u32>,
        end_key: Option<u32>,
    },
    Insert {
        table_oid: Oid,
        child: Box<PlanNode>,
    },
    Update {
        table_oid: Oid,
        child: Box<PlanNode>,
        target_expressions: Vec<Expr>,
    },
    Delete {
        table_oid: Oid,
        child: Box<PlanNode>,
    },
    NestedLoopJoin {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        predicate: Expr,
        join_type: JoinType,
    },
    HashJoin {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        left_key: Vec<Expr>,
        right_key: Vec<Expr>,
        join_type: JoinType,
    },
    Aggregation {
        child: Box<PlanNode>,
        group_by: Vec<Expr>,
        aggregates: Vec<AggregateExpr>,
        schema: Arc<Schema>,
    },
    Sort {
        child: Box<PlanNode>,
        order_by: Vec<OrderByExpr>,
    },
    TopN {
        child: Box<PlanNode>,
        order_by: Vec<OrderByExpr>,
        n: usize,
    },
    Limit {
        child: Box<PlanNode>,
        n: usize,
    },
}

impl PlanNode {
    pub fn build(self, catalog: &dyn Catalog) -> Result<Box<dyn Executor>> {
        Ok(match self {
            PlanNode::SeqScan { table_oid } => {
                Box::new(SeqScanExecutor::new(catalog, table_oid)?)
            }
            PlanNode::IndexScan {
                table_oid,
                index_oid,
                start_key,
                end_key,
            } => Box::new(IndexScanExecutor::new(
                catalog, table_oid, index_oid, start_key, end_key,
            )?),
            PlanNode::Insert { table_oid, child } => {
                let child = child.build(catalog)?;
                Box::new(InsertExecutor::new(catalog, table_oid, child)?)
            }
            PlanNode::Update {
                table_oid,
                child,
                target_expressions,
            } => {
                let child = child.build(catalog)?;
                Box::new(UpdateExecutor::new(
                    catalog,
                    table_oid,
                    child,
                    target_expressions,
                )?)
            }
            PlanNode::Delete { table_oid, child } => {
                let child = child.build(catalog)?;
                Box::new(DeleteExecutor::new(catalog, table_oid, child)?)
            }
            PlanNode::NestedLoopJoin {
                left,
                right,
                predicate,
                join_type,
            } => {
                let left = left.build(catalog)?;
                let right = right.build(catalog)?;
                Box::new(NestedLoopJoinExecutor::new(left, right, predicate, join_type))
            }
            PlanNode::HashJoin {
                left,
                right,
                left_key,
                right_key,
                join_type,
            } => {
                let left = left.build(catalog)?;
                let right = right.build(catalog)?;
                Box::new(HashJoinExecutor::new(
                    left, right, left_key, right_key, join_type,
                ))
            }
            PlanNode::Aggregation {
                child,
                group_by,
                aggregates,
                schema,
            } => {
                let child = child.build(catalog)?;
                Box::new(AggregationExecutor::new(child, group_by, aggregates, schema))
            }
            PlanNode::Sort { child, order_by } => {
                let child = child.build(catalog)?;
                Box::new(SortExecutor::new(child, order_by))
            }
            PlanNode::TopN { child, order_by, n } => {
                let child = child.build(catalog)?;
                Box::new(TopNExecutor::new(child, order_by, n))
            }
            PlanNode::Limit { child, n } => {
                let child = child.build(catalog)?;
                Box::new(LimitExecutor::new(child, n))
            }
        })
    }
}
