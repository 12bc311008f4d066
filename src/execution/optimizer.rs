use super::plan::PlanNode;

/// Post-order rewrite pass over a `PlanNode` tree. Currently implements
/// a single rule: `Limit(Sort(child))` collapses into `TopN(child)`, so
/// the executor never materializes and fully sorts rows beyond what the
/// limit needs.
pub fn optimize(plan: PlanNode) -> PlanNode {
    match plan {
        PlanNode::Insert { table_oid, child } => PlanNode::Insert {
            table_oid,
            child: Box::new(optimize(*child)),
        },
        PlanNode::Update {
            table_oid,
            child,
            target_expressions,
        } => PlanNode::Update {
            table_oid,
            child: Box::new(optimize(*child)),
            target_expressions,
        },
        PlanNode::Delete { table_oid, child } => PlanNode::Delete {
            table_oid,
            child: Box::new(optimize(*child)),
        },
        PlanNode::NestedLoopJoin {
            left,
            right,
            predicate,
            join_type,
        } => PlanNode::NestedLoopJoin {
            left: Box::new(optimize(*left)),
            right: Box::new(optimize(*right)),
            predicate,
            join_type,
        },
        PlanNode::HashJoin {
            left,
            right,
            left_key,
            right_key,
            join_type,
        } => PlanNode::HashJoin {
            left: Box::new(optimize(*left)),
            right: Box::new(optimize(*right)),
            left_key,
            right_key,
            join_type,
        },
        PlanNode::Aggregation {
            child,
            group_by,
            aggregates,
            schema,
        } => PlanNode::Aggregation {
            child: Box::new(optimize(*child)),
            group_by,
            aggregates,
            schema,
        },
        PlanNode::Sort { child, order_by } => PlanNode::Sort {
            child: Box::new(optimize(*child)),
            order_by,
        },
        PlanNode::TopN { child, order_by, n } => PlanNode::TopN {
            child: Box::new(optimize(*child)),
            order_by,
            n,
        },
        PlanNode::Limit { child, n } => {
            let child = optimize(*child);
            if let PlanNode::Sort {
                child: sort_child,
                order_by,
            } = child
            {
                PlanNode::TopN {
                    child: sort_child,
                    order_by,
                    n,
                }
            } else {
                PlanNode::Limit {
                    child: Box::new(child),
                    n,
                }
            }
        }
        leaf @ (PlanNode::SeqScan { .. } | PlanNode::IndexScan { .. }) => leaf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Oid;

    #[test]
    fn test_limit_over_sort_becomes_topn() {
        let plan = PlanNode::Limit {
            child: Box::new(PlanNode::Sort {
                child: Box::new(PlanNode::SeqScan {
                    table_oid: Oid::new(1),
                }),
                order_by: vec![],
            }),
            n: 5,
        };

        match optimize(plan) {
            PlanNode::TopN { n, child, .. } => {
                assert_eq!(n, 5);
                assert!(matches!(*child, PlanNode::SeqScan { .. }));
            }
            _ => panic!("expected TopN rewrite"),
        }
    }

    #[test]
    fn test_limit_over_non_sort_is_unchanged() {
        let plan = PlanNode::Limit {
            child: Box::new(PlanNode::SeqScan {
                table_oid: Oid::new(1),
            }),
            n: 5,
        };

        match optimize(plan) {
            PlanNode::Limit { n, child } => {
                assert_eq!(n, 5);
                assert!(matches!(*child, PlanNode::SeqScan { .. }));
            }
            _ => panic!("expected Limit to remain"),
        }
    }
}
