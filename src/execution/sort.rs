use std::cmp::Ordering;
use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::tuple::{Schema, Tuple};

use super::executor::{synthetic_rid, Executor};
use super::expression::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Asc
    }
}

#[derive(Debug, Clone)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub direction: Direction,
}

/// Lexicographic multi-key comparator: compares by each criterion in
/// order, moving to the next on a tie; values that aren't mutually
/// comparable (type mismatch, null) are treated as equal for that
/// criterion so a later criterion (or input order, for a stable sort)
/// decides.
pub(super) fn compare_by(order_by: &[OrderByExpr], a: &Tuple, b: &Tuple) -> Ordering {
    for criterion in order_by {
        let av = criterion.expr.evaluate(Some(a), None);
        let bv = criterion.expr.evaluate(Some(b), None);
        let ordering = match av.compare(&bv) {
            Some(o) => o,
            None => continue,
        };
        let ordering = match criterion.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Buffers the entire child, sorts stably by the ordered (direction,
/// expression) list, and replays the sorted buffer.
pub struct SortExecutor {
    child: Box<dyn Executor>,
    order_by: Vec<OrderByExpr>,
    schema: Arc<Schema>,
    buffer: Vec<Tuple>,
    position: usize,
}

impl SortExecutor {
    pub fn new(child: Box<dyn Executor>, order_by: Vec<OrderByExpr>) -> Self {
        let schema = Arc::clone(child.output_schema());
        Self {
            child,
            order_by,
            schema,
            buffer: Vec::new(),
            position: 0,
        }
    }
}

impl Executor for SortExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.buffer = super::executor::collect_all(self.child.as_mut())?;
        self.buffer
            .sort_by(|a, b| compare_by(&self.order_by, a, b));
        self.position = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.position >= self.buffer.len() {
            return Ok(None);
        }
        let tuple = self.buffer[self.position].clone();
        self.position += 1;
        Ok(Some((tuple, synthetic_rid())))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::expression::Side;
    use crate::tuple::{DataType, TupleBuilder, Value};

    struct VecExecutor {
        schema: Arc<Schema>,
        rows: Vec<Tuple>,
        position: usize,
    }

    impl Executor for VecExecutor {
        fn init(&mut self) -> Result<()> {
            self.position = 0;
            Ok(())
        }
        fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
            if self.position >= self.rows.len() {
                return Ok(None);
            }
            let t = self.rows[self.position].clone();
            self.position += 1;
            Ok(Some((t, synthetic_rid())))
        }
        fn output_schema(&self) -> &Arc<Schema> {
            &self.schema
        }
    }

    #[test]
    fn test_sort_descending() {
        let schema = Arc::new(Schema::builder().column("id", DataType::Integer).build());
        let rows = vec![3i32, 1, 2]
            .into_iter()
            .map(|v| TupleBuilder::new(Arc::clone(&schema)).value(v).build())
            .collect();
        let child = Box::new(VecExecutor {
            schema,
            rows,
            position: 0,
        });

        let mut sort = SortExecutor::new(
            child,
            vec![OrderByExpr {
                expr: Expr::column(Side::Single, 0),
                direction: Direction::Desc,
            }],
        );
        sort.init().unwrap();

        let mut out = Vec::new();
        while let Some((tuple, _)) = sort.next().unwrap() {
            out.push(tuple.value(0).cloned().unwrap());
        }
        assert_eq!(
            out,
            vec![Value::Integer(3), Value::Integer(2), Value::Integer(1)]
        );
    }
}
