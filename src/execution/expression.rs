use crate::tuple::{Tuple, Value};

/// Which child tuple a `Column` reference addresses. Single-child
/// operators (Filter-free scans, Insert/Update/Delete targets) only ever
/// use `Single`; joins need both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Minimal expression type sufficient to drive join predicates, update
/// target lists, and sort/group-by keys, without a general expression
/// compiler (SQL parsing/binding/planning is out of scope).
#[derive(Debug, Clone)]
pub enum Expr {
    Column(Side, usize),
    Literal(Value),
    BinaryOp(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn column(side: Side, index: usize) -> Self {
        Expr::Column(side, index)
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::BinaryOp(op, Box::new(lhs), Box::new(rhs))
    }

    /// Evaluates against up to two input tuples. Returns `Value::Null` on
    /// any out-of-domain or type-mismatch case rather than panicking,
    /// matching `Value::compare`'s null-propagating semantics.
    pub fn evaluate(&self, left: Option<&Tuple>, right: Option<&Tuple>) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Column(side, index) => {
                let tuple = match side {
                    Side::Left | Side::Single => left,
                    Side::Right => right,
                };
                tuple
                    .and_then(|t| t.value(*index))
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            Expr::BinaryOp(op, lhs, rhs) => {
                let lv = lhs.evaluate(left, right);
                let rv = rhs.evaluate(left, right);
                eval_binary(*op, &lv, &rv)
            }
        }
    }
}

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Boolean(b) => Some(*b),
        _ => None,
    }
}

fn eval_binary(op: BinaryOp, lv: &Value, rv: &Value) -> Value {
    match op {
        BinaryOp::And => match (as_bool(lv), as_bool(rv)) {
            (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
            (Some(a), Some(b)) => Value::Boolean(a && b),
            _ => Value::Null,
        },
        BinaryOp::Or => match (as_bool(lv), as_bool(rv)) {
            (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
            (Some(a), Some(b)) => Value::Boolean(a || b),
            _ => Value::Null,
        },
        _ => match lv.compare(rv) {
            None => Value::Null,
            Some(ordering) => {
                let result = match op {
                    BinaryOp::Eq => ordering.is_eq(),
                    BinaryOp::NotEq => !ordering.is_eq(),
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Le => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    BinaryOp::Ge => ordering.is_ge(),
                    BinaryOp::And | BinaryOp::Or => unreachable!(),
                };
                Value::Boolean(result)
            }
        },
    }
}

/// True iff `expr` evaluates to a non-null `true` against the given
/// inputs — the join/filter predicate convention used throughout the
/// executor kernel.
pub fn is_true(expr: &Expr, left: Option<&Tuple>, right: Option<&Tuple>) -> bool {
    matches!(expr.evaluate(left, right), Value::Boolean(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{Schema, TupleBuilder};
    use crate::tuple::DataType;
    use std::sync::Arc;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder()
                .column("id", DataType::Integer)
                .nullable_column("name", DataType::VarChar(20))
                .build(),
        )
    }

    #[test]
    fn test_column_and_literal() {
        let schema = schema();
        let tuple = TupleBuilder::new(schema).value(5i32).value("x").build();

        let expr = Expr::column(Side::Single, 0);
        assert_eq!(expr.evaluate(Some(&tuple), None), Value::Integer(5));

        let expr = Expr::binary(
            BinaryOp::Eq,
            Expr::column(Side::Single, 0),
            Expr::literal(5i32),
        );
        assert!(is_true(&expr, Some(&tuple), None));
    }

    #[test]
    fn test_null_propagation() {
        let schema = schema();
        let tuple = TupleBuilder::new(schema).value(5i32).null().build();

        let expr = Expr::binary(
            BinaryOp::Eq,
            Expr::column(Side::Single, 1),
            Expr::literal("x"),
        );
        assert_eq!(expr.evaluate(Some(&tuple), None), Value::Null);
        assert!(!is_true(&expr, Some(&tuple), None));
    }

    #[test]
    fn test_left_right_sides() {
        let schema = schema();
        let left = TupleBuilder::new(schema.clone()).value(1i32).value("a").build();
        let right = TupleBuilder::new(schema).value(1i32).value("b").build();

        let expr = Expr::binary(
            BinaryOp::Eq,
            Expr::column(Side::Left, 0),
            Expr::column(Side::Right, 0),
        );
        assert!(is_true(&expr, Some(&left), Some(&right)));
    }

    #[test]
    fn test_and_or_short_circuit_on_null() {
        let expr_and = Expr::binary(BinaryOp::And, Expr::literal(false), Expr::Literal(Value::Null));
        assert_eq!(expr_and.evaluate(None, None), Value::Boolean(false));

        let expr_or = Expr::binary(BinaryOp::Or, Expr::literal(true), Expr::Literal(Value::Null));
        assert_eq!(expr_or.evaluate(None, None), Value::Boolean(true));
    }
}
