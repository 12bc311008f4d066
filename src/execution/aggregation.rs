use std::collections::HashMap;
use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::tuple::{Schema, Tuple, Value};

use super::executor::{synthetic_rid, Executor};
use super::expression::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
}

#[derive(Debug, Clone)]
pub struct AggregateExpr {
    pub function: AggregateFunction,
    pub input: Expr,
}

#[derive(Clone)]
enum AggState {
    Count(i64),
    Sum(Option<Value>),
    Min(Option<Value>),
    Max(Option<Value>),
}

impl AggState {
    fn initial(function: AggregateFunction) -> Self {
        match function {
            AggregateFunction::CountStar | AggregateFunction::Count => AggState::Count(0),
            AggregateFunction::Sum => AggState::Sum(None),
            AggregateFunction::Min => AggState::Min(None),
            AggregateFunction::Max => AggState::Max(None),
        }
    }

    fn update(&mut self, function: AggregateFunction, value: &Value) {
        match (self, function) {
            (AggState::Count(n), AggregateFunction::CountStar) => *n += 1,
            (AggState::Count(n), AggregateFunction::Count) => {
                if !value.is_null() {
                    *n += 1;
                }
            }
            (AggState::Sum(acc), AggregateFunction::Sum) => {
                if !value.is_null() {
                    *acc = Some(match acc.take() {
                        None => value.clone(),
                        Some(prev) => add_values(&prev, value).unwrap_or(prev),
                    });
                }
            }
            (AggState::Min(acc), AggregateFunction::Min) => {
                if !value.is_null() {
                    *acc = Some(match acc.take() {
                        None => value.clone(),
                        Some(prev) => {
                            if value.compare(&prev).map(|o| o.is_lt()).unwrap_or(false) {
                                value.clone()
                            } else {
                                prev
                            }
                        }
                    });
                }
            }
            (AggState::Max(acc), AggregateFunction::Max) => {
                if !value.is_null() {
                    *acc = Some(match acc.take() {
                        None => value.clone(),
                        Some(prev) => {
                            if value.compare(&prev).map(|o| o.is_gt()).unwrap_or(false) {
                                value.clone()
                            } else {
                                prev
                            }
                        }
                    });
                }
            }
            _ => unreachable!("AggState variant must match its AggregateFunction"),
        }
    }

    fn finish(self) -> Value {
        match self {
            AggState::Count(n) => Value::BigInt(n),
            AggState::Sum(v) | AggState::Min(v) | AggState::Max(v) => v.unwrap_or(Value::Null),
        }
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::TinyInt(n) => Some(*n as f64),
        Value::SmallInt(n) => Some(*n as f64),
        Value::Integer(n) => Some(*n as f64),
        Value::BigInt(n) => Some(*n as f64),
        Value::Float(n) => Some(*n as f64),
        Value::Double(n) => Some(*n as f64),
        _ => None,
    }
}

/// Numeric addition with type promotion to the wider of the two operands,
/// matching `Value::compare`'s cross-type promotion rules.
fn add_values(a: &Value, b: &Value) -> Option<Value> {
    use Value::*;
    match (a, b) {
        (Double(_), _) | (_, Double(_)) => Some(Double(as_f64(a)? + as_f64(b)?)),
        (Float(_), _) | (_, Float(_)) => Some(Float((as_f64(a)? + as_f64(b)?) as f32)),
        (BigInt(_), _) | (_, BigInt(_)) => Some(BigInt(as_f64(a)? as i64 + as_f64(b)? as i64)),
        (Integer(_), _) | (_, Integer(_)) => Some(Integer(as_f64(a)? as i32 + as_f64(b)? as i32)),
        (SmallInt(_), _) | (_, SmallInt(_)) => Some(SmallInt(as_f64(a)? as i16 + as_f64(b)? as i16)),
        (TinyInt(a), TinyInt(b)) => Some(TinyInt(a + b)),
        _ => None,
    }
}

/// Serializes a group-by key, tagging nulls distinctly so NULL group-by
/// values group together rather than being excluded (unlike join keys,
/// where a null never matches).
fn group_key(values: &[Value]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for v in values {
        match v.infer_type() {
            Some(dt) => {
                bytes.push(1);
                if let Some(encoded) = v.serialize(&dt) {
                    bytes.extend((encoded.len() as u32).to_le_bytes());
                    bytes.extend(encoded);
                }
            }
            None => bytes.push(0),
        }
    }
    bytes
}

/// Hash-based grouped aggregation. Build phase drains the child,
/// maintaining one running `AggState` per aggregate per group. An empty
/// input with no group-by columns still emits one row (COUNT=0, other
/// aggregates NULL); an empty input with group-by columns emits none.
pub struct AggregationExecutor {
    child: Box<dyn Executor>,
    group_by: Vec<Expr>,
    aggregates: Vec<AggregateExpr>,
    schema: Arc<Schema>,
    output: Vec<Tuple>,
    position: usize,
}

impl AggregationExecutor {
    pub fn new(
        child: Box<dyn Executor>,
        group_by: Vec<Expr>,
        aggregates: Vec<AggregateExpr>,
        schema: Arc<Schema>,
    ) -> Self {
        Self {
            child,
            group_by,
            aggregates,
            schema,
            output: Vec::new(),
            position: 0,
        }
    }
}

impl Executor for AggregationExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;

        let mut groups: HashMap<Vec<u8>, (Vec<Value>, Vec<AggState>)> = HashMap::new();
        let mut saw_any = false;

        while let Some((tuple, _rid)) = self.child.next()? {
            saw_any = true;
            let key_values: Vec<Value> = self
                .group_by
                .iter()
                .map(|e| e.evaluate(Some(&tuple), None))
                .collect();
            let key = group_key(&key_values);

            let entry = groups.entry(key).or_insert_with(|| {
                let states = self
                    .aggregates
                    .iter()
                    .map(|a| AggState::initial(a.function))
                    .collect();
                (key_values.clone(), states)
            });

            for (state, agg) in entry.1.iter_mut().zip(self.aggregates.iter()) {
                let value = agg.input.evaluate(Some(&tuple), None);
                state.update(agg.function, &value);
            }
        }

        self.output.clear();
        if !saw_any && self.group_by.is_empty() {
            let states: Vec<AggState> = self
                .aggregates
                .iter()
                .map(|a| AggState::initial(a.function))
                .collect();
            let values: Vec<Value> = states.into_iter().map(AggState::finish).collect();
            self.output
                .push(Tuple::new(Arc::clone(&self.schema), values));
        } else {
            for (_key, (group_values, states)) in groups {
                let mut values = group_values;
                values.extend(states.into_iter().map(AggState::finish));
                self.output
                    .push(Tuple::new(Arc::clone(&self.schema), values));
            }
        }
        self.position = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.position >= self.output.len() {
            return Ok(None);
        }
        let tuple = self.output[self.position].clone();
        self.position += 1;
        Ok(Some((tuple, synthetic_rid())))
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
