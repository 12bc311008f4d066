use std::collections::HashMap;
use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::tuple::{Column, Schema, Tuple, Value};

use super::executor::{synthetic_rid, Executor};
use super::expression::{is_true, Expr, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

fn merged_schema(left: &Schema, right: &Schema) -> Arc<Schema> {
    let columns: Vec<Column> = left
        .columns()
        .chain(right.columns())
        .cloned()
        .collect();
    Arc::new(Schema::new(columns))
}

fn merge_tuples(schema: &Arc<Schema>, left: &Tuple, right: &Tuple) -> Tuple {
    let mut values = left.values().to_vec();
    values.extend(right.values().iter().cloned());
    Tuple::new(Arc::clone(schema), values)
}

fn right_nulls(right_schema: &Schema) -> Vec<Value> {
    vec![Value::Null; right_schema.column_count()]
}

/// Outer loop pulls the left child; the right child is re-`Init`-ed per
/// outer tuple (the executor kernel's required rescan behavior). Emits
/// joined rows wherever `predicate(l, r)` is non-null true; for LEFT
/// joins, a left tuple with no match emits once with right columns null.
pub struct NestedLoopJoinExecutor {
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    predicate: Expr,
    join_type: JoinType,
    schema: Arc<Schema>,
    current_left: Option<Tuple>,
    current_left_matched: bool,
}

impl NestedLoopJoinExecutor {
    pub fn new(
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
        predicate: Expr,
        join_type: JoinType,
    ) -> Self {
        let schema = merged_schema(left.output_schema(), right.output_schema());
        Self {
            left,
            right,
            predicate,
            join_type,
            schema,
            current_left: None,
            current_left_matched: false,
        }
    }
}

impl Executor for NestedLoopJoinExecutor {
    fn init(&mut self) -> Result<()> {
        self.left.init()?;
        self.current_left = None;
        self.current_left_matched = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        loop {
            if self.current_left.is_none() {
                match self.left.next()? {
                    Some((tuple, _rid)) => {
                        self.current_left = Some(tuple);
                        self.current_left_matched = false;
                        self.right.init()?;
                    }
                    None => return Ok(None),
                }
            }

            let left_tuple = self.current_left.as_ref().unwrap();

            match self.right.next()? {
                Some((right_tuple, _rid)) => {
                    if is_true(&self.predicate, Some(left_tuple), Some(&right_tuple)) {
                        self.current_left_matched = true;
                        let merged = merge_tuples(&self.schema, left_tuple, &right_tuple);
                        return Ok(Some((merged, synthetic_rid())));
                    }
                }
                None => {
                    let left_tuple = self.current_left.take().unwrap();
                    if self.join_type == JoinType::Left && !self.current_left_matched {
                        let mut values = left_tuple.values().to_vec();
                        values.extend(right_nulls(self.right.output_schema()));
                        let merged = Tuple::new(Arc::clone(&self.schema), values);
                        return Ok(Some((merged, synthetic_rid())));
                    }
                }
            }
        }
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

fn value_hash_key(values: &[Value]) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    for v in values {
        if v.is_null() {
            // Nulls never match (SQL semantics); encode distinctly so a
            // null-containing key can never collide with a real one.
            return None;
        }
        let dt = v.infer_type()?;
        bytes.extend(v.serialize(&dt)?);
    }
    Some(bytes)
}

/// Build side is the right child: `Init` drains it into a multi-map from
/// join key to every tuple sharing it. Probe side is the left child: for
/// each left tuple, look up its join key and emit one joined row per
/// bucket entry; an empty bucket under LEFT join emits one (l, nulls)
/// row. Keys containing a null never match any bucket (nulls never
/// match, consistent with SQL semantics).
pub struct HashJoinExecutor {
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    left_key: Vec<Expr>,
    right_key: Vec<Expr>,
    join_type: JoinType,
    schema: Arc<Schema>,
    right_schema: Arc<Schema>,
    build: HashMap<Vec<u8>, Vec<Tuple>>,
    current_left: Option<Tuple>,
    bucket: Vec<Tuple>,
    bucket_pos: usize,
    current_left_matched: bool,
}

impl HashJoinExecutor {
    pub fn new(
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
        left_key: Vec<Expr>,
        right_key: Vec<Expr>,
        join_type: JoinType,
    ) -> Self {
        let schema = merged_schema(left.output_schema(), right.output_schema());
        let right_schema = Arc::clone(right.output_schema());
        Self {
            left,
            right,
            left_key,
            right_key,
            join_type,
            schema,
            right_schema,
            build: HashMap::new(),
            current_left: None,
            bucket: Vec::new(),
            bucket_pos: 0,
            current_left_matched: false,
        }
    }

    fn key_of(exprs: &[Expr], side: Side, tuple: &Tuple) -> Option<Vec<u8>> {
        let values: Vec<Value> = exprs
            .iter()
            .map(|e| match side {
                Side::Left => e.evaluate(Some(tuple), None),
                Side::Right => e.evaluate(None, Some(tuple)),
                Side::Single => e.evaluate(Some(tuple), None),
            })
            .collect();
        value_hash_key(&values)
    }
}

impl Executor for HashJoinExecutor {
    fn init(&mut self) -> Result<()> {
        self.right.init()?;
        self.build.clear();
        while let Some((tuple, _rid)) = self.right.next()? {
            if let Some(key) = Self::key_of(&self.right_key, Side::Single, &tuple) {
                self.build.entry(key).or_default().push(tuple);
            }
        }

        self.left.init()?;
        self.current_left = None;
        self.bucket = Vec::new();
        self.bucket_pos = 0;
        self.current_left_matched = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        loop {
            if self.bucket_pos < self.bucket.len() {
                let left_tuple = self.current_left.as_ref().unwrap();
                let right_tuple = &self.bucket[self.bucket_pos];
                self.bucket_pos += 1;
                self.current_left_matched = true;
                let merged = merge_tuples(&self.schema, left_tuple, right_tuple);
                return Ok(Some((merged, synthetic_rid())));
            }

            if let Some(left_tuple) = self.current_left.take() {
                if self.join_type == JoinType::Left && !self.current_left_matched {
                    let mut values = left_tuple.values().to_vec();
                    values.extend(right_nulls(&self.right_schema));
                    let merged = Tuple::new(Arc::clone(&self.schema), values);
                    return Ok(Some((merged, synthetic_rid())));
                }
            }

            match self.left.next()? {
                Some((tuple, _rid)) => {
                    self.bucket = Self::key_of(&self.left_key, Side::Single, &tuple)
                        .and_then(|key| self.build.get(&key).cloned())
                        .unwrap_or_default();
                    self.bucket_pos = 0;
                    self.current_left_matched = false;
                    self.current_left = Some(tuple);
                }
                None => return Ok(None),
            }
        }
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
