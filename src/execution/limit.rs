use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::tuple::{Schema, Tuple};

use super::executor::Executor;

/// Pass-through from the child, stopping after N rows.
pub struct LimitExecutor {
    child: Box<dyn Executor>,
    limit: usize,
    emitted: usize,
}

impl LimitExecutor {
    pub fn new(child: Box<dyn Executor>, limit: usize) -> Self {
        Self {
            child,
            limit,
            emitted: 0,
        }
    }
}

impl Executor for LimitExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.emitted = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.emitted >= self.limit {
            return Ok(None);
        }
        match self.child.next()? {
            Some(row) => {
                self.emitted += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn output_schema(&self) -> &Arc<Schema> {
        self.child.output_schema()
    }
}
