//! Filter and projection operators

use super::operator::RecordOperator;
use crate::velostream::sql::error::SqlResult;
use crate::velostream::sql::execution::expression::{CoercingTypeEnforcer, CompiledExpression};
use crate::velostream::sql::execution::types::StreamRecord;

/// Keeps records whose predicate evaluates to TRUE
#[derive(Debug)]
pub struct FilterOperator {
    predicate: CompiledExpression,
    logger: String,
    dropped: u64,
}

impl FilterOperator {
    pub fn new(predicate: CompiledExpression, logger: impl Into<String>) -> Self {
        Self {
            predicate,
            logger: logger.into(),
            dropped: 0,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl RecordOperator for FilterOperator {
    fn name(&self) -> &str {
        &self.logger
    }

    fn process(&mut self, record: StreamRecord) -> SqlResult<Option<StreamRecord>> {
        if self
            .predicate
            .evaluate_predicate(&record.columns, &CoercingTypeEnforcer)?
        {
            return Ok(Some(record));
        }
        self.dropped += 1;
        log::trace!(
            target: self.logger.as_str(),
            "Filtered out record at offset {}: {}",
            record.offset,
            self.predicate.text()
        );
        Ok(None)
    }
}

/// Replaces the columns of each record by the select expressions
#[derive(Debug)]
pub struct ProjectOperator {
    expressions: Vec<CompiledExpression>,
    logger: String,
}

impl ProjectOperator {
    pub fn new(expressions: Vec<CompiledExpression>, logger: impl Into<String>) -> Self {
        Self {
            expressions,
            logger: logger.into(),
        }
    }
}

impl RecordOperator for ProjectOperator {
    fn name(&self) -> &str {
        &self.logger
    }

    fn process(&mut self, record: StreamRecord) -> SqlResult<Option<StreamRecord>> {
        let columns = self
            .expressions
            .iter()
            .map(|e| e.evaluate(&record.columns, &CoercingTypeEnforcer))
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(Some(StreamRecord { columns, ..record }))
    }
}
