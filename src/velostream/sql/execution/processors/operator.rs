//! Live operator tree of one query instance.
//!
//! Records enter at the leaves ([`OperatorHandle::Source`]) by topic and flow
//! up to the root. Every handle is owned by exactly one worker task.

use super::join::JoinOperator;
use super::source::SourceOperator;
use crate::velostream::sql::error::SqlResult;
use crate::velostream::sql::execution::join::JoinSide;
use crate::velostream::sql::execution::types::{SourceRecord, StreamRecord};
use std::fmt;

/// Single-input operator
pub trait RecordOperator: Send + fmt::Debug {
    fn name(&self) -> &str;

    /// Process one record; `None` drops it.
    ///
    /// State changes stay pending until [`commit`](Self::commit). On error the
    /// pending changes of this record are not recorded.
    fn process(&mut self, record: StreamRecord) -> SqlResult<Option<StreamRecord>>;

    /// Keep every change made since the last commit
    fn commit(&mut self) {}

    /// Discard every change made since the last commit
    fn rollback(&mut self) {}

    /// Number of state entries held
    fn retained_state_size(&self) -> usize {
        0
    }
}

/// Materialized plan node
#[derive(Debug)]
pub enum OperatorHandle {
    Source(SourceOperator),
    Unary {
        operator: Box<dyn RecordOperator>,
        input: Box<OperatorHandle>,
    },
    Join {
        operator: JoinOperator,
        left: Box<OperatorHandle>,
        right: Box<OperatorHandle>,
    },
    Sink {
        topic: String,
        input: Box<OperatorHandle>,
    },
}

impl OperatorHandle {
    /// Push one input record through the tree; returns the rows reaching the root.
    ///
    /// The record is applied as a unit: when any row derived from it fails, no
    /// aggregate in the tree keeps an update from it.
    pub fn push(&mut self, record: &SourceRecord) -> SqlResult<Vec<StreamRecord>> {
        let result = self.push_pending(record);
        self.settle(result.is_ok());
        result
    }

    fn push_pending(&mut self, record: &SourceRecord) -> SqlResult<Vec<StreamRecord>> {
        match self {
            OperatorHandle::Source(source) => Ok(source.accept(record)?.into_iter().collect()),
            OperatorHandle::Unary { operator, input } => {
                let rows = input.push_pending(record)?;
                apply(operator.as_mut(), rows)
            }
            OperatorHandle::Join {
                operator,
                left,
                right,
            } => {
                let mut output = Vec::new();
                for row in left.push_pending(record)? {
                    output.extend(operator.process(JoinSide::Left, row));
                }
                for row in right.push_pending(record)? {
                    output.extend(operator.process(JoinSide::Right, row));
                }
                Ok(output)
            }
            OperatorHandle::Sink { input, .. } => input.push_pending(record),
        }
    }

    /// Release all held state, emitting whatever it still owes downstream
    pub fn flush(&mut self) -> SqlResult<Vec<StreamRecord>> {
        let result = self.flush_pending();
        self.settle(result.is_ok());
        result
    }

    fn flush_pending(&mut self) -> SqlResult<Vec<StreamRecord>> {
        match self {
            OperatorHandle::Source(_) => Ok(Vec::new()),
            OperatorHandle::Unary { operator, input } => {
                let rows = input.flush_pending()?;
                apply(operator.as_mut(), rows)
            }
            OperatorHandle::Join {
                operator,
                left,
                right,
            } => {
                let mut output = Vec::new();
                for row in left.flush_pending()? {
                    output.extend(operator.process(JoinSide::Left, row));
                }
                for row in right.flush_pending()? {
                    output.extend(operator.process(JoinSide::Right, row));
                }
                output.extend(operator.flush());
                Ok(output)
            }
            OperatorHandle::Sink { input, .. } => input.flush_pending(),
        }
    }

    /// Commit or roll back the pending changes of every operator in the tree
    fn settle(&mut self, succeeded: bool) {
        match self {
            OperatorHandle::Source(_) => {}
            OperatorHandle::Unary { operator, input } => {
                if succeeded {
                    operator.commit();
                } else {
                    operator.rollback();
                }
                input.settle(succeeded);
            }
            OperatorHandle::Join { left, right, .. } => {
                left.settle(succeeded);
                right.settle(succeeded);
            }
            OperatorHandle::Sink { input, .. } => input.settle(succeeded),
        }
    }

    /// Entries buffered by joins and aggregations in this subtree
    pub fn retained_state_size(&self) -> usize {
        match self {
            OperatorHandle::Source(_) => 0,
            OperatorHandle::Unary { operator, input } => {
                operator.retained_state_size() + input.retained_state_size()
            }
            OperatorHandle::Join {
                operator,
                left,
                right,
            } => {
                operator.retained_state_size()
                    + left.retained_state_size()
                    + right.retained_state_size()
            }
            OperatorHandle::Sink { input, .. } => input.retained_state_size(),
        }
    }

    /// Topic written by the root sink, if the tree has one
    pub fn sink_topic(&self) -> Option<&str> {
        match self {
            OperatorHandle::Sink { topic, .. } => Some(topic),
            _ => None,
        }
    }
}

fn apply(
    operator: &mut dyn RecordOperator,
    rows: Vec<StreamRecord>,
) -> SqlResult<Vec<StreamRecord>> {
    let mut output = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(out) = operator.process(row)? {
            output.push(out);
        }
    }
    Ok(output)
}
