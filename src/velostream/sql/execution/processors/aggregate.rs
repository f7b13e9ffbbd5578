//! Continuous GROUP BY aggregation

use super::operator::RecordOperator;
use crate::velostream::sql::error::SqlResult;
use crate::velostream::sql::execution::aggregation::KsqlAggregateFunction;
use crate::velostream::sql::execution::expression::{CoercingTypeEnforcer, CompiledExpression};
use crate::velostream::sql::execution::types::{FieldValue, StreamRecord};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// One aggregate column: the function and its argument (`None` for `COUNT(*)`)
#[derive(Debug)]
pub struct AggregateColumn {
    pub function: Arc<dyn KsqlAggregateFunction>,
    pub argument: Option<CompiledExpression>,
}

/// Per-group incremental aggregation emitting the updated row for every input
#[derive(Debug)]
pub struct AggregateOperator {
    group_by: Vec<CompiledExpression>,
    aggregates: Vec<AggregateColumn>,
    /// Accumulators per group key, one per aggregate column
    groups: FxHashMap<Vec<FieldValue>, Vec<FieldValue>>,
    /// Updates of the record in flight, applied on commit
    pending: FxHashMap<Vec<FieldValue>, Vec<FieldValue>>,
    logger: String,
}

impl AggregateOperator {
    pub fn new(
        group_by: Vec<CompiledExpression>,
        aggregates: Vec<AggregateColumn>,
        logger: impl Into<String>,
    ) -> Self {
        Self {
            group_by,
            aggregates,
            groups: FxHashMap::default(),
            pending: FxHashMap::default(),
            logger: logger.into(),
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Committed accumulators of one group
    pub fn accumulators(&self, group: &[FieldValue]) -> Option<&[FieldValue]> {
        self.groups.get(group).map(Vec::as_slice)
    }

    fn output_key(group: &[FieldValue]) -> FieldValue {
        match group {
            [single] => single.clone(),
            _ => FieldValue::Array(group.to_vec()),
        }
    }
}

impl RecordOperator for AggregateOperator {
    fn name(&self) -> &str {
        &self.logger
    }

    fn process(&mut self, record: StreamRecord) -> SqlResult<Option<StreamRecord>> {
        let enforcer = CoercingTypeEnforcer;
        let group = self
            .group_by
            .iter()
            .map(|e| e.evaluate(&record.columns, &enforcer))
            .collect::<SqlResult<Vec<_>>>()?;

        let inputs = self
            .aggregates
            .iter()
            .map(|a| match &a.argument {
                Some(arg) => arg.evaluate(&record.columns, &enforcer),
                None => Ok(FieldValue::Boolean(true)),
            })
            .collect::<SqlResult<Vec<_>>>()?;

        // Compute the new accumulators first; the group is only staged when all succeed
        let current = self.pending.get(&group).or_else(|| self.groups.get(&group));
        let mut updated = Vec::with_capacity(self.aggregates.len());
        for (i, (column, input)) in self.aggregates.iter().zip(&inputs).enumerate() {
            let accumulator = match current {
                Some(accumulators) => accumulators[i].clone(),
                None => column.function.initial(),
            };
            updated.push(column.function.aggregate(input, accumulator)?);
        }

        let results = self
            .aggregates
            .iter()
            .zip(&updated)
            .map(|(column, acc)| column.function.result(acc.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let key = Self::output_key(&group);
        let mut columns = group.clone();
        columns.extend(results);
        self.pending.insert(group, updated);

        Ok(Some(StreamRecord {
            key,
            columns,
            ..record
        }))
    }

    fn commit(&mut self) {
        for (group, accumulators) in self.pending.drain() {
            if !self.groups.contains_key(&group) {
                log::debug!(
                    target: self.logger.as_str(),
                    "New group {:?} ({} groups)",
                    group,
                    self.groups.len() + 1
                );
            }
            self.groups.insert(group, accumulators);
        }
    }

    fn rollback(&mut self) {
        if !self.pending.is_empty() {
            log::debug!(
                target: self.logger.as_str(),
                "Discarding {} pending group updates",
                self.pending.len()
            );
            self.pending.clear();
        }
    }

    fn retained_state_size(&self) -> usize {
        self.groups.len()
    }
}
