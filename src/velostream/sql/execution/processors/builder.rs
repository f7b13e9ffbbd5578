//! Runtime plan builder
//!
//! Materializes a plan into an [`OperatorHandle`] tree: expressions are
//! compiled against the input schema of their step, aggregates resolved in
//! the [`UdafRegistry`] and join windows completed from the engine config.

use super::aggregate::{AggregateColumn, AggregateOperator};
use super::join::JoinOperator;
use super::operator::OperatorHandle;
use super::select::{FilterOperator, ProjectOperator};
use super::source::{SourceOperator, TimestampExtractor, extractor_for};
use crate::velostream::config::EngineConfig;
use crate::velostream::sql::context::{QueryContext, QueryId, query_logger_name};
use crate::velostream::sql::error::{SqlError, SqlResult};
use crate::velostream::sql::execution::aggregation::UdafRegistry;
use crate::velostream::sql::execution::expression::{ExpressionCompiler, FunctionRegistry};
use crate::velostream::sql::execution::types::SqlType;
use crate::velostream::sql::plan::{
    PlanBuilder, StreamAggregate, StreamFilter, StreamSelect, StreamSink, StreamSource,
    StreamStreamJoin,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds live operators for one query instance
pub struct RuntimePlanBuilder<'a> {
    query_id: QueryId,
    config: &'a EngineConfig,
    functions: &'a FunctionRegistry,
    aggregates: &'a UdafRegistry,
    /// Per-topic extractors overriding the source's declared policy
    extractors: HashMap<String, Arc<dyn TimestampExtractor>>,
}

impl<'a> RuntimePlanBuilder<'a> {
    pub fn new(
        query_id: QueryId,
        config: &'a EngineConfig,
        functions: &'a FunctionRegistry,
        aggregates: &'a UdafRegistry,
    ) -> Self {
        Self {
            query_id,
            config,
            functions,
            aggregates,
            extractors: HashMap::new(),
        }
    }

    pub fn with_timestamp_extractor(
        mut self,
        topic: impl Into<String>,
        extractor: Arc<dyn TimestampExtractor>,
    ) -> Self {
        self.extractors.insert(topic.into(), extractor);
        self
    }

    fn logger(&self, context: &QueryContext) -> String {
        query_logger_name(&self.query_id, context)
    }
}

impl PlanBuilder for RuntimePlanBuilder<'_> {
    type Output = OperatorHandle;

    fn visit_stream_source(&mut self, node: &StreamSource) -> SqlResult<OperatorHandle> {
        let logger = self.logger(&node.properties.query_context);
        let extractor = match self.extractors.get(&node.topic_name) {
            Some(extractor) => Arc::clone(extractor),
            None => extractor_for(node.timestamp_policy),
        };
        log::debug!(
            target: logger.as_str(),
            "Source on topic '{}' ({:?}, timestamps from {:?})",
            node.topic_name,
            node.formats,
            node.timestamp_policy
        );
        Ok(OperatorHandle::Source(SourceOperator::new(
            node.topic_name.clone(),
            extractor,
            logger,
        )))
    }

    fn visit_stream_filter(&mut self, node: &StreamFilter) -> SqlResult<OperatorHandle> {
        let input = node.source.build(self)?;
        let compiler = ExpressionCompiler::new(node.source.schema(), self.functions);
        let predicate = compiler.compile(&node.predicate)?;
        if predicate.return_type() != &SqlType::Boolean {
            return Err(SqlError::plan_error(format!(
                "Filter predicate {} is {}, expected BOOLEAN",
                node.predicate,
                predicate.return_type()
            )));
        }
        Ok(OperatorHandle::Unary {
            operator: Box::new(FilterOperator::new(
                predicate,
                self.logger(&node.properties.query_context),
            )),
            input: Box::new(input),
        })
    }

    fn visit_stream_select(&mut self, node: &StreamSelect) -> SqlResult<OperatorHandle> {
        let input = node.source.build(self)?;
        let compiler = ExpressionCompiler::new(node.source.schema(), self.functions);
        let expressions = node
            .select_expressions
            .iter()
            .map(|s| compiler.compile(&s.expression))
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(OperatorHandle::Unary {
            operator: Box::new(ProjectOperator::new(
                expressions,
                self.logger(&node.properties.query_context),
            )),
            input: Box::new(input),
        })
    }

    fn visit_stream_aggregate(&mut self, node: &StreamAggregate) -> SqlResult<OperatorHandle> {
        let input = node.source.build(self)?;
        let compiler = ExpressionCompiler::new(node.source.schema(), self.functions);
        let group_by = node
            .group_by
            .iter()
            .map(|e| compiler.compile(e))
            .collect::<SqlResult<Vec<_>>>()?;

        let mut aggregates = Vec::with_capacity(node.aggregates.len());
        for call in &node.aggregates {
            let argument = call
                .argument
                .as_ref()
                .map(|arg| compiler.compile(arg))
                .transpose()?;
            let argument_type = argument
                .as_ref()
                .map_or(SqlType::Boolean, |arg| arg.return_type().clone());
            let function = self.aggregates.resolve(&call.function_name, &argument_type)?;
            aggregates.push(AggregateColumn { function, argument });
        }

        Ok(OperatorHandle::Unary {
            operator: Box::new(AggregateOperator::new(
                group_by,
                aggregates,
                self.logger(&node.properties.query_context),
            )),
            input: Box::new(input),
        })
    }

    fn visit_stream_stream_join(&mut self, node: &StreamStreamJoin) -> SqlResult<OperatorHandle> {
        let left = node.left.build(self)?;
        let right = node.right.build(self)?;
        let operator = JoinOperator::new(
            node,
            &self.config.join,
            self.logger(&node.properties.query_context),
        )?;
        Ok(OperatorHandle::Join {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn visit_stream_sink(&mut self, node: &StreamSink) -> SqlResult<OperatorHandle> {
        let input = node.source.build(self)?;
        let logger = self.logger(&node.properties.query_context);
        log::debug!(
            target: logger.as_str(),
            "Sink to topic '{}'",
            node.topic_name
        );
        Ok(OperatorHandle::Sink {
            topic: node.topic_name.clone(),
            input: Box::new(input),
        })
    }
}
