//! Plan builder interface.
//!
//! A [`PlanBuilder`] turns plan nodes into something live: the runtime
//! builder in `execution::processors` produces operators, [`PlanSummary`]
//! produces an indented description for logs.

use super::nodes::{
    PlanNode, StreamAggregate, StreamFilter, StreamSelect, StreamSink, StreamSource,
    StreamStreamJoin,
};
use crate::velostream::sql::error::SqlResult;

/// One materialization method per plan node variant.
///
/// [`PlanNode::build`] dispatches to these; implementations call
/// `build` on the node's inputs to recurse.
pub trait PlanBuilder {
    type Output;

    fn visit_stream_source(&mut self, node: &StreamSource) -> SqlResult<Self::Output>;

    fn visit_stream_filter(&mut self, node: &StreamFilter) -> SqlResult<Self::Output>;

    fn visit_stream_select(&mut self, node: &StreamSelect) -> SqlResult<Self::Output>;

    fn visit_stream_aggregate(&mut self, node: &StreamAggregate) -> SqlResult<Self::Output>;

    fn visit_stream_stream_join(&mut self, node: &StreamStreamJoin) -> SqlResult<Self::Output>;

    fn visit_stream_sink(&mut self, node: &StreamSink) -> SqlResult<Self::Output>;
}

/// Renders a plan as one line per step, children indented below their parent
#[derive(Debug, Default)]
pub struct PlanSummary {
    depth: usize,
}

impl PlanSummary {
    pub fn summarize(plan: &PlanNode) -> SqlResult<String> {
        let mut summary = PlanSummary::default();
        Ok(plan.build(&mut summary)?.join("\n"))
    }

    fn line(&self, node_label: &str, detail: String, schema: String) -> String {
        format!(
            "{}> [ {} ] | {} | Schema: {}",
            " ".repeat(self.depth * 2),
            node_label,
            detail,
            schema
        )
    }

    fn children(&mut self, sources: &[&PlanNode]) -> SqlResult<Vec<String>> {
        self.depth += 1;
        let mut lines = Vec::new();
        for source in sources {
            lines.extend(source.build(self)?);
        }
        self.depth -= 1;
        Ok(lines)
    }

    fn with_children(
        &mut self,
        head: String,
        sources: &[&PlanNode],
    ) -> SqlResult<Vec<String>> {
        let mut lines = vec![head];
        lines.extend(self.children(sources)?);
        Ok(lines)
    }
}

impl PlanBuilder for PlanSummary {
    type Output = Vec<String>;

    fn visit_stream_source(&mut self, node: &StreamSource) -> SqlResult<Self::Output> {
        Ok(vec![self.line(
            "SOURCE",
            format!("topic: {} ({})", node.topic_name, node.formats.value_format),
            node.properties.schema.to_string(),
        )])
    }

    fn visit_stream_filter(&mut self, node: &StreamFilter) -> SqlResult<Self::Output> {
        let head = self.line(
            "FILTER",
            format!("predicate: {}", node.predicate),
            node.properties.schema.to_string(),
        );
        self.with_children(head, &[node.source.as_ref()])
    }

    fn visit_stream_select(&mut self, node: &StreamSelect) -> SqlResult<Self::Output> {
        let select = node
            .select_expressions
            .iter()
            .map(|s| format!("{} AS {}", s.expression, s.alias))
            .collect::<Vec<_>>()
            .join(", ");
        let head = self.line(
            "PROJECT",
            format!("select: {}", select),
            node.properties.schema.to_string(),
        );
        self.with_children(head, &[node.source.as_ref()])
    }

    fn visit_stream_aggregate(&mut self, node: &StreamAggregate) -> SqlResult<Self::Output> {
        let aggregates = node
            .aggregates
            .iter()
            .map(|a| match &a.argument {
                Some(arg) => format!("{}({})", a.function_name, arg),
                None => format!("{}(*)", a.function_name),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let group_by = node
            .group_by
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let head = self.line(
            "AGGREGATE",
            format!("{} GROUP BY {}", aggregates, group_by),
            node.properties.schema.to_string(),
        );
        self.with_children(head, &[node.source.as_ref()])
    }

    fn visit_stream_stream_join(&mut self, node: &StreamStreamJoin) -> SqlResult<Self::Output> {
        let head = self.line(
            "JOIN",
            format!(
                "{:?} WITHIN ({}ms, {}ms)",
                node.join_type,
                node.window.before.as_millis(),
                node.window.after.as_millis()
            ),
            node.properties.schema.to_string(),
        );
        self.with_children(head, &[node.left.as_ref(), node.right.as_ref()])
    }

    fn visit_stream_sink(&mut self, node: &StreamSink) -> SqlResult<Self::Output> {
        let head = self.line(
            "SINK",
            format!("topic: {}", node.topic_name),
            node.properties.schema.to_string(),
        );
        self.with_children(head, &[node.source.as_ref()])
    }
}
