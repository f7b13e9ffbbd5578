/*!
# Physical Plan Nodes

Immutable description of the operators of one persistent query. A plan is a
tree of [`PlanNode`] values handed over by the planner; the engine never
mutates it. Every node carries [`ExecutionStepProperties`] (step id, context
path and output schema) and owns its input nodes, so the graph is acyclic by
construction.

```text
StreamSink
  └─ StreamSelect
       └─ StreamStreamJoin
            ├─ StreamSource (orders)
            └─ StreamSource (shipments)
```

Equality and hashing are structural over every field: two plans compare equal
iff they describe the same operators with the same properties.
*/

use super::builder::PlanBuilder;
use crate::velostream::sql::context::QueryContext;
use crate::velostream::sql::error::SqlResult;
use crate::velostream::sql::execution::expression::Expr;
use crate::velostream::sql::execution::join::JoinType;
use crate::velostream::sql::schema::LogicalSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identity of one execution step
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionStepProperties {
    /// Step id, unique within the plan
    pub id: String,
    /// Path of the step from the query root; used for logger names
    pub query_context: QueryContext,
    /// Output schema of the step
    pub schema: LogicalSchema,
}

impl ExecutionStepProperties {
    pub fn new(id: impl Into<String>, query_context: QueryContext, schema: LogicalSchema) -> Self {
        Self {
            id: id.into(),
            query_context,
            schema,
        }
    }

    pub fn with_schema(&self, schema: LogicalSchema) -> Self {
        Self {
            schema,
            ..self.clone()
        }
    }
}

/// Serialization format of a key or value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Format {
    /// Primitive Kafka serde (keys)
    Kafka,
    #[default]
    Json,
    Avro,
    Protobuf,
    Delimited,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Kafka => "KAFKA",
            Format::Json => "JSON",
            Format::Avro => "AVRO",
            Format::Protobuf => "PROTOBUF",
            Format::Delimited => "DELIMITED",
        };
        f.write_str(name)
    }
}

/// Key and value formats of a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Formats {
    pub key_format: Format,
    pub value_format: Format,
}

impl Formats {
    pub fn of(key_format: Format, value_format: Format) -> Self {
        Self {
            key_format,
            value_format,
        }
    }
}

impl Default for Formats {
    fn default() -> Self {
        Self::of(Format::Kafka, Format::Json)
    }
}

/// Where a source takes the event time of its records from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimestampExtractionPolicy {
    /// Timestamp carried by the record itself
    #[default]
    RecordMetadata,
    /// BIGINT (or numeric string) column holding milliseconds since epoch
    Column { index: usize },
}

/// Where a source starts reading when it has no committed position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OffsetReset {
    Earliest,
    #[default]
    Latest,
}

/// `WITHIN (before, after) [GRACE PERIOD grace]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinWindowSpec {
    pub before: Duration,
    pub after: Duration,
    /// Falls back to the engine's join defaults when absent
    pub grace: Option<Duration>,
}

impl JoinWindowSpec {
    /// `WITHIN size` - the same bound on both sides
    pub fn symmetric(size: Duration) -> Self {
        Self::new(size, size)
    }

    pub fn new(before: Duration, after: Duration) -> Self {
        Self {
            before,
            after,
            grace: None,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = Some(grace);
        self
    }
}

/// Reads a topic
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamSource {
    pub properties: ExecutionStepProperties,
    pub topic_name: String,
    pub formats: Formats,
    pub timestamp_policy: TimestampExtractionPolicy,
    pub offset_reset: Option<OffsetReset>,
}

/// Drops records for which `predicate` is not TRUE
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFilter {
    pub properties: ExecutionStepProperties,
    pub source: Box<PlanNode>,
    pub predicate: Expr,
}

/// One output column of a projection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectExpression {
    pub alias: String,
    pub expression: Expr,
}

impl SelectExpression {
    pub fn new(alias: impl Into<String>, expression: Expr) -> Self {
        Self {
            alias: alias.into(),
            expression,
        }
    }
}

/// Projects every record through `select_expressions`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamSelect {
    pub properties: ExecutionStepProperties,
    pub source: Box<PlanNode>,
    pub select_expressions: Vec<SelectExpression>,
}

/// One aggregate of a `StreamAggregate`; `argument` is `None` for `COUNT(*)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateCall {
    pub function_name: String,
    pub argument: Option<Expr>,
}

impl AggregateCall {
    pub fn new(function_name: impl Into<String>, argument: Expr) -> Self {
        Self {
            function_name: function_name.into(),
            argument: Some(argument),
        }
    }

    pub fn count_star() -> Self {
        Self {
            function_name: "COUNT".to_string(),
            argument: None,
        }
    }
}

/// Continuously aggregates its input per group.
///
/// Output columns are the group-by values followed by one column per
/// aggregate; an updated row is emitted for every accepted input record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamAggregate {
    pub properties: ExecutionStepProperties,
    pub source: Box<PlanNode>,
    pub group_by: Vec<Expr>,
    pub aggregates: Vec<AggregateCall>,
}

/// Windowed join of two keyed streams
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamStreamJoin {
    pub properties: ExecutionStepProperties,
    pub join_type: JoinType,
    pub left_formats: Formats,
    pub right_formats: Formats,
    pub left: Box<PlanNode>,
    pub right: Box<PlanNode>,
    pub window: JoinWindowSpec,
}

/// Writes the result of the query to a topic
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamSink {
    pub properties: ExecutionStepProperties,
    pub source: Box<PlanNode>,
    pub topic_name: String,
    pub formats: Formats,
}

/// One physical operator of a query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanNode {
    StreamSource(StreamSource),
    StreamFilter(StreamFilter),
    StreamSelect(StreamSelect),
    StreamAggregate(StreamAggregate),
    StreamStreamJoin(StreamStreamJoin),
    StreamSink(StreamSink),
}

impl PlanNode {
    /// Materialize this node against `builder`
    ///
    /// Builders decide themselves when to descend into the inputs of a node.
    pub fn build<B: PlanBuilder + ?Sized>(&self, builder: &mut B) -> SqlResult<B::Output> {
        match self {
            PlanNode::StreamSource(node) => builder.visit_stream_source(node),
            PlanNode::StreamFilter(node) => builder.visit_stream_filter(node),
            PlanNode::StreamSelect(node) => builder.visit_stream_select(node),
            PlanNode::StreamAggregate(node) => builder.visit_stream_aggregate(node),
            PlanNode::StreamStreamJoin(node) => builder.visit_stream_stream_join(node),
            PlanNode::StreamSink(node) => builder.visit_stream_sink(node),
        }
    }

    pub fn properties(&self) -> &ExecutionStepProperties {
        match self {
            PlanNode::StreamSource(node) => &node.properties,
            PlanNode::StreamFilter(node) => &node.properties,
            PlanNode::StreamSelect(node) => &node.properties,
            PlanNode::StreamAggregate(node) => &node.properties,
            PlanNode::StreamStreamJoin(node) => &node.properties,
            PlanNode::StreamSink(node) => &node.properties,
        }
    }

    pub fn schema(&self) -> &LogicalSchema {
        &self.properties().schema
    }

    /// Input nodes, left to right
    pub fn sources(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::StreamSource(_) => Vec::new(),
            PlanNode::StreamFilter(node) => vec![node.source.as_ref()],
            PlanNode::StreamSelect(node) => vec![node.source.as_ref()],
            PlanNode::StreamAggregate(node) => vec![node.source.as_ref()],
            PlanNode::StreamStreamJoin(node) => vec![node.left.as_ref(), node.right.as_ref()],
            PlanNode::StreamSink(node) => vec![node.source.as_ref()],
        }
    }

    /// Short operator label, e.g. `SOURCE`
    pub fn operator_name(&self) -> &'static str {
        match self {
            PlanNode::StreamSource(_) => "SOURCE",
            PlanNode::StreamFilter(_) => "FILTER",
            PlanNode::StreamSelect(_) => "PROJECT",
            PlanNode::StreamAggregate(_) => "AGGREGATE",
            PlanNode::StreamStreamJoin(_) => "JOIN",
            PlanNode::StreamSink(_) => "SINK",
        }
    }

    /// Topics read by this node and its inputs, in plan order
    pub fn source_topics(&self) -> Vec<&str> {
        match self {
            PlanNode::StreamSource(node) => vec![node.topic_name.as_str()],
            _ => self
                .sources()
                .into_iter()
                .flat_map(PlanNode::source_topics)
                .collect(),
        }
    }
}

macro_rules! impl_from_step {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for PlanNode {
                fn from(node: $variant) -> Self {
                    PlanNode::$variant(node)
                }
            }
        )*
    };
}

impl_from_step!(
    StreamSource,
    StreamFilter,
    StreamSelect,
    StreamAggregate,
    StreamStreamJoin,
    StreamSink,
);
