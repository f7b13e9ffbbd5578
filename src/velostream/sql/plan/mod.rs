//! Physical query plans.
//!
//! The planner hands the engine a [`QueryPlan`]; its [`PlanNode`] tree is
//! materialized through a [`PlanBuilder`].

pub mod builder;
pub mod nodes;

pub use builder::{PlanBuilder, PlanSummary};
pub use nodes::{
    AggregateCall, ExecutionStepProperties, Format, Formats, JoinWindowSpec, OffsetReset,
    PlanNode, SelectExpression, StreamAggregate, StreamFilter, StreamSelect, StreamSink,
    StreamSource, StreamStreamJoin, TimestampExtractionPolicy,
};

use crate::velostream::sql::context::QueryId;
use serde::{Deserialize, Serialize};

/// A persistent query as produced by the planner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryPlan {
    pub query_id: QueryId,
    /// SQL text the plan was built from; quoted in error reports
    pub statement_text: String,
    pub physical_plan: PlanNode,
}

impl QueryPlan {
    pub fn new(
        query_id: QueryId,
        statement_text: impl Into<String>,
        physical_plan: PlanNode,
    ) -> Self {
        Self {
            query_id,
            statement_text: statement_text.into(),
            physical_plan,
        }
    }

    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }

    pub fn statement_text(&self) -> &str {
        &self.statement_text
    }

    pub fn physical_plan(&self) -> &PlanNode {
        &self.physical_plan
    }
}
