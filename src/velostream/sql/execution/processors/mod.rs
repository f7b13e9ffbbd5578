//! Runtime operators for physical plans
//!
//! [`RuntimePlanBuilder`] turns a [`PlanNode`](crate::velostream::sql::plan::PlanNode)
//! into an [`OperatorHandle`] tree:
//! - sources stamp records with their event time ([`TimestampExtractor`])
//! - filters and projections evaluate compiled expressions
//! - aggregations keep one accumulator set per group
//! - joins buffer both sides in windowed state stores

pub mod aggregate;
pub mod builder;
pub mod join;
pub mod operator;
pub mod select;
pub mod source;

pub use aggregate::{AggregateColumn, AggregateOperator};
pub use builder::RuntimePlanBuilder;
pub use join::{JoinOperator, join_windows_for};
pub use operator::{OperatorHandle, RecordOperator};
pub use select::{FilterOperator, ProjectOperator};
pub use source::{
    ColumnTimestampExtractor, MetadataTimestampExtractor, SourceOperator, TimestampExtractor,
    extractor_for,
};
