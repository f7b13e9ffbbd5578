// Streaming SQL execution core for velostream
// Turns physical plans into live, record-at-a-time operators

pub mod context;
pub mod error;
pub mod execution;
pub mod plan;
pub mod schema;

// Re-export main API
pub use context::{QueryContext, QueryId, query_logger_name};
pub use error::{SqlError, SqlResult};
pub use execution::{FieldValue, SqlType, StreamRecord};
pub use plan::{PlanBuilder, PlanNode, QueryPlan};
pub use schema::{Column, ColumnRef, LogicalSchema};

// Version and feature info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const FEATURES: &[&str] = &[
    "stream_source",
    "filter",
    "projection",
    "scalar_functions", // ABS, CONCAT, LEN, UCASE, ROUND, ...
    "argument_coercion",
    "aggregate_functions", // SUM, COUNT, MIN, MAX, AVG
    "stream_stream_join",  // INNER, LEFT, OUTER with WITHIN windows and GRACE
    "partition_parallel_execution",
];
