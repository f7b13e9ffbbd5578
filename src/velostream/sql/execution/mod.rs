//! Streaming SQL execution.
//!
//! - [`types`] - values, SQL types and records
//! - [`expression`] - coercion and expression compilation
//! - [`aggregation`] - incremental aggregate functions
//! - [`join`] - windowed stream-stream join
//! - [`processors`] - runtime operators materialized from a plan

pub mod aggregation;
pub mod expression;
pub mod join;
pub mod processors;
pub mod types;

pub use types::{FieldValue, SourceRecord, SqlType, StreamRecord};
