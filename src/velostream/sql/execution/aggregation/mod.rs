//! Aggregation runtime for streaming SQL queries.
//!
//! This module provides the incremental aggregate function contract used by
//! GROUP BY processing:
//!
//! - [`Udaf`] - typed, mergeable aggregate (initialize / aggregate / merge / map)
//! - [`KsqlAggregateFunction`] - the same contract over [`FieldValue`]s
//! - [`UdafFactory`] / [`UdafRegistry`] - resolution by name and element type
//!
//! ## Usage
//!
//! ```rust
//! use velostream::velostream::sql::execution::aggregation::UdafRegistry;
//! use velostream::velostream::sql::execution::types::{FieldValue, SqlType};
//!
//! let registry = UdafRegistry::with_builtins();
//! let sum = registry.resolve("SUM", &SqlType::BigInt).unwrap();
//!
//! let mut acc = sum.initial();
//! for v in [FieldValue::BigInt(2), FieldValue::Null, FieldValue::BigInt(40)] {
//!     acc = sum.aggregate(&v, acc).unwrap();
//! }
//! assert_eq!(sum.result(acc).unwrap(), FieldValue::BigInt(42));
//! ```
//!
//! [`FieldValue`]: crate::velostream::sql::execution::types::FieldValue

pub mod adapter;
pub mod registry;
pub mod udaf;

pub use adapter::{KsqlAggregateFunction, UdafAdapter};
pub use registry::{
    AvgFactory, CountFactory, MaxFactory, MinFactory, SumFactory, UdafFactory, UdafRegistry,
};
pub use udaf::{Avg, AvgAccumulator, Count, Max, Min, NumericValue, SqlValue, Sum, Udaf};
