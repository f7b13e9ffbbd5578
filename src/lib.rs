//! # velostream-core
//!
//! The execution core of a streaming SQL engine. A physical plan produced by an
//! external planner is materialized into live operators that are evaluated
//! record-by-record against unbounded, partitioned streams.
//!
//! ## Features
//!
//! - **Plan model**: immutable, structurally comparable execution-plan nodes
//!   (sources, filters, projections, aggregations, stream-stream joins, sinks)
//! - **Expression compilation**: flat parameter-slot layouts resolved per record,
//!   with runtime argument coercion for function calls
//! - **Windowed joins**: symmetric before/after windows with grace periods, outer
//!   join null padding and bounded, evictable state
//! - **Aggregates**: incremental and mergeable UDAFs specialised per numeric type
//! - **Partition-parallel execution**: shared-nothing workers with graceful teardown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use velostream::velostream::sql::execution::expression::{ArgCoercer, ParamType};
//! use velostream::velostream::sql::execution::types::{FieldValue, SqlType};
//!
//! let value = FieldValue::String("42".to_string());
//! let coerced = ArgCoercer::coerce(&value, &ParamType::Primitive(SqlType::Integer), 0).unwrap();
//! assert_eq!(coerced.into_owned(), FieldValue::Integer(42));
//! ```

#![allow(clippy::large_enum_variant)]
#![allow(clippy::new_without_default)]

pub mod velostream;
