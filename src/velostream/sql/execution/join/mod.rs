//! Stream-stream join processing.
//!
//! - [`WindowedJoinOperator`] - joins two keyed streams within a time window
//! - [`WindowedStateStore`] - buffer abstraction the operator is generic over
//! - [`InMemoryWindowStore`] - time-indexed in-memory buffer
//! - [`JoinWindows`] - window bounds, grace period and allowed lateness

pub mod operator;
pub mod state_store;
pub mod windows;

pub use operator::{JoinStats, WindowedJoinOperator};
pub use state_store::{
    InMemoryWindowStore, WindowEntry, WindowStoreConfig, WindowStoreStats, WindowedStateStore,
};
pub use windows::{JoinSide, JoinType, JoinWindows};
