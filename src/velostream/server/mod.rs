//! Query execution server
//!
//! Runs persistent queries on partition-parallel tokio workers.
//!
//! - **QueryRegistry**: starts, feeds and terminates queries by id
//! - **QueryExecutor**: the workers of one query and its state
//! - **ShutdownCoordinator**: broadcasts teardown to the workers of a query
//!
//! ## Usage
//!
//! ```rust,no_run
//! use velostream::velostream::config::EngineConfig;
//! use velostream::velostream::server::QueryRegistry;
//! # use velostream::velostream::sql::QueryPlan;
//!
//! # async fn example(plan: QueryPlan) -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = QueryRegistry::new(EngineConfig::default().with_workers(4));
//! let query_id = plan.query_id.clone();
//! let mut events = registry.start(plan)?;
//! // ... registry.send(&query_id, record).await? ...
//! registry.terminate(&query_id, "TERMINATE q1;").await?;
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod query_executor;
pub mod query_registry;
pub mod shutdown;

pub use query_executor::{QueryEvent, QueryExecutor, QueryState};
pub use query_registry::QueryRegistry;
pub use shutdown::{ShutdownCoordinator, ShutdownResult, ShutdownSignal};
