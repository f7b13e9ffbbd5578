//! Query identity and step context paths.
//!
//! Every execution step carries a [`QueryContext`], the path of names from the
//! query root to that step (for example `["Join", "Left", "Source"]`). Joined
//! with the query id it forms the logger name used as the `log` target for
//! everything the step reports, which keeps log lines and metrics of one
//! operator correlated across workers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a persistent query
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(String);

impl QueryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Path of an execution step within its query
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryContext {
    context: Vec<String>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(path: &[&str]) -> Self {
        Self {
            context: path.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Return a new context one level deeper
    pub fn push(&self, name: &str) -> Self {
        let mut context = self.context.clone();
        context.push(name.to_string());
        Self { context }
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }
}

impl fmt::Display for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.context.join("."))
    }
}

/// Logger name for a step: the query id followed by the context path, `.` separated
pub fn query_logger_name(query_id: &QueryId, context: &QueryContext) -> String {
    std::iter::once(query_id.id())
        .chain(context.context.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(".")
}
