//! Query teardown
//!
//! A [`ShutdownCoordinator`] broadcasts a [`ShutdownSignal`] to every worker of
//! a query. Workers stop pulling input, finish the record in hand, flush held
//! state and exit; the executor collects a [`ShutdownResult`].

use log::warn;
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;

/// Why a query is being torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// TERMINATE requested by the user
    Terminate,
    /// A worker hit an error the processing policy does not tolerate
    Failure,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Terminate => write!(f, "TERMINATE"),
            ShutdownSignal::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Broadcasts the shutdown of one query to all of its workers
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<ShutdownSignal>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    /// Get a receiver that will be notified when shutdown is triggered
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.sender.subscribe()
    }

    pub fn trigger(&self, signal: ShutdownSignal) {
        if let Err(e) = self.sender.send(signal) {
            warn!("No shutdown listeners registered: {:?}", e);
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of tearing down a query
#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownResult {
    /// Workers that exited after flushing their state
    pub workers_stopped: usize,
    /// Workers whose task panicked or was cancelled
    pub workers_failed: usize,
    /// Rows emitted while flushing held state
    pub rows_flushed: usize,
    pub elapsed: Duration,
}

impl ShutdownResult {
    pub fn all_graceful(&self) -> bool {
        self.workers_failed == 0
    }
}

impl fmt::Display for ShutdownResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all_graceful() {
            write!(
                f,
                "Graceful shutdown complete: {} workers stopped, {} rows flushed in {:?}",
                self.workers_stopped, self.rows_flushed, self.elapsed
            )
        } else {
            write!(
                f,
                "Shutdown complete: {} stopped, {} failed in {:?}",
                self.workers_stopped, self.workers_failed, self.elapsed
            )
        }
    }
}
