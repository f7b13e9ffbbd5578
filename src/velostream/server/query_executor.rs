//! Partition-parallel execution of one persistent query.
//!
//! Every worker is a tokio task owning its own operator tree built from the
//! same plan. Input records are routed by `partition % workers`, so per-key
//! state is only ever touched by one task and needs no locking.
//!
//! Per-record failures are reported as [`QueryEvent::Error`]. Data-quality
//! errors are skipped under [`ProcessingErrorPolicy::LogAndContinue`]; fatal
//! errors, or any error under [`ProcessingErrorPolicy::Fail`], move the query
//! to [`QueryState::Error`] and shut all workers down.

use super::shutdown::{ShutdownCoordinator, ShutdownResult, ShutdownSignal};
use crate::velostream::config::{EngineConfig, ProcessingErrorPolicy};
use crate::velostream::sql::context::{QueryContext, QueryId, query_logger_name};
use crate::velostream::sql::error::{ErrorKind, SqlError, SqlResult};
use crate::velostream::sql::execution::aggregation::UdafRegistry;
use crate::velostream::sql::execution::expression::FunctionRegistry;
use crate::velostream::sql::execution::processors::{OperatorHandle, RuntimePlanBuilder};
use crate::velostream::sql::execution::types::{SourceRecord, StreamRecord};
use crate::velostream::sql::plan::QueryPlan;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Output of a running query
#[derive(Debug, Clone)]
pub enum QueryEvent {
    /// A row reached the root of the plan
    Row {
        query_id: QueryId,
        worker: usize,
        sink_topic: Option<String>,
        record: StreamRecord,
    },
    /// A record could not be processed
    Error {
        query_id: QueryId,
        statement_text: String,
        error: SqlError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Running,
    /// Stopped by an error the processing policy does not tolerate
    Error,
    Terminated,
}

struct Worker {
    input: mpsc::Sender<SourceRecord>,
    /// Resolves to the number of rows emitted while flushing
    task: JoinHandle<usize>,
}

/// Runs one query on `workers` tokio tasks
pub struct QueryExecutor {
    query_id: QueryId,
    statement_text: String,
    workers: Vec<Worker>,
    /// Retained operator state per worker, updated after every record
    gauges: Arc<Vec<AtomicUsize>>,
    state: Arc<watch::Sender<QueryState>>,
    shutdown: ShutdownCoordinator,
}

impl QueryExecutor {
    /// Materialize the plan once per worker and start the workers.
    ///
    /// Plan errors are returned before any task is spawned. Must be called
    /// within a tokio runtime.
    pub fn start(
        plan: &QueryPlan,
        config: &EngineConfig,
        functions: &FunctionRegistry,
        aggregates: &UdafRegistry,
    ) -> SqlResult<(Self, mpsc::UnboundedReceiver<QueryEvent>)> {
        config.validate()?;

        let trees = (0..config.workers)
            .map(|_| {
                let mut builder =
                    RuntimePlanBuilder::new(plan.query_id.clone(), config, functions, aggregates);
                plan.physical_plan().build(&mut builder)
            })
            .collect::<SqlResult<Vec<_>>>()?;

        let (events, receiver) = mpsc::unbounded_channel();
        let gauges: Arc<Vec<AtomicUsize>> =
            Arc::new((0..config.workers).map(|_| AtomicUsize::new(0)).collect());
        let (state, _) = watch::channel(QueryState::Running);
        let state = Arc::new(state);
        let shutdown = ShutdownCoordinator::new();

        let logger = query_logger_name(&plan.query_id, &QueryContext::new());
        info!(
            target: logger.as_str(),
            "Starting query on {} workers: {}",
            config.workers,
            plan.statement_text
        );

        let workers = trees
            .into_iter()
            .enumerate()
            .map(|(index, tree)| {
                let (input, records) = mpsc::channel(config.channel_capacity);
                let context = WorkerContext {
                    index,
                    query_id: plan.query_id.clone(),
                    statement_text: plan.statement_text.clone(),
                    logger: query_logger_name(
                        &plan.query_id,
                        &QueryContext::of(&["Worker", &index.to_string()]),
                    ),
                    sink_topic: tree.sink_topic().map(str::to_string),
                    policy: config.processing_error_policy,
                    events: events.clone(),
                    gauges: Arc::clone(&gauges),
                    state: Arc::clone(&state),
                    shutdown: shutdown.clone(),
                };
                // Subscribe before spawning so no signal is missed
                let signals = shutdown.subscribe();
                let task = tokio::spawn(context.run(tree, records, signals));
                Worker { input, task }
            })
            .collect();

        Ok((
            Self {
                query_id: plan.query_id.clone(),
                statement_text: plan.statement_text.clone(),
                workers,
                gauges,
                state,
                shutdown,
            },
            receiver,
        ))
    }

    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }

    pub fn statement_text(&self) -> &str {
        &self.statement_text
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn state(&self) -> QueryState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn state_changes(&self) -> watch::Receiver<QueryState> {
        self.state.subscribe()
    }

    /// Worker a record of `partition` is routed to
    pub fn worker_for(&self, partition: i32) -> usize {
        partition.rem_euclid(self.workers.len() as i32) as usize
    }

    /// Hand a record to the worker owning its partition; waits while that worker's channel is full
    pub async fn send(&self, record: SourceRecord) -> SqlResult<()> {
        let state = self.state();
        if state != QueryState::Running {
            return Err(SqlError::statement_error(
                format!("Query {} is not running ({:?})", self.query_id, state),
                self.statement_text.clone(),
            ));
        }
        let index = self.worker_for(record.record.partition);
        self.workers[index].input.send(record).await.map_err(|_| {
            SqlError::execution_error(format!(
                "Worker {} of query {} has stopped",
                index, self.query_id
            ))
        })
    }

    /// Entries held by joins and aggregations across all workers
    pub fn retained_state_size(&self) -> usize {
        self.gauges.iter().map(|g| g.load(Ordering::Relaxed)).sum()
    }

    pub fn worker_state_sizes(&self) -> Vec<usize> {
        self.gauges
            .iter()
            .map(|g| g.load(Ordering::Relaxed))
            .collect()
    }

    /// Stop pulling input, flush held state and wait for every worker
    pub async fn shutdown(self) -> ShutdownResult {
        self.shutdown.trigger(ShutdownSignal::Terminate);
        self.join_workers().await
    }

    /// Close the input, let workers drain what is queued, flush and exit
    pub async fn finish(self) -> ShutdownResult {
        self.join_workers().await
    }

    async fn join_workers(self) -> ShutdownResult {
        let started = Instant::now();
        let logger = query_logger_name(&self.query_id, &QueryContext::new());
        let mut result = ShutdownResult {
            workers_stopped: 0,
            workers_failed: 0,
            rows_flushed: 0,
            elapsed: Default::default(),
        };

        for (index, Worker { input, task }) in self.workers.into_iter().enumerate() {
            drop(input);
            match task.await {
                Ok(flushed) => {
                    result.workers_stopped += 1;
                    result.rows_flushed += flushed;
                }
                Err(e) => {
                    error!(target: logger.as_str(), "Worker {} did not stop cleanly: {}", index, e);
                    result.workers_failed += 1;
                }
            }
        }

        self.state.send_if_modified(|state| {
            if *state == QueryState::Running {
                *state = QueryState::Terminated;
                true
            } else {
                false
            }
        });

        result.elapsed = started.elapsed();
        info!(target: logger.as_str(), "{}", result);
        result
    }
}

/// Everything a worker task owns besides its operator tree
struct WorkerContext {
    index: usize,
    query_id: QueryId,
    statement_text: String,
    logger: String,
    sink_topic: Option<String>,
    policy: ProcessingErrorPolicy,
    events: mpsc::UnboundedSender<QueryEvent>,
    gauges: Arc<Vec<AtomicUsize>>,
    state: Arc<watch::Sender<QueryState>>,
    shutdown: ShutdownCoordinator,
}

impl WorkerContext {
    async fn run(
        self,
        mut tree: OperatorHandle,
        mut records: mpsc::Receiver<SourceRecord>,
        mut signals: broadcast::Receiver<ShutdownSignal>,
    ) -> usize {
        debug!(target: self.logger.as_str(), "Worker {} started", self.index);

        loop {
            tokio::select! {
                biased;
                signal = signals.recv() => {
                    debug!(target: self.logger.as_str(), "Worker {} stopping: {:?}", self.index, signal);
                    break;
                }
                next = records.recv() => {
                    let Some(record) = next else {
                        debug!(target: self.logger.as_str(), "Worker {} input closed", self.index);
                        break;
                    };
                    if !self.process(&mut tree, &record) {
                        break;
                    }
                }
            }
        }

        let flushed = match tree.flush() {
            Ok(rows) => {
                let count = rows.len();
                self.emit(rows);
                count
            }
            Err(error) => {
                self.report(error);
                0
            }
        };
        self.update_gauge(&tree);
        debug!(
            target: self.logger.as_str(),
            "Worker {} stopped after flushing {} rows",
            self.index,
            flushed
        );
        flushed
    }

    /// Returns false when the query must stop
    fn process(&self, tree: &mut OperatorHandle, record: &SourceRecord) -> bool {
        let outcome = tree.push(record);
        self.update_gauge(tree);
        match outcome {
            Ok(rows) => {
                self.emit(rows);
                true
            }
            Err(error) => {
                let fatal =
                    error.kind() == ErrorKind::Fatal || self.policy == ProcessingErrorPolicy::Fail;
                if fatal {
                    error!(
                        target: self.logger.as_str(),
                        "Query failed on record at offset {} (partition {}): {}",
                        record.record.offset,
                        record.record.partition,
                        error
                    );
                } else {
                    warn!(
                        target: self.logger.as_str(),
                        "Skipping record at offset {} (partition {}): {}",
                        record.record.offset,
                        record.record.partition,
                        error
                    );
                }
                self.report(error);
                if fatal {
                    self.state.send_replace(QueryState::Error);
                    self.shutdown.trigger(ShutdownSignal::Failure);
                }
                !fatal
            }
        }
    }

    fn emit(&self, rows: Vec<StreamRecord>) {
        for record in rows {
            let event = QueryEvent::Row {
                query_id: self.query_id.clone(),
                worker: self.index,
                sink_topic: self.sink_topic.clone(),
                record,
            };
            if self.events.send(event).is_err() {
                debug!(target: self.logger.as_str(), "Event receiver dropped");
                return;
            }
        }
    }

    fn report(&self, error: SqlError) {
        let event = QueryEvent::Error {
            query_id: self.query_id.clone(),
            statement_text: self.statement_text.clone(),
            error,
        };
        if self.events.send(event).is_err() {
            debug!(target: self.logger.as_str(), "Event receiver dropped");
        }
    }

    fn update_gauge(&self, tree: &OperatorHandle) {
        if let Some(gauge) = self.gauges.get(self.index) {
            gauge.store(tree.retained_state_size(), Ordering::Relaxed);
        }
    }
}
