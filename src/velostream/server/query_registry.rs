//! Running queries by id

use super::query_executor::{QueryEvent, QueryExecutor, QueryState};
use super::shutdown::ShutdownResult;
use crate::velostream::config::{ConfiguredStatement, EngineConfig};
use crate::velostream::sql::context::QueryId;
use crate::velostream::sql::error::{SqlError, SqlResult};
use crate::velostream::sql::execution::aggregation::UdafRegistry;
use crate::velostream::sql::execution::expression::FunctionRegistry;
use crate::velostream::sql::execution::types::SourceRecord;
use crate::velostream::sql::plan::QueryPlan;
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Starts, feeds and terminates persistent queries
pub struct QueryRegistry {
    config: EngineConfig,
    functions: Arc<FunctionRegistry>,
    aggregates: Arc<UdafRegistry>,
    queries: BTreeMap<QueryId, QueryExecutor>,
}

impl QueryRegistry {
    /// Registry with the built-in scalar and aggregate functions
    pub fn new(config: EngineConfig) -> Self {
        Self::with_functions(
            config,
            Arc::new(FunctionRegistry::with_builtins()),
            Arc::new(UdafRegistry::with_builtins()),
        )
    }

    pub fn with_functions(
        config: EngineConfig,
        functions: Arc<FunctionRegistry>,
        aggregates: Arc<UdafRegistry>,
    ) -> Self {
        Self {
            config,
            functions,
            aggregates,
            queries: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a query under the registry's configuration
    pub fn start(&mut self, plan: QueryPlan) -> SqlResult<mpsc::UnboundedReceiver<QueryEvent>> {
        let config = self.config.clone();
        self.start_with_config(&plan, &config)
    }

    /// Start a query under its statement's configuration and overrides
    pub fn start_configured(
        &mut self,
        statement: ConfiguredStatement<QueryPlan>,
    ) -> SqlResult<mpsc::UnboundedReceiver<QueryEvent>> {
        let config = statement.config().clone();
        self.start_with_config(statement.statement(), &config)
    }

    fn start_with_config(
        &mut self,
        plan: &QueryPlan,
        config: &EngineConfig,
    ) -> SqlResult<mpsc::UnboundedReceiver<QueryEvent>> {
        if self.queries.contains_key(&plan.query_id) {
            return Err(SqlError::statement_error(
                format!("Query {} is already running", plan.query_id),
                plan.statement_text.clone(),
            ));
        }
        let (executor, events) =
            QueryExecutor::start(plan, config, &self.functions, &self.aggregates)?;
        self.queries.insert(plan.query_id.clone(), executor);
        Ok(events)
    }

    pub fn get(&self, query_id: &QueryId) -> Option<&QueryExecutor> {
        self.queries.get(query_id)
    }

    pub fn query_ids(&self) -> Vec<&QueryId> {
        self.queries.keys().collect()
    }

    pub fn state(&self, query_id: &QueryId) -> Option<QueryState> {
        self.queries.get(query_id).map(QueryExecutor::state)
    }

    /// Route a record to a running query
    pub async fn send(&self, query_id: &QueryId, record: SourceRecord) -> SqlResult<()> {
        let executor = self
            .queries
            .get(query_id)
            .ok_or_else(|| SqlError::execution_error(format!("Unknown queryId: {}", query_id)))?;
        executor.send(record).await
    }

    /// Retained state of every query
    pub fn retained_state_size(&self) -> usize {
        self.queries
            .values()
            .map(QueryExecutor::retained_state_size)
            .sum()
    }

    /// TERMINATE a query; `statement_text` is the TERMINATE statement, quoted on failure
    pub async fn terminate(
        &mut self,
        query_id: &QueryId,
        statement_text: &str,
    ) -> SqlResult<ShutdownResult> {
        let executor = self.queries.remove(query_id).ok_or_else(|| {
            SqlError::statement_error(format!("Unknown queryId: {}", query_id), statement_text)
        })?;
        info!("Terminating query {}", query_id);
        Ok(executor.shutdown().await)
    }

    /// Terminate every query, in id order
    pub async fn terminate_all(&mut self) -> Vec<(QueryId, ShutdownResult)> {
        let queries = std::mem::take(&mut self.queries);
        let mut results = Vec::with_capacity(queries.len());
        for (query_id, executor) in queries {
            let result = executor.shutdown().await;
            results.push((query_id, result));
        }
        results
    }
}
