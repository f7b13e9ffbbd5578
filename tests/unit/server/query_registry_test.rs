//! Starting, feeding and terminating queries by id

use crate::unit::common::{eventually, init_logger, on_topic, orders_schema, record, source, step, string};
use std::collections::HashMap;
use std::time::Duration;
use velostream::velostream::config::{ConfiguredStatement, EngineConfig, WORKERS_PROPERTY};
use velostream::velostream::sql::context::QueryId;
use velostream::velostream::sql::error::SqlError;
use velostream::velostream::sql::execution::join::JoinType;
use velostream::velostream::sql::execution::types::{FieldValue, SqlType};
use velostream::velostream::sql::plan::{
    Formats, JoinWindowSpec, PlanNode, QueryPlan, StreamStreamJoin,
};
use velostream::velostream::server::{QueryEvent, QueryRegistry, QueryState};
use velostream::velostream::sql::schema::LogicalSchema;

fn passthrough(query_id: &str) -> QueryPlan {
    QueryPlan::new(
        QueryId::new(query_id),
        format!("CREATE STREAM {} AS SELECT * FROM orders EMIT CHANGES;", query_id),
        source("orders", orders_schema()),
    )
}

/// Orders LEFT JOIN shipments WITHIN 1 SECOND
fn orders_with_shipments() -> QueryPlan {
    let shipments = LogicalSchema::builder()
        .column("order_id", SqlType::BigInt)
        .build();
    let left = source("orders", orders_schema());
    let right = source("shipments", shipments);
    let schema = left.schema().join(right.schema());
    let join = PlanNode::from(StreamStreamJoin {
        properties: step("Join", schema),
        join_type: JoinType::Left,
        left_formats: Formats::default(),
        right_formats: Formats::default(),
        left: Box::new(left),
        right: Box::new(right),
        window: JoinWindowSpec::symmetric(Duration::from_secs(1)),
    });
    QueryPlan::new(
        QueryId::new("CSAS_SHIPPED_0"),
        "CREATE STREAM shipped AS SELECT * FROM orders o LEFT JOIN shipments s WITHIN 1 SECOND ON o.id = s.order_id;",
        join,
    )
}

fn order(id: i64) -> velostream::velostream::sql::execution::types::SourceRecord {
    on_topic(
        "orders",
        record(
            FieldValue::BigInt(id),
            vec![FieldValue::BigInt(id), string("eu"), string("1")],
            id * 1_000,
        ),
    )
}

#[tokio::test]
async fn test_start_and_terminate() {
    init_logger();
    let mut registry = QueryRegistry::new(EngineConfig::default());
    let query_id = QueryId::new("CSAS_ORDERS_0");
    let mut events = registry.start(passthrough("CSAS_ORDERS_0")).unwrap();
    assert_eq!(registry.state(&query_id), Some(QueryState::Running));

    registry.send(&query_id, order(1)).await.unwrap();
    match events.recv().await {
        Some(QueryEvent::Row { record, .. }) => assert_eq!(record.key, FieldValue::BigInt(1)),
        other => panic!("unexpected event {:?}", other),
    }

    let result = registry
        .terminate(&query_id, "TERMINATE CSAS_ORDERS_0;")
        .await
        .unwrap();
    assert!(result.all_graceful());
    assert!(registry.get(&query_id).is_none());
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn test_duplicate_query_id_is_rejected() {
    init_logger();
    let mut registry = QueryRegistry::new(EngineConfig::default());
    let _events = registry.start(passthrough("CSAS_ORDERS_0")).unwrap();

    let err = registry.start(passthrough("CSAS_ORDERS_0")).unwrap_err();
    match err {
        SqlError::Statement {
            message,
            statement_text,
        } => {
            assert_eq!(message, "Query CSAS_ORDERS_0 is already running");
            assert!(statement_text.starts_with("CREATE STREAM CSAS_ORDERS_0"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    registry.terminate_all().await;
}

#[tokio::test]
async fn test_unknown_query_id() {
    init_logger();
    let mut registry = QueryRegistry::new(EngineConfig::default());
    let missing = QueryId::new("CSAS_MISSING_9");

    let err = registry
        .terminate(&missing, "TERMINATE CSAS_MISSING_9;")
        .await
        .unwrap_err();
    match err {
        SqlError::Statement {
            message,
            statement_text,
        } => {
            assert_eq!(message, "Unknown queryId: CSAS_MISSING_9");
            assert_eq!(statement_text, "TERMINATE CSAS_MISSING_9;");
        }
        other => panic!("unexpected error {:?}", other),
    }

    let err = registry.send(&missing, order(1)).await.unwrap_err();
    assert!(matches!(err, SqlError::Execution { .. }));
}

#[tokio::test]
async fn test_statement_overrides_apply_per_query() {
    init_logger();
    let mut registry = QueryRegistry::new(EngineConfig::default());
    let mut overrides = HashMap::new();
    overrides.insert(WORKERS_PROPERTY.to_string(), "3".to_string());

    let plan = passthrough("CSAS_ORDERS_1");
    let text = plan.statement_text().to_string();
    let statement = ConfiguredStatement::new(plan, text, registry.config().clone())
        .with_overrides(overrides)
        .unwrap();
    let _events = registry.start_configured(statement).unwrap();
    let _others = registry.start(passthrough("CSAS_ORDERS_0")).unwrap();

    let configured = QueryId::new("CSAS_ORDERS_1");
    assert_eq!(registry.get(&configured).unwrap().worker_count(), 3);
    assert_eq!(
        registry.get(&QueryId::new("CSAS_ORDERS_0")).unwrap().worker_count(),
        1
    );

    let results = registry.terminate_all().await;
    let ids: Vec<&str> = results.iter().map(|(id, _)| id.id()).collect();
    assert_eq!(ids, vec!["CSAS_ORDERS_0", "CSAS_ORDERS_1"]);
    assert_eq!(results[1].1.workers_stopped, 3);
    assert!(registry.query_ids().is_empty());
}

#[tokio::test]
async fn test_terminate_flushes_join_state() {
    init_logger();
    let mut registry = QueryRegistry::new(EngineConfig::default());
    let query_id = QueryId::new("CSAS_SHIPPED_0");
    let mut events = registry.start(orders_with_shipments()).unwrap();

    registry.send(&query_id, order(1)).await.unwrap();
    registry.send(&query_id, order(2)).await.unwrap();
    eventually(|| registry.retained_state_size() == 2).await;

    let result = registry
        .terminate(&query_id, "TERMINATE CSAS_SHIPPED_0;")
        .await
        .unwrap();
    assert_eq!(result.rows_flushed, 2);

    let mut padded = Vec::new();
    while let Some(event) = events.recv().await {
        if let QueryEvent::Row { record, .. } = event {
            padded.push(record);
        }
    }
    assert_eq!(padded.len(), 2);
    assert_eq!(padded[0].key, FieldValue::BigInt(1));
    assert_eq!(padded[0].columns[3], FieldValue::Null);
}
