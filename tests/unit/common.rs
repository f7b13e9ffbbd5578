//! Shared helpers for building plans and records in tests

use std::time::Duration;
use velostream::velostream::sql::context::QueryContext;
use velostream::velostream::sql::execution::types::{FieldValue, SourceRecord, SqlType, StreamRecord};
use velostream::velostream::sql::plan::{
    ExecutionStepProperties, Formats, PlanNode, StreamSource, TimestampExtractionPolicy,
};
use velostream::velostream::sql::schema::LogicalSchema;

/// Route log output through the test harness
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn step(id: &str, schema: LogicalSchema) -> ExecutionStepProperties {
    ExecutionStepProperties::new(id, QueryContext::of(&[id]), schema)
}

pub fn source(topic: &str, schema: LogicalSchema) -> PlanNode {
    PlanNode::from(StreamSource {
        properties: step(&format!("{}Source", topic), schema),
        topic_name: topic.to_string(),
        formats: Formats::default(),
        timestamp_policy: TimestampExtractionPolicy::RecordMetadata,
        offset_reset: None,
    })
}

/// `id BIGINT, region STRING, amount STRING`
pub fn orders_schema() -> LogicalSchema {
    LogicalSchema::builder()
        .column("id", SqlType::BigInt)
        .column("region", SqlType::String)
        .column("amount", SqlType::String)
        .build()
}

pub fn string(s: &str) -> FieldValue {
    FieldValue::String(s.to_string())
}

pub fn record(key: FieldValue, columns: Vec<FieldValue>, timestamp: i64) -> StreamRecord {
    StreamRecord::new(key, columns).with_timestamp(timestamp)
}

pub fn on_topic(topic: &str, record: StreamRecord) -> SourceRecord {
    SourceRecord::new(topic, record)
}

/// Poll `condition` until it holds; fails the test after five seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not reached within 5s");
}
