//! Plan node identity, serialization and builder dispatch

use crate::unit::common::{orders_schema, source, step};
use std::time::Duration;
use velostream::velostream::sql::context::QueryId;
use velostream::velostream::sql::execution::expression::{BinaryOperator, Expr};
use velostream::velostream::sql::execution::join::JoinType;
use velostream::velostream::sql::execution::types::{FieldValue, SqlType};
use velostream::velostream::sql::plan::{
    AggregateCall, Format, Formats, JoinWindowSpec, PlanNode, PlanSummary, QueryPlan,
    SelectExpression, StreamAggregate, StreamFilter, StreamSelect, StreamSink, StreamStreamJoin,
};
use velostream::velostream::sql::schema::LogicalSchema;

fn shipments_schema() -> LogicalSchema {
    LogicalSchema::builder()
        .column("order_id", SqlType::BigInt)
        .column("warehouse", SqlType::String)
        .build()
}

fn join_plan(window: JoinWindowSpec) -> PlanNode {
    let left = source("orders", orders_schema());
    let right = source("shipments", shipments_schema());
    let schema = left.schema().join(right.schema());
    let join = PlanNode::from(StreamStreamJoin {
        properties: step("Join", schema.clone()),
        join_type: JoinType::Left,
        left_formats: Formats::default(),
        right_formats: Formats::of(Format::Kafka, Format::Avro),
        left: Box::new(left),
        right: Box::new(right),
        window,
    });
    let filter = PlanNode::from(StreamFilter {
        properties: step("Filter", schema.clone()),
        source: Box::new(join),
        predicate: Expr::binary(
            Expr::column("region"),
            BinaryOperator::Equal,
            Expr::literal(FieldValue::String("eu".to_string())),
        ),
    });
    PlanNode::from(StreamSink {
        properties: step("Sink", schema),
        source: Box::new(filter),
        topic_name: "eu_shipments".to_string(),
        formats: Formats::default(),
    })
}

#[test]
fn test_plans_compare_structurally() {
    let window = JoinWindowSpec::symmetric(Duration::from_secs(5));
    assert_eq!(join_plan(window), join_plan(window));
    assert_ne!(
        join_plan(window),
        join_plan(window.with_grace(Duration::from_secs(1)))
    );
}

#[test]
fn test_query_plan_survives_json() {
    let plan = QueryPlan::new(
        QueryId::new("CSAS_EU_SHIPMENTS_1"),
        "CREATE STREAM eu_shipments AS SELECT * FROM orders o LEFT JOIN shipments s WITHIN 5 SECONDS ON o.id = s.order_id WHERE region = 'eu';",
        join_plan(JoinWindowSpec::symmetric(Duration::from_secs(5))),
    );

    let json = serde_json::to_string(&plan).unwrap();
    let restored: QueryPlan = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, plan);
    assert_eq!(restored.physical_plan().source_topics(), vec!["orders", "shipments"]);
}

#[test]
fn test_summary_lists_every_step() {
    let schema = orders_schema();
    let select = PlanNode::from(StreamSelect {
        properties: step("Project", schema.clone()),
        source: Box::new(source("orders", schema.clone())),
        select_expressions: vec![SelectExpression::new("id", Expr::column("id"))],
    });
    let aggregate = PlanNode::from(StreamAggregate {
        properties: step("Aggregate", schema),
        source: Box::new(select),
        group_by: vec![Expr::column("id")],
        aggregates: vec![AggregateCall::count_star()],
    });

    let summary = PlanSummary::summarize(&aggregate).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("[ AGGREGATE ] | COUNT(*) GROUP BY id"));
    assert!(lines[1].contains("[ PROJECT ] | select: id AS id"));
    assert!(lines[2].contains("[ SOURCE ] | topic: orders"));
}
