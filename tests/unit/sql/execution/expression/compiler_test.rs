//! Expression compilation over joined schemas and built-in functions

use velostream::velostream::sql::error::{CoercionError, SqlError};
use velostream::velostream::sql::execution::expression::{
    BinaryOperator, CoercingTypeEnforcer, Expr, ExpressionCompiler, FunctionRegistry,
};
use velostream::velostream::sql::execution::types::{FieldValue, SqlType};
use velostream::velostream::sql::schema::LogicalSchema;

/// `o.id, o.note, s.id, s.tags` as produced by joining orders with shipments
fn joined_schema() -> LogicalSchema {
    let orders = LogicalSchema::builder()
        .column("id", SqlType::BigInt)
        .column("note", SqlType::String)
        .build()
        .with_source("o");
    let shipments = LogicalSchema::builder()
        .column("id", SqlType::BigInt)
        .column("tags", SqlType::array(SqlType::String))
        .build()
        .with_source("s");
    orders.join(&shipments)
}

fn joined_row() -> Vec<FieldValue> {
    vec![
        FieldValue::BigInt(7),
        FieldValue::String("fragile".to_string()),
        FieldValue::BigInt(9),
        FieldValue::Array(vec![
            FieldValue::String("air".to_string()),
            FieldValue::Null,
        ]),
    ]
}

#[test]
fn test_qualified_columns_resolve_to_their_side() {
    let schema = joined_schema();
    let functions = FunctionRegistry::with_builtins();
    let compiler = ExpressionCompiler::new(&schema, &functions);

    let right_minus_left = compiler
        .compile(&Expr::binary(
            Expr::qualified("s", "id"),
            BinaryOperator::Subtract,
            Expr::qualified("o", "id"),
        ))
        .unwrap();
    assert_eq!(right_minus_left.return_type(), &SqlType::BigInt);
    assert_eq!(
        right_minus_left
            .evaluate(&joined_row(), &CoercingTypeEnforcer)
            .unwrap(),
        FieldValue::BigInt(2)
    );

    // Unqualified names bind to the first match, the left side
    let unqualified = compiler.compile(&Expr::column("id")).unwrap();
    assert_eq!(
        unqualified
            .evaluate(&joined_row(), &CoercingTypeEnforcer)
            .unwrap(),
        FieldValue::BigInt(7)
    );
}

#[test]
fn test_unknown_qualifier_is_plan_error() {
    let schema = joined_schema();
    let functions = FunctionRegistry::with_builtins();
    let err = ExpressionCompiler::new(&schema, &functions)
        .compile(&Expr::qualified("x", "id"))
        .unwrap_err();
    assert!(matches!(err, SqlError::Plan { .. }));
}

#[test]
fn test_function_resolution_errors_surface_at_compile_time() {
    let schema = joined_schema();
    let functions = FunctionRegistry::with_builtins();
    let compiler = ExpressionCompiler::new(&schema, &functions);

    let unknown = compiler
        .compile(&Expr::function("REVERSE", vec![Expr::column("note")]))
        .unwrap_err();
    assert!(unknown.to_string().contains("Unknown function 'REVERSE'"));

    let arity = compiler
        .compile(&Expr::function(
            "UCASE",
            vec![Expr::column("note"), Expr::column("note")],
        ))
        .unwrap_err();
    assert!(matches!(arity, SqlError::Plan { .. }));
}

#[test]
fn test_builtins_over_joined_row() {
    let schema = joined_schema();
    let functions = FunctionRegistry::with_builtins();
    let compiler = ExpressionCompiler::new(&schema, &functions);

    let tag_count = compiler
        .compile(&Expr::function(
            "ARRAY_LENGTH",
            vec![Expr::qualified("s", "tags")],
        ))
        .unwrap();
    assert_eq!(tag_count.return_type(), &SqlType::Integer);
    assert_eq!(
        tag_count.evaluate(&joined_row(), &CoercingTypeEnforcer).unwrap(),
        FieldValue::Integer(2)
    );

    let label = compiler
        .compile(&Expr::function(
            "CONCAT",
            vec![
                Expr::function("UCASE", vec![Expr::qualified("o", "note")]),
                Expr::literal(FieldValue::String("/".to_string())),
                Expr::literal(FieldValue::Null),
                Expr::qualified("o", "note"),
            ],
        ))
        .unwrap();
    assert_eq!(
        label.evaluate(&joined_row(), &CoercingTypeEnforcer).unwrap(),
        FieldValue::String("FRAGILE/fragile".to_string())
    );
}

#[test]
fn test_function_argument_coercion_failure_names_argument() {
    let schema = joined_schema();
    let functions = FunctionRegistry::with_builtins();
    let compiled = ExpressionCompiler::new(&schema, &functions)
        .compile(&Expr::function("ABS", vec![Expr::qualified("o", "note")]))
        .unwrap();

    let err = compiled
        .evaluate(&joined_row(), &CoercingTypeEnforcer)
        .unwrap_err();
    match err {
        SqlError::Coercion(CoercionError::StringParse {
            index,
            value,
            target,
        }) => {
            assert_eq!(index, 0);
            assert_eq!(value, "fragile");
            assert_eq!(target, SqlType::Double);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_predicates_follow_null_semantics() {
    let schema = joined_schema();
    let functions = FunctionRegistry::with_builtins();
    let predicate = ExpressionCompiler::new(&schema, &functions)
        .compile(&Expr::binary(
            Expr::binary(
                Expr::qualified("o", "id"),
                BinaryOperator::LessThan,
                Expr::qualified("s", "id"),
            ),
            BinaryOperator::And,
            Expr::Not(Box::new(Expr::IsNull(Box::new(Expr::qualified("o", "note"))))),
        ))
        .unwrap();
    assert_eq!(predicate.return_type(), &SqlType::Boolean);
    assert!(predicate
        .evaluate_predicate(&joined_row(), &CoercingTypeEnforcer)
        .unwrap());

    let mut row = joined_row();
    row[2] = FieldValue::Null;
    assert!(!predicate
        .evaluate_predicate(&row, &CoercingTypeEnforcer)
        .unwrap());
}

#[test]
fn test_non_boolean_predicate_is_rejected() {
    let schema = joined_schema();
    let functions = FunctionRegistry::with_builtins();
    let compiled = ExpressionCompiler::new(&schema, &functions)
        .compile(&Expr::qualified("o", "note"))
        .unwrap();
    let err = compiled
        .evaluate_predicate(&joined_row(), &CoercingTypeEnforcer)
        .unwrap_err();
    assert!(matches!(err, SqlError::Execution { .. }));
    assert!(err.to_string().contains("o.note"));
}

#[test]
fn test_expression_text_is_kept() {
    let schema = joined_schema();
    let functions = FunctionRegistry::with_builtins();
    let expr = Expr::binary(
        Expr::function("LEN", vec![Expr::qualified("o", "note")]),
        BinaryOperator::GreaterThanOrEqual,
        Expr::literal(FieldValue::Integer(3)),
    );
    let compiled = ExpressionCompiler::new(&schema, &functions)
        .compile(&expr)
        .unwrap();
    assert_eq!(compiled.text(), "(LEN(o.note) >= 3)");

    let json = serde_json::to_string(&expr).unwrap();
    let restored: Expr = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, expr);
}
