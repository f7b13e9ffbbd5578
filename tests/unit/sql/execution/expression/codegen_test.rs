//! Parameter-slot layout of compiled expressions and user supplied functions

use std::sync::Arc;
use velostream::velostream::sql::error::{CoercionError, ErrorKind, SpecError, SqlError, SqlResult};
use velostream::velostream::sql::execution::expression::{
    ArgumentSpec, BinaryOperator, CodeGenSpec, CoercingTypeEnforcer, Expr, ExpressionCompiler,
    FunctionCategory, FunctionRegistry, FunctionSignature, ParamType, RowTypeEnforcer,
    ScalarFunction,
};
use velostream::velostream::sql::execution::types::{FieldValue, SqlType};
use velostream::velostream::sql::schema::{ColumnRef, LogicalSchema};

/// CLAMP(x, lo, hi) over non-null integers
#[derive(Debug)]
struct Clamp {
    signature: FunctionSignature,
}

impl Clamp {
    fn new() -> Self {
        let int = ParamType::Primitive(SqlType::Integer);
        Self {
            signature: FunctionSignature::new(vec![int.clone(), int.clone(), int], SqlType::Integer),
        }
    }
}

impl ScalarFunction for Clamp {
    fn name(&self) -> &str {
        "CLAMP"
    }

    fn category(&self) -> FunctionCategory {
        FunctionCategory::Math
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn invoke(&self, args: &[FieldValue]) -> SqlResult<FieldValue> {
        match args {
            [FieldValue::Integer(x), FieldValue::Integer(lo), FieldValue::Integer(hi)] => {
                Ok(FieldValue::Integer((*x).clamp(*lo, *hi)))
            }
            _ => Err(SqlError::function_error("CLAMP", "expected three integers")),
        }
    }
}

/// Rejects any raw value whose kind differs from the declared column type
struct StrictEnforcer;

impl RowTypeEnforcer for StrictEnforcer {
    fn enforce_column_type(
        &self,
        slot: usize,
        value: &FieldValue,
        sql_type: &SqlType,
    ) -> Result<FieldValue, CoercionError> {
        match value.sql_type() {
            None => Ok(FieldValue::Null),
            Some(actual) if actual == *sql_type => Ok(value.clone()),
            Some(_) => Err(CoercionError::Incompatible {
                index: slot,
                actual: value.type_name(),
                target: ParamType::for_column(sql_type),
            }),
        }
    }
}

fn inventory_schema() -> LogicalSchema {
    LogicalSchema::builder()
        .column("sku", SqlType::String)
        .column("qty", SqlType::String)
        .column("amount", SqlType::String)
        .build()
}

fn functions() -> FunctionRegistry {
    let mut functions = FunctionRegistry::with_builtins();
    functions.register(Arc::new(Clamp::new()));
    functions
}

fn clamp_qty() -> Expr {
    Expr::function(
        "clamp",
        vec![
            Expr::column("qty"),
            Expr::literal(FieldValue::Integer(0)),
            Expr::literal(FieldValue::Integer(10)),
        ],
    )
}

#[test]
fn test_registered_function_receives_coerced_arguments() {
    let schema = inventory_schema();
    let functions = functions();
    let compiled = ExpressionCompiler::new(&schema, &functions)
        .compile(&clamp_qty())
        .unwrap();

    assert_eq!(compiled.return_type(), &SqlType::Integer);
    assert_eq!(compiled.spec().argument_names(), vec!["clamp_0", "var1"]);

    let row = |qty: FieldValue| vec![FieldValue::String("A-1".to_string()), qty, FieldValue::Null];
    let value = compiled
        .evaluate(&row(FieldValue::String("42".to_string())), &CoercingTypeEnforcer)
        .unwrap();
    assert_eq!(value, FieldValue::Integer(10));

    let value = compiled
        .evaluate(&row(FieldValue::String("-3".to_string())), &CoercingTypeEnforcer)
        .unwrap();
    assert_eq!(value, FieldValue::Integer(0));
}

#[test]
fn test_null_into_primitive_parameter_is_data_quality_error() {
    let schema = inventory_schema();
    let functions = functions();
    let compiled = ExpressionCompiler::new(&schema, &functions)
        .compile(&clamp_qty())
        .unwrap();

    let row = vec![FieldValue::String("A-1".to_string()), FieldValue::Null, FieldValue::Null];
    let err = compiled.evaluate(&row, &CoercingTypeEnforcer).unwrap_err();

    assert!(err.is_coercion());
    assert_eq!(err.kind(), ErrorKind::DataQuality);
    assert!(matches!(
        err,
        SqlError::Coercion(CoercionError::NullToPrimitive { index: 0 })
    ));
}

#[test]
fn test_repeated_calls_share_column_slots() {
    let schema = inventory_schema();
    let functions = functions();
    let expr = Expr::binary(
        Expr::function("ABS", vec![Expr::column("amount")]),
        BinaryOperator::Add,
        Expr::function("ABS", vec![Expr::column("amount")]),
    );
    let compiled = ExpressionCompiler::new(&schema, &functions)
        .compile(&expr)
        .unwrap();
    let spec = compiled.spec();

    assert_eq!(spec.argument_names(), vec!["abs_0", "var1", "abs_2"]);
    assert_eq!(spec.unique_name_for_function("abs", 0).unwrap(), "abs_0");
    assert_eq!(spec.unique_name_for_function("ABS", 1).unwrap(), "abs_2");
    assert!(spec.unique_name_for_function("ABS", 2).is_err());

    let row = vec![
        FieldValue::String("A-1".to_string()),
        FieldValue::Null,
        FieldValue::String("-2.5".to_string()),
    ];
    let value = compiled.evaluate(&row, &CoercingTypeEnforcer).unwrap();
    assert_eq!(value, FieldValue::Double(5.0));
}

#[test]
fn test_enforcer_decides_column_types() {
    let schema = LogicalSchema::builder()
        .column("qty", SqlType::BigInt)
        .build();
    let functions = functions();
    let expr = Expr::binary(
        Expr::column("qty"),
        BinaryOperator::Multiply,
        Expr::literal(FieldValue::BigInt(2)),
    );
    let compiled = ExpressionCompiler::new(&schema, &functions)
        .compile(&expr)
        .unwrap();
    let row = vec![FieldValue::String("21".to_string())];

    assert_eq!(
        compiled.evaluate(&row, &CoercingTypeEnforcer).unwrap(),
        FieldValue::BigInt(42)
    );
    let err = compiled.evaluate(&row, &StrictEnforcer).unwrap_err();
    assert!(matches!(
        err,
        SqlError::Coercion(CoercionError::Incompatible { index: 0, .. })
    ));
}

#[test]
fn test_unbound_function_slot_is_reported() {
    let spec = CodeGenSpec::from_arguments(vec![
        ArgumentSpec::Column {
            name: "var0".to_string(),
            column_ref: ColumnRef::new("qty"),
            sql_type: SqlType::Integer,
            column_index: 0,
        },
        ArgumentSpec::Function {
            name: "clamp_1".to_string(),
            function_name: "CLAMP".to_string(),
            instance: None,
        },
    ]);
    assert_eq!(spec.unique_name_for_function("clamp", 0).unwrap(), "clamp_1");

    let mut params = spec.new_params();
    let err = spec
        .resolve(&[FieldValue::Integer(1)], &CoercingTypeEnforcer, &mut params)
        .unwrap_err();
    assert!(matches!(
        err,
        SqlError::Spec(SpecError::UnboundFunctionSlot { slot: 1, ref name }) if name == "clamp_1"
    ));
    assert_eq!(err.kind(), ErrorKind::Fatal);
}

#[test]
fn test_short_row_is_reported() {
    let schema = inventory_schema();
    let functions = functions();
    let compiled = ExpressionCompiler::new(&schema, &functions)
        .compile(&Expr::column("amount"))
        .unwrap();

    let err = compiled
        .evaluate(&[FieldValue::String("A-1".to_string())], &CoercingTypeEnforcer)
        .unwrap_err();
    assert!(matches!(
        err,
        SqlError::Spec(SpecError::ColumnIndexOutOfRange {
            slot: 0,
            column_index: 2,
            row_width: 1
        })
    ));
}
