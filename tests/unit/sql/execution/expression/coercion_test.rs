//! Argument coercion properties

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::borrow::Cow;
use velostream::velostream::sql::error::CoercionError;
use velostream::velostream::sql::execution::expression::{ArgCoercer, ParamType};
use velostream::velostream::sql::execution::types::{FieldValue, SqlType};

const NUMERIC_TYPES: [SqlType; 6] = [
    SqlType::TinyInt,
    SqlType::SmallInt,
    SqlType::Integer,
    SqlType::BigInt,
    SqlType::Real,
    SqlType::Double,
];

#[test]
fn test_null_passes_every_nullable_target() {
    let mut targets: Vec<ParamType> = NUMERIC_TYPES
        .iter()
        .cloned()
        .map(ParamType::Nullable)
        .collect();
    targets.push(ParamType::Nullable(SqlType::String));
    targets.push(ParamType::Nullable(SqlType::Boolean));
    targets.push(ParamType::Array(Box::new(ParamType::Primitive(SqlType::Integer))));

    let null = FieldValue::Null;
    for target in targets {
        let coerced = ArgCoercer::coerce(&null, &target, 0).unwrap();
        assert_eq!(*coerced, FieldValue::Null, "target {}", target);
    }
}

#[test]
fn test_null_fails_every_primitive_target() {
    for (index, sql_type) in NUMERIC_TYPES.iter().enumerate() {
        let err = ArgCoercer::coerce(&FieldValue::Null, &ParamType::Primitive(sql_type.clone()), index)
            .unwrap_err();
        assert_eq!(err, CoercionError::NullToPrimitive { index });
    }
}

#[test]
fn test_numeric_strings_parse_like_literals() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let n: i32 = rng.r#gen();
        let value = FieldValue::String(n.to_string());
        let coerced = ArgCoercer::coerce(&value, &ParamType::Primitive(SqlType::Integer), 0).unwrap();
        assert_eq!(coerced.into_owned(), FieldValue::Integer(n));

        let coerced = ArgCoercer::coerce(&value, &ParamType::Primitive(SqlType::BigInt), 0).unwrap();
        assert_eq!(coerced.into_owned(), FieldValue::BigInt(n as i64));
    }
}

#[test]
fn test_widening_then_narrowing_is_lossless() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..500 {
        let n: i32 = rng.r#gen();
        let wide = ArgCoercer::coerce(&FieldValue::Integer(n), &ParamType::Primitive(SqlType::BigInt), 0)
            .unwrap()
            .into_owned();
        let narrow = ArgCoercer::coerce(&wide, &ParamType::Primitive(SqlType::Integer), 0)
            .unwrap()
            .into_owned();
        assert_eq!(narrow, FieldValue::Integer(n));

        let double = ArgCoercer::coerce(&FieldValue::Integer(n), &ParamType::Primitive(SqlType::Double), 0)
            .unwrap()
            .into_owned();
        assert_eq!(double, FieldValue::Double(n as f64));
    }
}

#[test]
fn test_doubles_truncate_like_casts() {
    let mut rng = StdRng::seed_from_u64(13);
    for _ in 0..500 {
        let d: f64 = rng.gen_range(-1.0e6..1.0e6);
        let coerced = ArgCoercer::coerce(&FieldValue::Double(d), &ParamType::Primitive(SqlType::Integer), 0)
            .unwrap()
            .into_owned();
        assert_eq!(coerced, FieldValue::Integer(d as i32));
    }
}

#[test]
fn test_coercion_is_idempotent() {
    let samples = vec![
        FieldValue::TinyInt(-3),
        FieldValue::SmallInt(300),
        FieldValue::Integer(70_000),
        FieldValue::BigInt(1 << 40),
        FieldValue::Real(1.5),
        FieldValue::Double(-2.25),
        FieldValue::String("x".to_string()),
        FieldValue::Boolean(true),
    ];
    for value in samples {
        let target = ParamType::Primitive(value.sql_type().unwrap());
        let coerced = ArgCoercer::coerce(&value, &target, 0).unwrap();
        assert!(matches!(coerced, Cow::Borrowed(_)), "{} was copied", value);
        assert_eq!(*coerced, value);
    }
}

#[test]
fn test_boolean_strings() {
    let target = ParamType::Primitive(SqlType::Boolean);
    for (text, expected) in [("TRUE", true), ("true", true), ("yes", false), ("1", false), ("", false)] {
        let value = FieldValue::String(text.to_string());
        let coerced = ArgCoercer::coerce(&value, &target, 0).unwrap();
        assert_eq!(*coerced, FieldValue::Boolean(expected), "{:?}", text);
    }
}

#[test]
fn test_nested_array_failure_names_outer_argument() {
    let target = ParamType::Array(Box::new(ParamType::Array(Box::new(ParamType::Primitive(
        SqlType::Integer,
    )))));
    let value = FieldValue::Array(vec![
        FieldValue::Array(vec![FieldValue::String("1".to_string())]),
        FieldValue::Array(vec![FieldValue::String("two".to_string())]),
    ]);

    let err = ArgCoercer::coerce(&value, &target, 2).unwrap_err();
    assert_eq!(err.index(), 2);
    match err {
        CoercionError::ArrayElement { cause, .. } => match *cause {
            CoercionError::ArrayElement { index, cause, .. } => {
                assert_eq!(index, 1);
                assert!(matches!(*cause, CoercionError::StringParse { index: 0, .. }));
            }
            other => panic!("unexpected inner error {:?}", other),
        },
        other => panic!("unexpected error {:?}", other),
    }
}
