//! Aggregate function contract: folding, merging and resolution

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use velostream::velostream::sql::error::AggregateError;
use velostream::velostream::sql::execution::aggregation::{
    KsqlAggregateFunction, Udaf, UdafAdapter, UdafFactory, UdafRegistry,
};
use velostream::velostream::sql::execution::types::{FieldValue, SqlType};

fn fold(function: &Arc<dyn KsqlAggregateFunction>, values: &[FieldValue]) -> FieldValue {
    values.iter().fold(function.initial(), |acc, v| {
        function.aggregate(v, acc).unwrap()
    })
}

/// PRODUCT over BIGINT, used to exercise custom factories
struct Product;

impl Udaf<i64, i64, i64> for Product {
    fn initialize(&self) -> i64 {
        1
    }

    fn aggregate(&self, value: i64, aggregate: i64) -> i64 {
        aggregate.wrapping_mul(value)
    }

    fn merge(&self, a: i64, b: i64) -> i64 {
        a.wrapping_mul(b)
    }

    fn map(&self, aggregate: i64) -> i64 {
        aggregate
    }
}

struct ProductFactory;

impl UdafFactory for ProductFactory {
    fn name(&self) -> &str {
        "PRODUCT"
    }

    fn create(
        &self,
        argument_type: &SqlType,
    ) -> Result<Arc<dyn KsqlAggregateFunction>, AggregateError> {
        match argument_type {
            SqlType::BigInt => Ok(Arc::new(UdafAdapter::<Product, i64, i64, i64>::new(
                "PRODUCT",
                SqlType::BigInt,
                SqlType::BigInt,
                Product,
            ))),
            other => Err(AggregateError::UnsupportedType {
                function: "PRODUCT".to_string(),
                sql_type: other.clone(),
            }),
        }
    }
}

/// A random value of `sql_type`, drawn from the top of its range so sums overflow
fn large_value(rng: &mut StdRng, sql_type: &SqlType) -> FieldValue {
    if rng.gen_bool(0.1) {
        return FieldValue::Null;
    }
    match sql_type {
        SqlType::TinyInt => FieldValue::TinyInt(rng.gen_range(i8::MAX / 2..=i8::MAX)),
        SqlType::SmallInt => FieldValue::SmallInt(rng.gen_range(i16::MIN..=i16::MAX)),
        SqlType::Integer => FieldValue::Integer(rng.gen_range(i32::MAX / 2..=i32::MAX)),
        SqlType::BigInt => FieldValue::BigInt(rng.gen_range(i64::MIN..=i64::MAX)),
        other => panic!("not an exact type: {:?}", other),
    }
}

#[test]
fn test_exact_sums_merge_in_any_grouping_and_order() {
    let registry = UdafRegistry::with_builtins();
    let mut rng = StdRng::seed_from_u64(42);

    for sql_type in [SqlType::TinyInt, SqlType::SmallInt, SqlType::Integer, SqlType::BigInt] {
        let sum = registry.resolve("SUM", &sql_type).unwrap();
        for _ in 0..50 {
            let len = rng.gen_range(0..40);
            let values: Vec<FieldValue> =
                (0..len).map(|_| large_value(&mut rng, &sql_type)).collect();
            let first = rng.gen_range(0..=values.len());
            let second = rng.gen_range(first..=values.len());

            let a = fold(&sum, &values[..first]);
            let b = fold(&sum, &values[first..second]);
            let c = fold(&sum, &values[second..]);

            assert_eq!(
                sum.merge(a.clone(), b.clone()).unwrap(),
                sum.merge(b.clone(), a.clone()).unwrap(),
                "{:?} merge is not commutative",
                sql_type
            );

            let left = sum
                .merge(sum.merge(a.clone(), b.clone()).unwrap(), c.clone())
                .unwrap();
            let right = sum.merge(a, sum.merge(b, c).unwrap()).unwrap();

            let whole = sum.result(fold(&sum, &values)).unwrap();
            assert_eq!(sum.result(left).unwrap(), whole, "{:?}", sql_type);
            assert_eq!(sum.result(right).unwrap(), whole, "{:?}", sql_type);
        }
    }
}

#[test]
fn test_double_sum_skips_nulls() {
    let registry = UdafRegistry::with_builtins();
    let sum = registry.resolve("sum", &SqlType::Double).unwrap();
    assert_eq!(sum.return_type(), &SqlType::Double);

    let acc = fold(
        &sum,
        &[
            FieldValue::Double(1.0),
            FieldValue::Null,
            FieldValue::Double(2.5),
        ],
    );
    assert_eq!(sum.result(acc).unwrap(), FieldValue::Double(3.5));
}

#[test]
fn test_tinyint_sum_wraps() {
    let registry = UdafRegistry::with_builtins();
    let sum = registry.resolve("SUM", &SqlType::TinyInt).unwrap();
    let acc = fold(&sum, &[FieldValue::TinyInt(100), FieldValue::TinyInt(100)]);
    assert_eq!(sum.result(acc).unwrap(), FieldValue::TinyInt(-56));
}

#[test]
fn test_count_counts_non_null_values() {
    let registry = UdafRegistry::with_builtins();
    let count = registry.resolve("COUNT", &SqlType::String).unwrap();
    assert_eq!(count.return_type(), &SqlType::BigInt);

    let acc = fold(
        &count,
        &[
            FieldValue::String("a".to_string()),
            FieldValue::Null,
            FieldValue::String("b".to_string()),
        ],
    );
    assert_eq!(count.result(acc.clone()).unwrap(), FieldValue::BigInt(2));
    assert_eq!(
        count.result(count.merge(acc.clone(), acc).unwrap()).unwrap(),
        FieldValue::BigInt(4)
    );
}

#[test]
fn test_min_max_over_strings_and_empty_groups() {
    let registry = UdafRegistry::with_builtins();
    let min = registry.resolve("MIN", &SqlType::String).unwrap();
    let max = registry.resolve("MAX", &SqlType::String).unwrap();
    let values = [
        FieldValue::String("pear".to_string()),
        FieldValue::String("apple".to_string()),
        FieldValue::Null,
        FieldValue::String("quince".to_string()),
    ];

    assert_eq!(
        min.result(fold(&min, &values)).unwrap(),
        FieldValue::String("apple".to_string())
    );
    assert_eq!(
        max.result(fold(&max, &values)).unwrap(),
        FieldValue::String("quince".to_string())
    );
    assert_eq!(min.result(min.initial()).unwrap(), FieldValue::Null);
}

#[test]
fn test_avg_merges_partial_groups() {
    let registry = UdafRegistry::with_builtins();
    let avg = registry.resolve("AVG", &SqlType::Integer).unwrap();
    assert_eq!(avg.return_type(), &SqlType::Double);

    let a = fold(&avg, &[FieldValue::Integer(1), FieldValue::Integer(2)]);
    let b = fold(&avg, &[FieldValue::Integer(6)]);
    let merged = avg.merge(a, b).unwrap();
    assert_eq!(avg.result(merged).unwrap(), FieldValue::Double(3.0));
    assert_eq!(avg.result(avg.initial()).unwrap(), FieldValue::Null);
}

#[test]
fn test_resolution_errors() {
    let registry = UdafRegistry::with_builtins();

    assert_eq!(
        registry.resolve("MEDIAN", &SqlType::BigInt).unwrap_err(),
        AggregateError::UnknownFunction {
            name: "MEDIAN".to_string()
        }
    );
    assert_eq!(
        registry.resolve("SUM", &SqlType::String).unwrap_err(),
        AggregateError::UnsupportedType {
            function: "SUM".to_string(),
            sql_type: SqlType::String,
        }
    );
}

#[test]
fn test_value_of_wrong_type_is_rejected() {
    let registry = UdafRegistry::with_builtins();
    let sum = registry.resolve("SUM", &SqlType::Integer).unwrap();
    let err = sum
        .aggregate(&FieldValue::BigInt(1), sum.initial())
        .unwrap_err();
    assert!(matches!(err, AggregateError::UnexpectedType { actual: "BIGINT", .. }));
}

#[test]
fn test_custom_factory() {
    let mut registry = UdafRegistry::with_builtins();
    assert!(!registry.is_aggregate_function("product"));
    registry.register(Arc::new(ProductFactory));
    assert!(registry.is_aggregate_function("product"));

    let product = registry.resolve("Product", &SqlType::BigInt).unwrap();
    let acc = fold(
        &product,
        &[
            FieldValue::BigInt(2),
            FieldValue::Null,
            FieldValue::BigInt(21),
        ],
    );
    assert_eq!(product.result(acc).unwrap(), FieldValue::BigInt(42));
    assert!(registry.resolve("PRODUCT", &SqlType::Double).is_err());
}
