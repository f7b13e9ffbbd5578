//! Typed aggregate function contract and the built-in implementations.
//!
//! An aggregate is computed incrementally per key: an accumulator starts at
//! [`Udaf::initialize`], absorbs every input value through [`Udaf::aggregate`]
//! and is turned into the output value by [`Udaf::map`]. Accumulators built
//! over disjoint parts of a stream combine with [`Udaf::merge`]; for exact
//! types folding a sequence in one pass equals merging the folds of any
//! partition of it.

use crate::velostream::sql::execution::types::FieldValue;
use std::marker::PhantomData;

/// Incremental, mergeable aggregate over inputs `I`, accumulators `A` and outputs `O`
pub trait Udaf<I, A, O>: Send + Sync {
    fn initialize(&self) -> A;

    fn aggregate(&self, value: I, aggregate: A) -> A;

    fn merge(&self, a: A, b: A) -> A;

    fn map(&self, aggregate: A) -> O;
}

/// Conversion between native Rust values and [`FieldValue`]
pub trait SqlValue: Sized {
    fn from_field(value: &FieldValue) -> Option<Self>;

    fn into_field(self) -> FieldValue;
}

macro_rules! sql_value {
    ($native:ty, $variant:ident) => {
        impl SqlValue for $native {
            fn from_field(value: &FieldValue) -> Option<Self> {
                match value {
                    FieldValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_field(self) -> FieldValue {
                FieldValue::$variant(self)
            }
        }
    };
}

sql_value!(i8, TinyInt);
sql_value!(i16, SmallInt);
sql_value!(i32, Integer);
sql_value!(i64, BigInt);
sql_value!(f32, Real);
sql_value!(f64, Double);
sql_value!(bool, Boolean);
sql_value!(String, String);

/// Any value, used by aggregates that do not look at their input
impl SqlValue for FieldValue {
    fn from_field(value: &FieldValue) -> Option<Self> {
        Some(value.clone())
    }

    fn into_field(self) -> FieldValue {
        self
    }
}

/// NULL maps to `None`
impl<T: SqlValue> SqlValue for Option<T> {
    fn from_field(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Null => Some(None),
            other => T::from_field(other).map(Some),
        }
    }

    fn into_field(self) -> FieldValue {
        self.map(T::into_field).unwrap_or(FieldValue::Null)
    }
}

/// Numeric element types with an additive identity
///
/// Integral addition wraps on overflow.
pub trait NumericValue: SqlValue + Copy + PartialOrd + Send + Sync + 'static {
    fn zero() -> Self;

    fn add(self, other: Self) -> Self;

    fn to_f64(self) -> f64;
}

macro_rules! integral {
    ($native:ty) => {
        impl NumericValue for $native {
            fn zero() -> Self {
                0
            }

            fn add(self, other: Self) -> Self {
                self.wrapping_add(other)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

integral!(i8);
integral!(i16);
integral!(i32);
integral!(i64);

impl NumericValue for f32 {
    fn zero() -> Self {
        0.0
    }

    fn add(self, other: Self) -> Self {
        self + other
    }

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl NumericValue for f64 {
    fn zero() -> Self {
        0.0
    }

    fn add(self, other: Self) -> Self {
        self + other
    }

    fn to_f64(self) -> f64 {
        self
    }
}

/// SUM over one numeric element type
pub struct Sum<T>(PhantomData<fn() -> T>);

impl<T> Sum<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Sum<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NumericValue> Udaf<T, T, T> for Sum<T> {
    fn initialize(&self) -> T {
        T::zero()
    }

    fn aggregate(&self, value: T, aggregate: T) -> T {
        aggregate.add(value)
    }

    fn merge(&self, a: T, b: T) -> T {
        a.add(b)
    }

    fn map(&self, aggregate: T) -> T {
        aggregate
    }
}

/// COUNT of non-null values
#[derive(Debug, Default)]
pub struct Count;

impl<I> Udaf<I, i64, i64> for Count {
    fn initialize(&self) -> i64 {
        0
    }

    fn aggregate(&self, _value: I, aggregate: i64) -> i64 {
        aggregate + 1
    }

    fn merge(&self, a: i64, b: i64) -> i64 {
        a + b
    }

    fn map(&self, aggregate: i64) -> i64 {
        aggregate
    }
}

/// MIN over an ordered element type; `None` until the first value
pub struct Min<T>(PhantomData<fn() -> T>);

impl<T> Min<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Min<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialOrd> Udaf<T, Option<T>, Option<T>> for Min<T> {
    fn initialize(&self) -> Option<T> {
        None
    }

    fn aggregate(&self, value: T, aggregate: Option<T>) -> Option<T> {
        self.merge(Some(value), aggregate)
    }

    fn merge(&self, a: Option<T>, b: Option<T>) -> Option<T> {
        match (a, b) {
            (Some(a), Some(b)) => Some(if b < a { b } else { a }),
            (a, None) => a,
            (None, b) => b,
        }
    }

    fn map(&self, aggregate: Option<T>) -> Option<T> {
        aggregate
    }
}

/// MAX over an ordered element type; `None` until the first value
pub struct Max<T>(PhantomData<fn() -> T>);

impl<T> Max<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Max<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialOrd> Udaf<T, Option<T>, Option<T>> for Max<T> {
    fn initialize(&self) -> Option<T> {
        None
    }

    fn aggregate(&self, value: T, aggregate: Option<T>) -> Option<T> {
        self.merge(Some(value), aggregate)
    }

    fn merge(&self, a: Option<T>, b: Option<T>) -> Option<T> {
        match (a, b) {
            (Some(a), Some(b)) => Some(if b > a { b } else { a }),
            (a, None) => a,
            (None, b) => b,
        }
    }

    fn map(&self, aggregate: Option<T>) -> Option<T> {
        aggregate
    }
}

/// Running sum and count behind AVG
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AvgAccumulator {
    pub sum: f64,
    pub count: i64,
}

/// Stored as `[sum, count]`
impl SqlValue for AvgAccumulator {
    fn from_field(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Array(parts) => match parts.as_slice() {
                [FieldValue::Double(sum), FieldValue::BigInt(count)] => Some(Self {
                    sum: *sum,
                    count: *count,
                }),
                _ => None,
            },
            _ => None,
        }
    }

    fn into_field(self) -> FieldValue {
        FieldValue::Array(vec![
            FieldValue::Double(self.sum),
            FieldValue::BigInt(self.count),
        ])
    }
}

/// AVG over one numeric element type; `None` for an empty group
pub struct Avg<T>(PhantomData<fn() -> T>);

impl<T> Avg<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Avg<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NumericValue> Udaf<T, AvgAccumulator, Option<f64>> for Avg<T> {
    fn initialize(&self) -> AvgAccumulator {
        AvgAccumulator::default()
    }

    fn aggregate(&self, value: T, aggregate: AvgAccumulator) -> AvgAccumulator {
        AvgAccumulator {
            sum: aggregate.sum + value.to_f64(),
            count: aggregate.count + 1,
        }
    }

    fn merge(&self, a: AvgAccumulator, b: AvgAccumulator) -> AvgAccumulator {
        AvgAccumulator {
            sum: a.sum + b.sum,
            count: a.count + b.count,
        }
    }

    fn map(&self, aggregate: AvgAccumulator) -> Option<f64> {
        if aggregate.count == 0 {
            None
        } else {
            Some(aggregate.sum / aggregate.count as f64)
        }
    }
}
