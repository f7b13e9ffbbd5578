//! Aggregate function factories and lookup.
//!
//! A [`UdafFactory`] produces the concrete aggregate for a declared element
//! type; [`UdafRegistry`] maps function names to factories.

use super::adapter::{KsqlAggregateFunction, UdafAdapter};
use super::udaf::{Avg, AvgAccumulator, Count, Max, Min, NumericValue, Sum};
use crate::velostream::sql::error::AggregateError;
use crate::velostream::sql::execution::types::{FieldValue, SqlType};
use std::collections::HashMap;
use std::sync::Arc;

/// Produces an aggregate instance for an element type
pub trait UdafFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(
        &self,
        argument_type: &SqlType,
    ) -> Result<Arc<dyn KsqlAggregateFunction>, AggregateError>;
}

fn unsupported(function: &str, sql_type: &SqlType) -> AggregateError {
    AggregateError::UnsupportedType {
        function: function.to_string(),
        sql_type: sql_type.clone(),
    }
}

/// Call `$make::<T>()` with `T` matching a numeric SQL type
macro_rules! dispatch_numeric {
    ($sql_type:expr, $name:expr, $make:ident) => {
        match $sql_type {
            SqlType::TinyInt => Ok($make::<i8>($name, $sql_type)),
            SqlType::SmallInt => Ok($make::<i16>($name, $sql_type)),
            SqlType::Integer => Ok($make::<i32>($name, $sql_type)),
            SqlType::BigInt => Ok($make::<i64>($name, $sql_type)),
            SqlType::Real => Ok($make::<f32>($name, $sql_type)),
            SqlType::Double => Ok($make::<f64>($name, $sql_type)),
            other => Err(unsupported($name, other)),
        }
    };
}

fn sum_of<T: NumericValue>(name: &str, sql_type: &SqlType) -> Arc<dyn KsqlAggregateFunction> {
    Arc::new(UdafAdapter::<Sum<T>, T, T, T>::new(
        name,
        sql_type.clone(),
        sql_type.clone(),
        Sum::new(),
    ))
}

fn avg_of<T: NumericValue>(name: &str, sql_type: &SqlType) -> Arc<dyn KsqlAggregateFunction> {
    Arc::new(
        UdafAdapter::<Avg<T>, T, AvgAccumulator, Option<f64>>::new(
            name,
            sql_type.clone(),
            SqlType::Double,
            Avg::new(),
        ),
    )
}

fn min_of<T: NumericValue>(name: &str, sql_type: &SqlType) -> Arc<dyn KsqlAggregateFunction> {
    Arc::new(UdafAdapter::<Min<T>, T, Option<T>, Option<T>>::new(
        name,
        sql_type.clone(),
        sql_type.clone(),
        Min::new(),
    ))
}

fn max_of<T: NumericValue>(name: &str, sql_type: &SqlType) -> Arc<dyn KsqlAggregateFunction> {
    Arc::new(UdafAdapter::<Max<T>, T, Option<T>, Option<T>>::new(
        name,
        sql_type.clone(),
        sql_type.clone(),
        Max::new(),
    ))
}

/// SUM for TINYINT, SMALLINT, INTEGER, BIGINT, REAL and DOUBLE
#[derive(Debug, Default)]
pub struct SumFactory;

impl UdafFactory for SumFactory {
    fn name(&self) -> &str {
        "SUM"
    }

    fn create(
        &self,
        argument_type: &SqlType,
    ) -> Result<Arc<dyn KsqlAggregateFunction>, AggregateError> {
        dispatch_numeric!(argument_type, self.name(), sum_of)
    }
}

/// AVG for the numeric types, always DOUBLE
#[derive(Debug, Default)]
pub struct AvgFactory;

impl UdafFactory for AvgFactory {
    fn name(&self) -> &str {
        "AVG"
    }

    fn create(
        &self,
        argument_type: &SqlType,
    ) -> Result<Arc<dyn KsqlAggregateFunction>, AggregateError> {
        dispatch_numeric!(argument_type, self.name(), avg_of)
    }
}

/// MIN for the numeric types and STRING
#[derive(Debug, Default)]
pub struct MinFactory;

impl UdafFactory for MinFactory {
    fn name(&self) -> &str {
        "MIN"
    }

    fn create(
        &self,
        argument_type: &SqlType,
    ) -> Result<Arc<dyn KsqlAggregateFunction>, AggregateError> {
        if *argument_type == SqlType::String {
            return Ok(Arc::new(UdafAdapter::<
                Min<String>,
                String,
                Option<String>,
                Option<String>,
            >::new(
                self.name(),
                SqlType::String,
                SqlType::String,
                Min::new(),
            )));
        }
        dispatch_numeric!(argument_type, self.name(), min_of)
    }
}

/// MAX for the numeric types and STRING
#[derive(Debug, Default)]
pub struct MaxFactory;

impl UdafFactory for MaxFactory {
    fn name(&self) -> &str {
        "MAX"
    }

    fn create(
        &self,
        argument_type: &SqlType,
    ) -> Result<Arc<dyn KsqlAggregateFunction>, AggregateError> {
        if *argument_type == SqlType::String {
            return Ok(Arc::new(UdafAdapter::<
                Max<String>,
                String,
                Option<String>,
                Option<String>,
            >::new(
                self.name(),
                SqlType::String,
                SqlType::String,
                Max::new(),
            )));
        }
        dispatch_numeric!(argument_type, self.name(), max_of)
    }
}

/// COUNT of non-null values of any type
#[derive(Debug, Default)]
pub struct CountFactory;

impl UdafFactory for CountFactory {
    fn name(&self) -> &str {
        "COUNT"
    }

    fn create(
        &self,
        argument_type: &SqlType,
    ) -> Result<Arc<dyn KsqlAggregateFunction>, AggregateError> {
        Ok(Arc::new(
            UdafAdapter::<Count, FieldValue, i64, i64>::new(
                self.name(),
                argument_type.clone(),
                SqlType::BigInt,
                Count,
            ),
        ))
    }
}

/// Aggregate function lookup by name
#[derive(Clone, Default)]
pub struct UdafRegistry {
    factories: HashMap<String, Arc<dyn UdafFactory>>,
}

impl UdafRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with SUM, COUNT, MIN, MAX and AVG
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SumFactory));
        registry.register(Arc::new(CountFactory));
        registry.register(Arc::new(MinFactory));
        registry.register(Arc::new(MaxFactory));
        registry.register(Arc::new(AvgFactory));
        registry
    }

    pub fn register(&mut self, factory: Arc<dyn UdafFactory>) {
        self.factories
            .insert(factory.name().to_uppercase(), factory);
    }

    pub fn is_aggregate_function(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_uppercase())
    }

    /// Resolve `name` for arguments of `argument_type`
    pub fn resolve(
        &self,
        name: &str,
        argument_type: &SqlType,
    ) -> Result<Arc<dyn KsqlAggregateFunction>, AggregateError> {
        let factory = self.factories.get(&name.to_uppercase()).ok_or_else(|| {
            AggregateError::UnknownFunction {
                name: name.to_string(),
            }
        })?;
        factory.create(argument_type)
    }
}

impl std::fmt::Debug for UdafRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("UdafRegistry")
            .field("functions", &names)
            .finish()
    }
}
