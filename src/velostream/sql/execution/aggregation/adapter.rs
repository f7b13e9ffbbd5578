//! Type-erased aggregate functions.
//!
//! Operators hold aggregates as `Arc<dyn KsqlAggregateFunction>` and keep
//! accumulators as [`FieldValue`]s, so one operator can carry aggregates of
//! different element types side by side. [`UdafAdapter`] bridges a typed
//! [`Udaf`] to that interface.

use super::udaf::{SqlValue, Udaf};
use crate::velostream::sql::error::AggregateError;
use crate::velostream::sql::execution::types::{FieldValue, SqlType};
use std::fmt;
use std::marker::PhantomData;

/// Aggregate function over dynamically typed values
pub trait KsqlAggregateFunction: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn argument_type(&self) -> &SqlType;

    fn return_type(&self) -> &SqlType;

    /// Initial accumulator
    fn initial(&self) -> FieldValue;

    /// Fold one input value into the accumulator; NULL inputs leave it unchanged
    fn aggregate(
        &self,
        value: &FieldValue,
        aggregate: FieldValue,
    ) -> Result<FieldValue, AggregateError>;

    fn merge(&self, a: FieldValue, b: FieldValue) -> Result<FieldValue, AggregateError>;

    /// Output value for an accumulator
    fn result(&self, aggregate: FieldValue) -> Result<FieldValue, AggregateError>;
}

/// Exposes a typed [`Udaf`] as a [`KsqlAggregateFunction`]
pub struct UdafAdapter<U, I, A, O> {
    name: String,
    argument_type: SqlType,
    return_type: SqlType,
    udaf: U,
    _types: PhantomData<fn(I, A) -> O>,
}

impl<U, I, A, O> UdafAdapter<U, I, A, O>
where
    U: Udaf<I, A, O>,
    I: SqlValue,
    A: SqlValue,
    O: SqlValue,
{
    pub fn new(
        name: impl Into<String>,
        argument_type: SqlType,
        return_type: SqlType,
        udaf: U,
    ) -> Self {
        Self {
            name: name.into(),
            argument_type,
            return_type,
            udaf,
            _types: PhantomData,
        }
    }

    fn decode_input(&self, value: &FieldValue) -> Result<I, AggregateError> {
        I::from_field(value).ok_or_else(|| AggregateError::UnexpectedType {
            function: self.name.clone(),
            expected: self.argument_type.clone(),
            actual: value.type_name(),
        })
    }

    fn decode_aggregate(&self, value: &FieldValue) -> Result<A, AggregateError> {
        A::from_field(value).ok_or_else(|| AggregateError::UnexpectedType {
            function: format!("{} (accumulator)", self.name),
            expected: self.return_type.clone(),
            actual: value.type_name(),
        })
    }
}

impl<U, I, A, O> fmt::Debug for UdafAdapter<U, I, A, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdafAdapter")
            .field("name", &self.name)
            .field("argument_type", &self.argument_type)
            .field("return_type", &self.return_type)
            .finish()
    }
}

impl<U, I, A, O> KsqlAggregateFunction for UdafAdapter<U, I, A, O>
where
    U: Udaf<I, A, O>,
    I: SqlValue,
    A: SqlValue,
    O: SqlValue,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn argument_type(&self) -> &SqlType {
        &self.argument_type
    }

    fn return_type(&self) -> &SqlType {
        &self.return_type
    }

    fn initial(&self) -> FieldValue {
        self.udaf.initialize().into_field()
    }

    fn aggregate(
        &self,
        value: &FieldValue,
        aggregate: FieldValue,
    ) -> Result<FieldValue, AggregateError> {
        if value.is_null() {
            return Ok(aggregate);
        }
        let input = self.decode_input(value)?;
        let acc = self.decode_aggregate(&aggregate)?;
        Ok(self.udaf.aggregate(input, acc).into_field())
    }

    fn merge(&self, a: FieldValue, b: FieldValue) -> Result<FieldValue, AggregateError> {
        let a = self.decode_aggregate(&a)?;
        let b = self.decode_aggregate(&b)?;
        Ok(self.udaf.merge(a, b).into_field())
    }

    fn result(&self, aggregate: FieldValue) -> Result<FieldValue, AggregateError> {
        let acc = self.decode_aggregate(&aggregate)?;
        Ok(self.udaf.map(acc).into_field())
    }
}
