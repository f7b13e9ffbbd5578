//! Function argument coercion.
//!
//! Values reaching a function call are only loosely typed: JSON sources deliver
//! numbers of whatever width the decoder picked, delimited sources deliver
//! strings, and columns may be NULL. [`ArgCoercer`] converts such a value into
//! the exact [`ParamType`] a function declares for that argument position.
//!
//! Coercion runs once per argument per record, so values that already have the
//! requested type are returned borrowed.

use crate::velostream::sql::error::CoercionError;
use crate::velostream::sql::execution::types::{FieldValue, SqlType};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Declared type of a function parameter
///
/// `Primitive` parameters cannot receive NULL; `Nullable` parameters can.
/// Arrays are always nullable, their elements follow the element type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Primitive(SqlType),
    Nullable(SqlType),
    Array(Box<ParamType>),
}

impl ParamType {
    /// Nullable parameter type accepting values of a column of `sql_type`
    pub fn for_column(sql_type: &SqlType) -> Self {
        match sql_type {
            SqlType::Array(element) => ParamType::Array(Box::new(ParamType::for_column(element))),
            other => ParamType::Nullable(other.clone()),
        }
    }

    pub fn array_of(element: ParamType) -> Self {
        ParamType::Array(Box::new(element))
    }

    /// The SQL type values of this parameter have after coercion
    pub fn sql_type(&self) -> SqlType {
        match self {
            ParamType::Primitive(t) | ParamType::Nullable(t) => t.clone(),
            ParamType::Array(element) => SqlType::array(element.sql_type()),
        }
    }

    fn is_primitive(&self) -> bool {
        matches!(self, ParamType::Primitive(_))
    }

    /// Element type when this parameter is an array, however it was declared
    fn array_element(&self) -> Option<Cow<'_, ParamType>> {
        match self {
            ParamType::Array(element) => Some(Cow::Borrowed(element.as_ref())),
            ParamType::Primitive(SqlType::Array(element))
            | ParamType::Nullable(SqlType::Array(element)) => {
                Some(Cow::Owned(ParamType::for_column(element)))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Primitive(t) => write!(f, "{} NOT NULL", t),
            ParamType::Nullable(t) => write!(f, "{}", t),
            ParamType::Array(element) => write!(f, "ARRAY<{}>", element),
        }
    }
}

/// Stateless argument coercer
pub struct ArgCoercer;

impl ArgCoercer {
    /// Coerce the argument at `index` of `args`
    pub fn coerce_arg<'a>(
        args: &'a [FieldValue],
        target: &ParamType,
        index: usize,
    ) -> Result<Cow<'a, FieldValue>, CoercionError> {
        match args.get(index) {
            Some(arg) => Self::coerce(arg, target, index),
            None => Self::coerce_null(target, index).map(Cow::Owned),
        }
    }

    /// Coerce `value` to `target`; `index` is the argument position used in errors
    pub fn coerce<'a>(
        value: &'a FieldValue,
        target: &ParamType,
        index: usize,
    ) -> Result<Cow<'a, FieldValue>, CoercionError> {
        if value.is_null() {
            return Self::coerce_null(target, index).map(Cow::Owned);
        }

        if let Some(element) = target.array_element() {
            return Self::coerce_array(value, target, &element, index);
        }

        let target_type = target.sql_type();
        if Self::matches_kind(value, &target_type) {
            return Ok(Cow::Borrowed(value));
        }

        match value {
            FieldValue::String(s) => Self::from_string(s, &target_type, index).map(Cow::Owned),
            v if v.is_numeric() => Self::from_number(v, target, index).map(Cow::Owned),
            other => Err(CoercionError::Incompatible {
                index,
                actual: other.type_name(),
                target: target.clone(),
            }),
        }
    }

    fn coerce_null(target: &ParamType, index: usize) -> Result<FieldValue, CoercionError> {
        if target.is_primitive() {
            return Err(CoercionError::NullToPrimitive { index });
        }
        Ok(FieldValue::Null)
    }

    fn matches_kind(value: &FieldValue, target: &SqlType) -> bool {
        matches!(
            (value, target),
            (FieldValue::Boolean(_), SqlType::Boolean)
                | (FieldValue::TinyInt(_), SqlType::TinyInt)
                | (FieldValue::SmallInt(_), SqlType::SmallInt)
                | (FieldValue::Integer(_), SqlType::Integer)
                | (FieldValue::BigInt(_), SqlType::BigInt)
                | (FieldValue::Real(_), SqlType::Real)
                | (FieldValue::Double(_), SqlType::Double)
                | (FieldValue::String(_), SqlType::String)
        )
    }

    /// Element-wise coercion; stays borrowed while no element needs converting
    fn coerce_array<'a>(
        value: &'a FieldValue,
        target: &ParamType,
        element_type: &ParamType,
        index: usize,
    ) -> Result<Cow<'a, FieldValue>, CoercionError> {
        let elements = match value {
            FieldValue::Array(elements) => elements,
            other => {
                return Err(CoercionError::Incompatible {
                    index,
                    actual: other.type_name(),
                    target: target.clone(),
                });
            }
        };

        let wrap = |cause: CoercionError| CoercionError::ArrayElement {
            index,
            target: target.clone(),
            cause: Box::new(cause),
        };

        let mut converted: Option<Vec<FieldValue>> = None;
        for (i, element) in elements.iter().enumerate() {
            let coerced = Self::coerce(element, element_type, i).map_err(wrap)?;
            match (coerced, converted.as_mut()) {
                (Cow::Borrowed(_), None) => {}
                (Cow::Borrowed(v), Some(out)) => out.push(v.clone()),
                (Cow::Owned(v), None) => {
                    let mut out = Vec::with_capacity(elements.len());
                    out.extend(elements[..i].iter().cloned());
                    out.push(v);
                    converted = Some(out);
                }
                (Cow::Owned(v), Some(out)) => out.push(v),
            }
        }

        Ok(match converted {
            Some(out) => Cow::Owned(FieldValue::Array(out)),
            None => Cow::Borrowed(value),
        })
    }

    fn from_string(s: &str, target: &SqlType, index: usize) -> Result<FieldValue, CoercionError> {
        let parse_error = || CoercionError::StringParse {
            index,
            value: s.to_string(),
            target: target.clone(),
        };

        match target {
            SqlType::TinyInt => s.parse().map(FieldValue::TinyInt).map_err(|_| parse_error()),
            SqlType::SmallInt => s.parse().map(FieldValue::SmallInt).map_err(|_| parse_error()),
            SqlType::Integer => s.parse().map(FieldValue::Integer).map_err(|_| parse_error()),
            SqlType::BigInt => s.parse().map(FieldValue::BigInt).map_err(|_| parse_error()),
            SqlType::Real => s
                .trim()
                .parse()
                .map(FieldValue::Real)
                .map_err(|_| parse_error()),
            SqlType::Double => s
                .trim()
                .parse()
                .map(FieldValue::Double)
                .map_err(|_| parse_error()),
            // Anything but a case-insensitive "true" is false
            SqlType::Boolean => Ok(FieldValue::Boolean(s.eq_ignore_ascii_case("true"))),
            SqlType::String | SqlType::Array(_) => Err(parse_error()),
        }
    }

    /// Numeric conversion with the target's truncating semantics.
    ///
    /// Floating point to integral saturates at the 32-bit range before narrowing
    /// further, NaN becomes 0. Integral narrowing keeps the low-order bits.
    fn from_number(
        value: &FieldValue,
        target: &ParamType,
        index: usize,
    ) -> Result<FieldValue, CoercionError> {
        let target_type = target.sql_type();
        let unsupported = || CoercionError::UnsupportedNumericTarget {
            index,
            actual: value.sql_type().unwrap_or(SqlType::Double),
            target: target.clone(),
        };

        let converted = match (value, &target_type) {
            (FieldValue::Real(_) | FieldValue::Double(_), _) => {
                let v = value.as_f64().ok_or_else(unsupported)?;
                match target_type {
                    SqlType::TinyInt => FieldValue::TinyInt((v as i32) as i8),
                    SqlType::SmallInt => FieldValue::SmallInt((v as i32) as i16),
                    SqlType::Integer => FieldValue::Integer(v as i32),
                    SqlType::BigInt => FieldValue::BigInt(v as i64),
                    SqlType::Real => FieldValue::Real(v as f32),
                    SqlType::Double => FieldValue::Double(v),
                    _ => return Err(unsupported()),
                }
            }
            _ => {
                let v = value.as_i64().ok_or_else(unsupported)?;
                match target_type {
                    SqlType::TinyInt => FieldValue::TinyInt(v as i8),
                    SqlType::SmallInt => FieldValue::SmallInt(v as i16),
                    SqlType::Integer => FieldValue::Integer(v as i32),
                    SqlType::BigInt => FieldValue::BigInt(v),
                    SqlType::Real => FieldValue::Real(v as f32),
                    SqlType::Double => FieldValue::Double(v as f64),
                    _ => return Err(unsupported()),
                }
            }
        };
        Ok(converted)
    }
}
