//! Core streaming SQL data types.
//!
//! This module contains the fundamental data types used throughout the execution core:
//! - [`SqlType`] - The closed set of column and parameter types
//! - [`FieldValue`] - The runtime value of a single column or argument
//! - [`StreamRecord`] - A keyed, timestamped row flowing through the operators

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// SQL type of a column, parameter or array element.
///
/// Numeric kinds follow the usual SQL widths: `TINYINT` is a signed byte,
/// `REAL` is single precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    String,
    Array(Box<SqlType>),
}

impl SqlType {
    /// Check if this is one of the six numeric kinds
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt
                | SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Real
                | SqlType::Double
        )
    }

    /// Convenience constructor for `ARRAY<element>`
    pub fn array(element: SqlType) -> Self {
        SqlType::Array(Box::new(element))
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Boolean => write!(f, "BOOLEAN"),
            SqlType::TinyInt => write!(f, "TINYINT"),
            SqlType::SmallInt => write!(f, "SMALLINT"),
            SqlType::Integer => write!(f, "INTEGER"),
            SqlType::BigInt => write!(f, "BIGINT"),
            SqlType::Real => write!(f, "REAL"),
            SqlType::Double => write!(f, "DOUBLE"),
            SqlType::String => write!(f, "STRING"),
            SqlType::Array(element) => write!(f, "ARRAY<{}>", element),
        }
    }
}

/// A value in a SQL record column
///
/// Floating point variants compare and hash by bit pattern so that values can
/// be used as grouping and join keys and inside structurally compared plans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValue {
    /// SQL NULL value
    Null,
    /// Boolean value (true/false)
    Boolean(bool),
    /// 8-bit signed integer
    TinyInt(i8),
    /// 16-bit signed integer
    SmallInt(i16),
    /// 32-bit signed integer
    Integer(i32),
    /// 64-bit signed integer
    BigInt(i64),
    /// 32-bit floating point number
    Real(f32),
    /// 64-bit floating point number
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Array of values
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// Runtime type of this value, `None` for NULL.
    ///
    /// Arrays report the type of their first non-null element; an array with no
    /// such element reports `ARRAY<STRING>`.
    pub fn sql_type(&self) -> Option<SqlType> {
        match self {
            FieldValue::Null => None,
            FieldValue::Boolean(_) => Some(SqlType::Boolean),
            FieldValue::TinyInt(_) => Some(SqlType::TinyInt),
            FieldValue::SmallInt(_) => Some(SqlType::SmallInt),
            FieldValue::Integer(_) => Some(SqlType::Integer),
            FieldValue::BigInt(_) => Some(SqlType::BigInt),
            FieldValue::Real(_) => Some(SqlType::Real),
            FieldValue::Double(_) => Some(SqlType::Double),
            FieldValue::String(_) => Some(SqlType::String),
            FieldValue::Array(values) => {
                let element = values
                    .iter()
                    .find_map(|v| v.sql_type())
                    .unwrap_or(SqlType::String);
                Some(SqlType::array(element))
            }
        }
    }

    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "NULL",
            FieldValue::Boolean(_) => "BOOLEAN",
            FieldValue::TinyInt(_) => "TINYINT",
            FieldValue::SmallInt(_) => "SMALLINT",
            FieldValue::Integer(_) => "INTEGER",
            FieldValue::BigInt(_) => "BIGINT",
            FieldValue::Real(_) => "REAL",
            FieldValue::Double(_) => "DOUBLE",
            FieldValue::String(_) => "STRING",
            FieldValue::Array(_) => "ARRAY",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldValue::TinyInt(_)
                | FieldValue::SmallInt(_)
                | FieldValue::Integer(_)
                | FieldValue::BigInt(_)
                | FieldValue::Real(_)
                | FieldValue::Double(_)
        )
    }

    /// Numeric value widened to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::TinyInt(v) => Some(*v as f64),
            FieldValue::SmallInt(v) => Some(*v as f64),
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::BigInt(v) => Some(*v as f64),
            FieldValue::Real(v) => Some(*v as f64),
            FieldValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Integral value widened to i64; floating point values are not converted
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::TinyInt(v) => Some(*v as i64),
            FieldValue::SmallInt(v) => Some(*v as i64),
            FieldValue::Integer(v) => Some(*v as i64),
            FieldValue::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a == b,
            (FieldValue::TinyInt(a), FieldValue::TinyInt(b)) => a == b,
            (FieldValue::SmallInt(a), FieldValue::SmallInt(b)) => a == b,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            (FieldValue::BigInt(a), FieldValue::BigInt(b)) => a == b,
            (FieldValue::Real(a), FieldValue::Real(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Double(a), FieldValue::Double(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::String(a), FieldValue::String(b)) => a == b,
            (FieldValue::Array(a), FieldValue::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

/// Hash implementation consistent with the bitwise float equality above
impl Hash for FieldValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);

        match self {
            FieldValue::Null => {}
            FieldValue::Boolean(b) => b.hash(state),
            FieldValue::TinyInt(v) => v.hash(state),
            FieldValue::SmallInt(v) => v.hash(state),
            FieldValue::Integer(v) => v.hash(state),
            FieldValue::BigInt(v) => v.hash(state),
            FieldValue::Real(v) => v.to_bits().hash(state),
            FieldValue::Double(v) => v.to_bits().hash(state),
            FieldValue::String(s) => s.hash(state),
            FieldValue::Array(values) => {
                values.len().hash(state);
                for v in values {
                    v.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::TinyInt(v) => write!(f, "{}", v),
            FieldValue::SmallInt(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::BigInt(v) => write!(f, "{}", v),
            FieldValue::Real(v) => write!(f, "{}", v),
            FieldValue::Double(v) => write!(f, "{}", v),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A record in a stream
///
/// Columns are addressed by index, in the order of the producing step's
/// [`LogicalSchema`](crate::velostream::sql::schema::LogicalSchema).
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    /// Record key; joins and aggregations are partitioned by it
    pub key: FieldValue,
    /// Column values
    pub columns: Vec<FieldValue>,
    /// Event time (milliseconds since epoch)
    pub timestamp: i64,
    /// Partition number this record came from
    pub partition: i32,
    /// Offset of this record within its partition
    pub offset: i64,
}

impl StreamRecord {
    /// Create a new record with the given key and columns
    ///
    /// Metadata fields default to timestamp=0, partition=0, offset=0.
    pub fn new(key: FieldValue, columns: Vec<FieldValue>) -> Self {
        Self {
            key,
            columns,
            timestamp: 0,
            partition: 0,
            offset: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Get a column value by index
    pub fn column(&self, index: usize) -> Option<&FieldValue> {
        self.columns.get(index)
    }
}

/// A record tagged with the topic it was read from, as delivered to a query
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub topic: String,
    pub record: StreamRecord,
}

impl SourceRecord {
    pub fn new(topic: impl Into<String>, record: StreamRecord) -> Self {
        Self {
            topic: topic.into(),
            record,
        }
    }
}
