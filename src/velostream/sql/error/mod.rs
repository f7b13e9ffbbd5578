/*!
# SQL Error Handling

Error types for the streaming SQL execution core.

## Error Categories

- **Coercion Errors** ([`CoercionError`]): a function argument or column value could not
  be converted to the type required. Raised per record; usually a data-quality problem.
- **Spec Errors** ([`SpecError`]): an expression's parameter-slot layout was used in a
  way its builder never produced. Always a programming error.
- **Join Window Errors** ([`JoinWindowError`]): invalid window configuration, detected
  when the plan is materialized.
- **Aggregate Errors** ([`AggregateError`]): aggregate resolution failures and type
  contract violations.
- **Plan / Statement / Execution Errors**: carried by [`SqlError`] directly.

Every error converts into [`SqlError`], whose [`SqlError::kind`] tells the query runtime
whether the offending record may be skipped or the query must stop.
*/

use crate::velostream::config::ConfigError;
use crate::velostream::sql::execution::expression::ParamType;
use crate::velostream::sql::execution::types::SqlType;
use thiserror::Error;

/// Convenience alias for fallible operations of the execution core
pub type SqlResult<T> = Result<T, SqlError>;

/// How the query runtime should treat a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input record is malformed for the declared schema; the record may be
    /// skipped or dead-lettered depending on the processing error policy
    DataQuality,
    /// Deployment or programming error; the query cannot continue
    Fatal,
}

/// Failure to convert a value into the type a function or column requires
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    #[error("Can't coerce argument at index {index} from null to a primitive type")]
    NullToPrimitive { index: usize },

    #[error("Couldn't coerce array argument \"args[{index}]\" to type {target}: {cause}")]
    ArrayElement {
        index: usize,
        target: ParamType,
        #[source]
        cause: Box<CoercionError>,
    },

    #[error("Couldn't coerce string argument '{value}' at \"args[{index}]\" to type {target}")]
    StringParse {
        index: usize,
        value: String,
        target: SqlType,
    },

    #[error("Couldn't coerce numeric argument \"args[{index}]\" ({actual}) to type {target}")]
    UnsupportedNumericTarget {
        index: usize,
        actual: SqlType,
        target: ParamType,
    },

    #[error("Impossible to coerce argument at index {index} from {actual} into {target}")]
    Incompatible {
        index: usize,
        actual: &'static str,
        target: ParamType,
    },
}

impl CoercionError {
    /// Argument index the error refers to
    pub fn index(&self) -> usize {
        match self {
            CoercionError::NullToPrimitive { index }
            | CoercionError::ArrayElement { index, .. }
            | CoercionError::StringParse { index, .. }
            | CoercionError::UnsupportedNumericTarget { index, .. }
            | CoercionError::Incompatible { index, .. } => *index,
        }
    }
}

/// Invariant violations of a compiled parameter-slot layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("Expected parameter at index {slot} to be a function, but was {name}")]
    UnboundFunctionSlot { slot: usize, name: String },

    #[error("Cannot get name for {function} {index} times, only {calls} calls registered")]
    CallIndexOutOfRange {
        function: String,
        index: usize,
        calls: usize,
    },

    #[error("Parameter {slot} reads column {column_index} but the row has {row_width} columns")]
    ColumnIndexOutOfRange {
        slot: usize,
        column_index: usize,
        row_width: usize,
    },

    #[error("Parameter array has {actual} slots, expected {expected}")]
    ParameterCountMismatch { expected: usize, actual: usize },
}

/// Invalid stream-stream join window configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinWindowError {
    #[error("Join window bound '{bound}' must not be negative, got {value_ms}ms")]
    NegativeBound { bound: &'static str, value_ms: i64 },

    #[error("Join grace period must not be negative, got {grace_ms}ms")]
    NegativeGrace { grace_ms: i64 },

    #[error(
        "Join grace period ({grace_ms}ms) is shorter than the maximum allowed lateness ({max_lateness_ms}ms)"
    )]
    GraceShorterThanLateness { grace_ms: i64, max_lateness_ms: i64 },

    #[error("Join window duration '{what}' does not fit in i64 milliseconds")]
    DurationOverflow { what: &'static str },
}

/// Aggregate function resolution and contract errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("Unknown aggregate function '{name}'")]
    UnknownFunction { name: String },

    #[error("Aggregate function {function} does not support argument type {sql_type}")]
    UnsupportedType { function: String, sql_type: SqlType },

    #[error("Aggregate function {function} expects {expected} values, got {actual}")]
    UnexpectedType {
        function: String,
        expected: SqlType,
        actual: &'static str,
    },

    #[error("Aggregate function {function} expects {expected} arguments, got {actual}")]
    ArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },
}

/// Crate wide error type
#[derive(Debug, Clone, Error)]
pub enum SqlError {
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    JoinWindow(#[from] JoinWindowError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A scalar function failed while evaluating its (already coerced) arguments
    #[error("Function {function} failed: {message}")]
    Function { function: String, message: String },

    /// The plan cannot be materialized (unknown column, unknown function, ...)
    #[error("Plan error: {message}")]
    Plan { message: String },

    /// A statement failed; carries the statement text for user-facing reports
    #[error("{message}: {statement_text}")]
    Statement {
        message: String,
        statement_text: String,
    },

    /// Runtime errors during query execution
    #[error("Query execution error: {message}")]
    Execution { message: String },
}

impl SqlError {
    pub fn plan_error(message: impl Into<String>) -> Self {
        SqlError::Plan {
            message: message.into(),
        }
    }

    pub fn statement_error(message: impl Into<String>, statement_text: impl Into<String>) -> Self {
        SqlError::Statement {
            message: message.into(),
            statement_text: statement_text.into(),
        }
    }

    pub fn execution_error(message: impl Into<String>) -> Self {
        SqlError::Execution {
            message: message.into(),
        }
    }

    pub fn function_error(function: impl Into<String>, message: impl Into<String>) -> Self {
        SqlError::Function {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Classify the error for the processing error policy
    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlError::Coercion(_) | SqlError::Function { .. } => ErrorKind::DataQuality,
            SqlError::Aggregate(AggregateError::UnexpectedType { .. }) => ErrorKind::DataQuality,
            _ => ErrorKind::Fatal,
        }
    }

    pub fn is_coercion(&self) -> bool {
        matches!(self, SqlError::Coercion(_))
    }
}
