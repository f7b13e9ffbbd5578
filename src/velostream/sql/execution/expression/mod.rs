//! Expression compilation module for streaming SQL execution.
//!
//! This module turns expression trees into per-record evaluators:
//! - Argument coercion to declared parameter types ([`ArgCoercer`])
//! - Parameter-slot layout and per-row resolution ([`CodeGenSpec`])
//! - Compilation of column references, literals, operators and function calls
//! - Scalar function registration and invocation
//!
//! Evaluation follows SQL NULL semantics: arithmetic and comparison with a
//! NULL operand yield NULL, AND/OR are three-valued.

pub mod codegen;
pub mod coercion;
pub mod compiler;
pub mod functions;

// Re-export the main API
pub use codegen::{
    ArgumentSpec, CodeGenSpec, CodeGenSpecBuilder, CoercingTypeEnforcer, ParamValue,
    RowTypeEnforcer, Slot,
};
pub use coercion::{ArgCoercer, ParamType};
pub use compiler::{BinaryOperator, CompiledExpression, Expr, ExpressionCompiler};
pub use functions::{
    FunctionCategory, FunctionInvoker, FunctionRegistry, FunctionSignature, ScalarFunction,
};
