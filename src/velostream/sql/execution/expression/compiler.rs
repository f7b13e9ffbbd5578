//! Expression compilation.
//!
//! [`ExpressionCompiler`] turns an [`Expr`] tree into a [`CompiledExpression`]:
//! a [`CodeGenSpec`] holding the parameter-slot layout plus a program whose
//! column reads and function calls address slots instead of names. Column
//! lookup and function resolution happen once, at plan materialization.

use super::codegen::{CodeGenSpec, CodeGenSpecBuilder, ParamValue, RowTypeEnforcer};
use super::functions::FunctionRegistry;
use crate::velostream::sql::error::{SqlError, SqlResult};
use crate::velostream::sql::execution::types::{FieldValue, SqlType};
use crate::velostream::sql::schema::{ColumnRef, LogicalSchema};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Expression tree as produced by the logical planner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    Column(ColumnRef),
    Literal(FieldValue),
    Function { name: String, args: Vec<Expr> },
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    IsNull(Box<Expr>),
}

impl Expr {
    pub fn column(name: &str) -> Self {
        Expr::Column(ColumnRef::new(name))
    }

    pub fn qualified(source: &str, name: &str) -> Self {
        Expr::Column(ColumnRef::qualified(source, name))
    }

    pub fn literal(value: FieldValue) -> Self {
        Expr::Literal(value)
    }

    pub fn function(name: &str, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.to_string(),
            args,
        }
    }

    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(c) => write!(f, "{}", c),
            Expr::Literal(FieldValue::String(s)) => write!(f, "'{}'", s),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::BinaryOp { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Not(inner) => write!(f, "(NOT {})", inner),
            Expr::IsNull(inner) => write!(f, "({} IS NULL)", inner),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

impl BinaryOperator {
    fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
        )
    }

    fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        };
        write!(f, "{}", symbol)
    }
}

/// Slot-addressed evaluation program
#[derive(Debug, Clone, PartialEq)]
enum Program {
    Param(usize),
    Literal(FieldValue),
    Call { slot: usize, args: Vec<Program> },
    Binary {
        op: BinaryOperator,
        left: Box<Program>,
        right: Box<Program>,
    },
    Not(Box<Program>),
    IsNull(Box<Program>),
}

/// An expression ready for per-record evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    spec: CodeGenSpec,
    program: Program,
    return_type: SqlType,
    text: String,
}

impl CompiledExpression {
    pub fn spec(&self) -> &CodeGenSpec {
        &self.spec
    }

    pub fn return_type(&self) -> &SqlType {
        &self.return_type
    }

    /// Source text of the expression, for error reports
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Evaluate against one row
    pub fn evaluate(
        &self,
        row: &[FieldValue],
        enforcer: &dyn RowTypeEnforcer,
    ) -> SqlResult<FieldValue> {
        let mut params = self.spec.new_params();
        self.spec.resolve(row, enforcer, &mut params)?;
        Self::run(&self.program, &params)
    }

    /// Evaluate as a predicate; NULL counts as false
    pub fn evaluate_predicate(
        &self,
        row: &[FieldValue],
        enforcer: &dyn RowTypeEnforcer,
    ) -> SqlResult<bool> {
        match self.evaluate(row, enforcer)? {
            FieldValue::Boolean(b) => Ok(b),
            FieldValue::Null => Ok(false),
            other => Err(SqlError::execution_error(format!(
                "Predicate {} evaluated to non-boolean {}",
                self.text,
                other.type_name()
            ))),
        }
    }

    fn run(program: &Program, params: &[ParamValue]) -> SqlResult<FieldValue> {
        match program {
            Program::Param(slot) => params
                .get(*slot)
                .and_then(ParamValue::as_value)
                .cloned()
                .ok_or_else(|| SqlError::execution_error(format!("slot {} holds no value", slot))),
            Program::Literal(value) => Ok(value.clone()),
            Program::Call { slot, args } => {
                let function = params
                    .get(*slot)
                    .and_then(ParamValue::as_function)
                    .ok_or_else(|| {
                        SqlError::execution_error(format!("slot {} holds no function", slot))
                    })?;
                let values = args
                    .iter()
                    .map(|arg| Self::run(arg, params))
                    .collect::<SqlResult<Vec<_>>>()?;
                function.invoke(&values)
            }
            Program::Binary { op, left, right } => {
                let l = Self::run(left, params)?;
                if op.is_logical() {
                    return logical(*op, &l, || Self::run(right, params));
                }
                let r = Self::run(right, params)?;
                if op.is_arithmetic() {
                    arithmetic(*op, &l, &r)
                } else {
                    compare(*op, &l, &r)
                }
            }
            Program::Not(inner) => match Self::run(inner, params)? {
                FieldValue::Boolean(b) => Ok(FieldValue::Boolean(!b)),
                FieldValue::Null => Ok(FieldValue::Null),
                other => Err(SqlError::function_error(
                    "NOT",
                    format!("expected BOOLEAN, got {}", other.type_name()),
                )),
            },
            Program::IsNull(inner) => Ok(FieldValue::Boolean(Self::run(inner, params)?.is_null())),
        }
    }
}

/// Three-valued AND/OR; the right side is only evaluated when it can change the result
fn logical(
    op: BinaryOperator,
    left: &FieldValue,
    right: impl FnOnce() -> SqlResult<FieldValue>,
) -> SqlResult<FieldValue> {
    let as_bool = |v: &FieldValue| -> SqlResult<Option<bool>> {
        match v {
            FieldValue::Boolean(b) => Ok(Some(*b)),
            FieldValue::Null => Ok(None),
            other => Err(SqlError::function_error(
                op.to_string(),
                format!("expected BOOLEAN, got {}", other.type_name()),
            )),
        }
    };

    let l = as_bool(left)?;
    let short_circuit = match op {
        BinaryOperator::And => Some(false),
        _ => Some(true),
    };
    if l == short_circuit {
        return Ok(FieldValue::Boolean(l == Some(true)));
    }

    let r = as_bool(&right()?)?;
    let result = match (op, l, r) {
        (_, _, r) if r == short_circuit => r,
        (_, None, _) | (_, _, None) => None,
        (BinaryOperator::And, Some(a), Some(b)) => Some(a && b),
        (_, Some(a), Some(b)) => Some(a || b),
    };
    Ok(result.map(FieldValue::Boolean).unwrap_or(FieldValue::Null))
}

fn is_floating(value: &FieldValue) -> bool {
    matches!(value, FieldValue::Real(_) | FieldValue::Double(_))
}

/// Integral arithmetic is carried out on i64 with wrapping; the result is
/// INTEGER when both operands fit in INTEGER, BIGINT otherwise. Division by
/// zero yields NULL.
fn arithmetic(op: BinaryOperator, left: &FieldValue, right: &FieldValue) -> SqlResult<FieldValue> {
    if left.is_null() || right.is_null() {
        return Ok(FieldValue::Null);
    }
    if !left.is_numeric() || !right.is_numeric() {
        return Err(SqlError::function_error(
            op.to_string(),
            format!(
                "cannot apply to {} and {}",
                left.type_name(),
                right.type_name()
            ),
        ));
    }

    if is_floating(left) || is_floating(right) {
        let (a, b) = match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(FieldValue::Null),
        };
        let v = match op {
            BinaryOperator::Add => a + b,
            BinaryOperator::Subtract => a - b,
            BinaryOperator::Multiply => a * b,
            _ if b == 0.0 => return Ok(FieldValue::Null),
            _ => a / b,
        };
        return Ok(FieldValue::Double(v));
    }

    let (a, b) = match (left.as_i64(), right.as_i64()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(FieldValue::Null),
    };
    let v = match op {
        BinaryOperator::Add => a.wrapping_add(b),
        BinaryOperator::Subtract => a.wrapping_sub(b),
        BinaryOperator::Multiply => a.wrapping_mul(b),
        _ if b == 0 => return Ok(FieldValue::Null),
        _ => a.wrapping_div(b),
    };
    let wide = matches!(left, FieldValue::BigInt(_)) || matches!(right, FieldValue::BigInt(_));
    Ok(if wide {
        FieldValue::BigInt(v)
    } else {
        FieldValue::Integer(v as i32)
    })
}

fn compare(op: BinaryOperator, left: &FieldValue, right: &FieldValue) -> SqlResult<FieldValue> {
    if left.is_null() || right.is_null() {
        return Ok(FieldValue::Null);
    }

    let ordering = match (left, right) {
        (FieldValue::String(a), FieldValue::String(b)) => a.cmp(b),
        (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a.cmp(b),
        (l, r) if is_floating(l) || is_floating(r) => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => return incomparable(op, left, right),
        },
        (l, r) => match (l.as_i64(), r.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => return incomparable(op, left, right),
        },
    };

    let result = match op {
        BinaryOperator::Equal => ordering == Ordering::Equal,
        BinaryOperator::NotEqual => ordering != Ordering::Equal,
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    };
    Ok(FieldValue::Boolean(result))
}

fn incomparable(op: BinaryOperator, left: &FieldValue, right: &FieldValue) -> SqlResult<FieldValue> {
    Err(SqlError::function_error(
        op.to_string(),
        format!("cannot compare {} and {}", left.type_name(), right.type_name()),
    ))
}

/// Compiles expressions against one input schema
pub struct ExpressionCompiler<'a> {
    schema: &'a LogicalSchema,
    functions: &'a FunctionRegistry,
}

impl<'a> ExpressionCompiler<'a> {
    pub fn new(schema: &'a LogicalSchema, functions: &'a FunctionRegistry) -> Self {
        Self { schema, functions }
    }

    pub fn compile(&self, expr: &Expr) -> SqlResult<CompiledExpression> {
        let mut builder = CodeGenSpec::builder();
        let (program, return_type) = self.compile_node(expr, &mut builder)?;
        Ok(CompiledExpression {
            spec: builder.build(),
            program,
            return_type,
            text: expr.to_string(),
        })
    }

    fn compile_node(
        &self,
        expr: &Expr,
        builder: &mut CodeGenSpecBuilder,
    ) -> SqlResult<(Program, SqlType)> {
        match expr {
            Expr::Column(column_ref) => {
                let index = self.schema.index_of(column_ref).ok_or_else(|| {
                    SqlError::plan_error(format!(
                        "Unknown column {} in schema {}",
                        column_ref, self.schema
                    ))
                })?;
                let sql_type = self
                    .schema
                    .column(index)
                    .map(|c| c.sql_type.clone())
                    .ok_or_else(|| SqlError::plan_error(format!("No column at {}", index)))?;
                let slot = builder.add_parameter(column_ref, sql_type.clone(), index);
                Ok((Program::Param(slot.index), sql_type))
            }
            Expr::Literal(value) => Ok((
                Program::Literal(value.clone()),
                value.sql_type().unwrap_or(SqlType::String),
            )),
            Expr::Function { name, args } => {
                let invoker = self.functions.resolve(name, args.len())?;
                let return_type = invoker.return_type().clone();
                let slot = builder.add_function(name, Arc::new(invoker));
                let args = args
                    .iter()
                    .map(|arg| self.compile_node(arg, builder).map(|(p, _)| p))
                    .collect::<SqlResult<Vec<_>>>()?;
                Ok((
                    Program::Call {
                        slot: slot.index,
                        args,
                    },
                    return_type,
                ))
            }
            Expr::BinaryOp { left, op, right } => {
                let (left, left_type) = self.compile_node(left, builder)?;
                let (right, right_type) = self.compile_node(right, builder)?;
                let return_type = if op.is_arithmetic() {
                    arithmetic_type(&left_type, &right_type)
                } else {
                    SqlType::Boolean
                };
                Ok((
                    Program::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    return_type,
                ))
            }
            Expr::Not(inner) => {
                let (inner, _) = self.compile_node(inner, builder)?;
                Ok((Program::Not(Box::new(inner)), SqlType::Boolean))
            }
            Expr::IsNull(inner) => {
                let (inner, _) = self.compile_node(inner, builder)?;
                Ok((Program::IsNull(Box::new(inner)), SqlType::Boolean))
            }
        }
    }
}

fn arithmetic_type(left: &SqlType, right: &SqlType) -> SqlType {
    match (left, right) {
        (SqlType::Real | SqlType::Double, _) | (_, SqlType::Real | SqlType::Double) => {
            SqlType::Double
        }
        (SqlType::BigInt, _) | (_, SqlType::BigInt) => SqlType::BigInt,
        _ => SqlType::Integer,
    }
}
