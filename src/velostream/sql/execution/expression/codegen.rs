//! Parameter-slot layout of a compiled expression.
//!
//! Compiling an expression allocates one slot per distinct column it reads and
//! one slot per function call site. The layout is built once per query with
//! [`CodeGenSpecBuilder`]; per record, [`CodeGenSpec::resolve`] fills a flat
//! parameter array from the row without walking the expression tree.
//!
//! Column slots are named `var{slot}`. Function slots are named
//! `{function}_{slot}` in lowercase, so repeated calls of one function within
//! an expression stay individually addressable by call order.

use super::coercion::{ArgCoercer, ParamType};
use super::functions::FunctionInvoker;
use crate::velostream::sql::error::{CoercionError, SpecError, SqlResult};
use crate::velostream::sql::execution::types::{FieldValue, SqlType};
use crate::velostream::sql::schema::ColumnRef;
use std::collections::HashMap;
use std::sync::Arc;

/// One allocated parameter slot
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentSpec {
    Column {
        name: String,
        column_ref: ColumnRef,
        sql_type: SqlType,
        column_index: usize,
    },
    Function {
        name: String,
        function_name: String,
        instance: Option<Arc<FunctionInvoker>>,
    },
}

impl ArgumentSpec {
    pub fn name(&self) -> &str {
        match self {
            ArgumentSpec::Column { name, .. } | ArgumentSpec::Function { name, .. } => name,
        }
    }
}

/// Resolved value of one slot
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParamValue {
    #[default]
    Unset,
    Value(FieldValue),
    Function(Arc<FunctionInvoker>),
}

impl ParamValue {
    pub fn as_value(&self) -> Option<&FieldValue> {
        match self {
            ParamValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<FunctionInvoker>> {
        match self {
            ParamValue::Function(f) => Some(f),
            _ => None,
        }
    }
}

/// Enforces a column's declared type on the raw value read from the row
pub trait RowTypeEnforcer {
    fn enforce_column_type(
        &self,
        slot: usize,
        value: &FieldValue,
        sql_type: &SqlType,
    ) -> Result<FieldValue, CoercionError>;
}

/// Coerces raw column values to the column's declared, nullable type
#[derive(Debug, Clone, Copy, Default)]
pub struct CoercingTypeEnforcer;

impl RowTypeEnforcer for CoercingTypeEnforcer {
    fn enforce_column_type(
        &self,
        slot: usize,
        value: &FieldValue,
        sql_type: &SqlType,
    ) -> Result<FieldValue, CoercionError> {
        ArgCoercer::coerce(value, &ParamType::for_column(sql_type), slot).map(|v| v.into_owned())
    }
}

/// A slot handed out by [`CodeGenSpecBuilder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub index: usize,
    pub name: String,
}

/// Immutable parameter-slot layout of one expression
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CodeGenSpec {
    arguments: Vec<ArgumentSpec>,
    function_names: HashMap<String, Vec<String>>,
}

impl CodeGenSpec {
    pub fn builder() -> CodeGenSpecBuilder {
        CodeGenSpecBuilder::default()
    }

    /// Rebuild a layout from its argument list
    pub fn from_arguments(arguments: Vec<ArgumentSpec>) -> Self {
        let mut function_names: HashMap<String, Vec<String>> = HashMap::new();
        for argument in &arguments {
            if let ArgumentSpec::Function {
                name,
                function_name,
                ..
            } = argument
            {
                function_names
                    .entry(function_name.to_uppercase())
                    .or_default()
                    .push(name.clone());
            }
        }
        Self {
            arguments,
            function_names,
        }
    }

    pub fn arguments(&self) -> &[ArgumentSpec] {
        &self.arguments
    }

    pub fn parameter_count(&self) -> usize {
        self.arguments.len()
    }

    pub fn argument_names(&self) -> Vec<&str> {
        self.arguments.iter().map(ArgumentSpec::name).collect()
    }

    /// Slot name of the `call_index`-th call of `function_name` within the expression
    pub fn unique_name_for_function(
        &self,
        function_name: &str,
        call_index: usize,
    ) -> Result<&str, SpecError> {
        let names = self
            .function_names
            .get(&function_name.to_uppercase())
            .map(Vec::as_slice)
            .unwrap_or_default();
        names
            .get(call_index)
            .map(String::as_str)
            .ok_or_else(|| SpecError::CallIndexOutOfRange {
                function: function_name.to_string(),
                index: call_index,
                calls: names.len(),
            })
    }

    /// Fill `params` for one row.
    ///
    /// On error `params` may be partially filled; callers discard it.
    pub fn resolve(
        &self,
        row: &[FieldValue],
        enforcer: &dyn RowTypeEnforcer,
        params: &mut [ParamValue],
    ) -> SqlResult<()> {
        if params.len() != self.arguments.len() {
            return Err(SpecError::ParameterCountMismatch {
                expected: self.arguments.len(),
                actual: params.len(),
            }
            .into());
        }

        for (slot, (argument, param)) in self.arguments.iter().zip(params.iter_mut()).enumerate() {
            *param = match argument {
                ArgumentSpec::Column {
                    sql_type,
                    column_index,
                    ..
                } => {
                    let raw = row.get(*column_index).ok_or(SpecError::ColumnIndexOutOfRange {
                        slot,
                        column_index: *column_index,
                        row_width: row.len(),
                    })?;
                    ParamValue::Value(enforcer.enforce_column_type(slot, raw, sql_type)?)
                }
                ArgumentSpec::Function { name, instance, .. } => match instance {
                    Some(instance) => ParamValue::Function(Arc::clone(instance)),
                    None => {
                        return Err(SpecError::UnboundFunctionSlot {
                            slot,
                            name: name.clone(),
                        }
                        .into());
                    }
                },
            };
        }
        Ok(())
    }

    /// Fresh parameter array sized for this layout
    pub fn new_params(&self) -> Vec<ParamValue> {
        vec![ParamValue::Unset; self.arguments.len()]
    }
}

/// Local construction context for a [`CodeGenSpec`]
#[derive(Debug, Default)]
pub struct CodeGenSpecBuilder {
    arguments: Vec<ArgumentSpec>,
    column_slots: HashMap<ColumnRef, usize>,
    function_names: HashMap<String, Vec<String>>,
}

impl CodeGenSpecBuilder {
    /// Allocate a slot for a column, or return the slot already allocated for it
    pub fn add_parameter(
        &mut self,
        column_ref: &ColumnRef,
        sql_type: SqlType,
        column_index: usize,
    ) -> Slot {
        if let Some(&index) = self.column_slots.get(column_ref) {
            return Slot {
                index,
                name: self.arguments[index].name().to_string(),
            };
        }

        let index = self.arguments.len();
        let name = format!("var{}", index);
        self.arguments.push(ArgumentSpec::Column {
            name: name.clone(),
            column_ref: column_ref.clone(),
            sql_type,
            column_index,
        });
        self.column_slots.insert(column_ref.clone(), index);
        Slot { index, name }
    }

    /// Allocate a slot for one call of `function_name`
    pub fn add_function(&mut self, function_name: &str, instance: Arc<FunctionInvoker>) -> Slot {
        let index = self.arguments.len();
        let name = format!("{}_{}", function_name.to_lowercase(), index);
        self.arguments.push(ArgumentSpec::Function {
            name: name.clone(),
            function_name: function_name.to_string(),
            instance: Some(instance),
        });
        self.function_names
            .entry(function_name.to_uppercase())
            .or_default()
            .push(name.clone());
        Slot { index, name }
    }

    pub fn build(self) -> CodeGenSpec {
        CodeGenSpec {
            arguments: self.arguments,
            function_names: self.function_names,
        }
    }
}
