//! Scalar functions callable from compiled expressions.
//!
//! A [`ScalarFunction`] declares its parameter types in a [`FunctionSignature`];
//! it never sees raw column values. The [`FunctionInvoker`] bound into a
//! compiled expression coerces every argument with [`ArgCoercer`] first, so a
//! function body can match on exactly the variants its signature names.

use super::coercion::{ArgCoercer, ParamType};
use crate::velostream::sql::error::{SqlError, SqlResult};
use crate::velostream::sql::execution::types::{FieldValue, SqlType};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Categories of scalar functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCategory {
    /// String manipulation (UCASE, CONCAT, LEN)
    String,
    /// Mathematical operations (ABS, ROUND)
    Math,
    /// Array operations (ARRAY_LENGTH)
    Array,
}

/// Declared parameter and return types of a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub params: Vec<ParamType>,
    /// Type of every argument past `params`, for varargs functions
    pub variadic: Option<ParamType>,
    pub return_type: SqlType,
}

impl FunctionSignature {
    pub fn new(params: Vec<ParamType>, return_type: SqlType) -> Self {
        Self {
            params,
            variadic: None,
            return_type,
        }
    }

    pub fn variadic(element: ParamType, return_type: SqlType) -> Self {
        Self {
            params: Vec::new(),
            variadic: Some(element),
            return_type,
        }
    }

    /// Declared type of the argument at `index`
    pub fn param_type(&self, index: usize) -> Option<&ParamType> {
        self.params.get(index).or(self.variadic.as_ref())
    }

    pub fn accepts_arity(&self, arity: usize) -> bool {
        match self.variadic {
            Some(_) => arity >= self.params.len(),
            None => arity == self.params.len(),
        }
    }
}

/// A scalar SQL function
pub trait ScalarFunction: Send + Sync + fmt::Debug {
    /// Function name (uppercase)
    fn name(&self) -> &str;

    fn category(&self) -> FunctionCategory;

    fn signature(&self) -> &FunctionSignature;

    /// Evaluate with arguments already coerced to the declared parameter types
    fn invoke(&self, args: &[FieldValue]) -> SqlResult<FieldValue>;
}

/// Callable instance bound into a compiled expression
#[derive(Debug, Clone)]
pub struct FunctionInvoker {
    function: Arc<dyn ScalarFunction>,
}

impl FunctionInvoker {
    pub fn new(function: Arc<dyn ScalarFunction>) -> Self {
        Self { function }
    }

    pub fn name(&self) -> &str {
        self.function.name()
    }

    pub fn return_type(&self) -> &SqlType {
        &self.function.signature().return_type
    }

    /// Coerce every argument to its declared type, then call the function.
    ///
    /// Coercion of all arguments completes before the function runs, so a
    /// failing argument never reaches the function body.
    pub fn invoke(&self, args: &[FieldValue]) -> SqlResult<FieldValue> {
        let signature = self.function.signature();
        if !signature.accepts_arity(args.len()) {
            return Err(SqlError::function_error(
                self.name(),
                format!("unexpected argument count {}", args.len()),
            ));
        }

        let mut coerced: Vec<Cow<'_, FieldValue>> = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let target = signature.param_type(index).ok_or_else(|| {
                SqlError::function_error(self.name(), format!("no parameter at index {}", index))
            })?;
            coerced.push(ArgCoercer::coerce(arg, target, index)?);
        }

        let owned: Vec<FieldValue> = coerced.into_iter().map(Cow::into_owned).collect();
        self.function.invoke(&owned)
    }
}

impl PartialEq for FunctionInvoker {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.function.signature() == other.function.signature()
    }
}

/// Function lookup by name
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn ScalarFunction>>,
}

impl FunctionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in functions
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Abs::new()));
        registry.register(Arc::new(Round::new()));
        registry.register(Arc::new(Ucase::new()));
        registry.register(Arc::new(Len::new()));
        registry.register(Arc::new(Concat::new()));
        registry.register(Arc::new(ArrayLength::new()));
        registry
    }

    /// Register a function, replacing any function of the same name
    pub fn register(&mut self, function: Arc<dyn ScalarFunction>) {
        self.functions
            .insert(function.name().to_uppercase(), function);
    }

    /// Find a function by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<Arc<dyn ScalarFunction>> {
        self.functions.get(&name.to_uppercase()).cloned()
    }

    /// Resolve a function for a call site with `arity` arguments
    pub fn resolve(&self, name: &str, arity: usize) -> SqlResult<FunctionInvoker> {
        let function = self
            .find(name)
            .ok_or_else(|| SqlError::plan_error(format!("Unknown function '{}'", name)))?;
        if !function.signature().accepts_arity(arity) {
            return Err(SqlError::plan_error(format!(
                "Function {} does not accept {} arguments",
                function.name(),
                arity
            )));
        }
        Ok(FunctionInvoker::new(function))
    }

    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

macro_rules! builtin {
    ($ty:ident, $name:expr, $category:expr, $signature:expr) => {
        #[derive(Debug)]
        pub struct $ty {
            signature: FunctionSignature,
        }

        impl $ty {
            pub const NAME: &'static str = $name;
            pub const CATEGORY: FunctionCategory = $category;

            pub fn new() -> Self {
                Self {
                    signature: $signature,
                }
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

builtin!(
    Abs,
    "ABS",
    FunctionCategory::Math,
    FunctionSignature::new(vec![ParamType::Nullable(SqlType::Double)], SqlType::Double)
);

impl ScalarFunction for Abs {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn category(&self) -> FunctionCategory {
        Self::CATEGORY
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn invoke(&self, args: &[FieldValue]) -> SqlResult<FieldValue> {
        match args.first() {
            Some(FieldValue::Double(v)) => Ok(FieldValue::Double(v.abs())),
            _ => Ok(FieldValue::Null),
        }
    }
}

builtin!(
    Round,
    "ROUND",
    FunctionCategory::Math,
    FunctionSignature::new(vec![ParamType::Nullable(SqlType::Double)], SqlType::BigInt)
);

impl ScalarFunction for Round {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn category(&self) -> FunctionCategory {
        Self::CATEGORY
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn invoke(&self, args: &[FieldValue]) -> SqlResult<FieldValue> {
        match args.first() {
            // Half up, like SQL ROUND: -2.5 rounds to -2
            Some(FieldValue::Double(v)) => Ok(FieldValue::BigInt((v + 0.5).floor() as i64)),
            _ => Ok(FieldValue::Null),
        }
    }
}

builtin!(
    Ucase,
    "UCASE",
    FunctionCategory::String,
    FunctionSignature::new(vec![ParamType::Nullable(SqlType::String)], SqlType::String)
);

impl ScalarFunction for Ucase {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn category(&self) -> FunctionCategory {
        Self::CATEGORY
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn invoke(&self, args: &[FieldValue]) -> SqlResult<FieldValue> {
        match args.first() {
            Some(FieldValue::String(s)) => Ok(FieldValue::String(s.to_uppercase())),
            _ => Ok(FieldValue::Null),
        }
    }
}

builtin!(
    Len,
    "LEN",
    FunctionCategory::String,
    FunctionSignature::new(vec![ParamType::Nullable(SqlType::String)], SqlType::Integer)
);

impl ScalarFunction for Len {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn category(&self) -> FunctionCategory {
        Self::CATEGORY
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn invoke(&self, args: &[FieldValue]) -> SqlResult<FieldValue> {
        match args.first() {
            Some(FieldValue::String(s)) => Ok(FieldValue::Integer(s.chars().count() as i32)),
            _ => Ok(FieldValue::Null),
        }
    }
}

builtin!(
    Concat,
    "CONCAT",
    FunctionCategory::String,
    FunctionSignature::variadic(ParamType::Nullable(SqlType::String), SqlType::String)
);

impl ScalarFunction for Concat {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn category(&self) -> FunctionCategory {
        Self::CATEGORY
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    /// NULL arguments are skipped
    fn invoke(&self, args: &[FieldValue]) -> SqlResult<FieldValue> {
        let mut out = String::new();
        for arg in args {
            if let FieldValue::String(s) = arg {
                out.push_str(s);
            }
        }
        Ok(FieldValue::String(out))
    }
}

builtin!(
    ArrayLength,
    "ARRAY_LENGTH",
    FunctionCategory::Array,
    FunctionSignature::new(
        vec![ParamType::array_of(ParamType::Nullable(SqlType::String))],
        SqlType::Integer
    )
);

impl ScalarFunction for ArrayLength {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn category(&self) -> FunctionCategory {
        Self::CATEGORY
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn invoke(&self, args: &[FieldValue]) -> SqlResult<FieldValue> {
        match args.first() {
            Some(FieldValue::Array(values)) => Ok(FieldValue::Integer(values.len() as i32)),
            _ => Ok(FieldValue::Null),
        }
    }
}
