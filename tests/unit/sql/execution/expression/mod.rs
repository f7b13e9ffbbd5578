pub mod codegen_test;
pub mod coercion_test;
pub mod compiler_test;
