pub mod common;
// Engine configuration and configured statements
pub mod config;
// Query executor and registry
pub mod server;
pub mod sql;
