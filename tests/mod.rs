// Test Module Organization

// Unit tests - Fast tests with no external dependencies
pub mod unit;
