// SQL module tests

// Physical plan model
pub mod plan;
