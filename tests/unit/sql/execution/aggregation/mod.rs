pub mod udaf_test;
