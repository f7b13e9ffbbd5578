pub mod query_registry_test;
