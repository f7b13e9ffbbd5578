pub mod plan_node_test;
