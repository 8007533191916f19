pub mod loader_test;
