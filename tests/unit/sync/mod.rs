pub mod scheduler_test;
