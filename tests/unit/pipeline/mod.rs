// Unit tests for pipeline module

pub mod filter_test;
pub mod sanitizer_test;
