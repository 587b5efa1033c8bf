//! CLI integration tests against a generated host directory.

mod common;
mod pipeline_tests;
mod stock_tests;
