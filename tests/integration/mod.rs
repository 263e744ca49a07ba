//! Integration tests for cycle data preparation

mod cli_integration;
mod config_integration;
mod cycle_integration;
mod merge_integration;
mod render_integration;
mod test_utils;
