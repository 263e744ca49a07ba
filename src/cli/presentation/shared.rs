//! Shared presentation helpers.

use crate::error::CycleError;
use owo_colors::OwoColorize;
use serde::Serialize;

pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CycleError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CycleError::ConfigError(format!("Failed to encode JSON output: {}", e)))
}
