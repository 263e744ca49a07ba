//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::CycleError;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &CycleError) -> String {
    match e {
        CycleError::ConfigError(message) => format!("Configuration error:\n{}", message),
        CycleError::Dispatch(inner) => format!("Solver failed: {}", inner),
        other => other.to_string(),
    }
}
