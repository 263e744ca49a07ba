//! Configuration loading entry points.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::{describe_errors, ExperimentConfig};
use crate::error::CycleError;
use config::{Environment, File};
use std::path::Path;
use tracing::debug;

/// Prefix of environment overrides (`ASSIMILATE__WINDOW__LENGTH=PT12H`)
pub const ENV_PREFIX: &str = "ASSIMILATE";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace, applying every layer.
    ///
    /// Relative paths are resolved against `workspace_root`.
    pub fn load(workspace_root: &Path) -> Result<ExperimentConfig, CycleError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let mut config: ExperimentConfig = builder.build()?.try_deserialize()?;
        config.resolve_paths(workspace_root);
        Self::checked(config)
    }

    /// Load configuration from one explicit file.
    ///
    /// Relative paths are resolved against the file's directory.
    pub fn load_from_file(path: &Path) -> Result<ExperimentConfig, CycleError> {
        debug!(path = %path.display(), "Loading configuration file");
        if !path.is_file() {
            return Err(CycleError::ConfigError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true));

        let mut config: ExperimentConfig = builder.build()?.try_deserialize()?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        Self::checked(config)
    }

    fn checked(config: ExperimentConfig) -> Result<ExperimentConfig, CycleError> {
        config
            .validate()
            .map_err(|errors| CycleError::ConfigError(describe_errors(&errors)))?;
        Ok(config)
    }
}
