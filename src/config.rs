//! Configuration System
//!
//! Experiment configuration loaded from layered sources: built-in defaults, the user's
//! global file, the workspace's `config/experiment.toml`, an environment-specific
//! `config/{ASSIMILATE_ENV}.toml`, and finally `ASSIMILATE__*` environment variables.

use crate::cycle::Application;
use crate::logging::LoggingConfig;
use crate::slots::SlotGrid;
use crate::template::ContextValue;
use crate::time::IsoDuration;
use crate::window::WindowParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Experiment name; prefixes merged file names
    #[serde(default = "default_experiment_id")]
    pub experiment_id: String,

    /// Directory holding `{experiment_id}/run/{cycle}` trees
    #[serde(default = "default_experiment_root")]
    pub experiment_root: PathBuf,

    #[serde(default)]
    pub window: WindowParams,

    /// Observation archive slot grid
    #[serde(default)]
    pub slots: SlotGrid,

    #[serde(default)]
    pub observations: ObservationsConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub executable: ExecutableConfig,

    /// Extra render context keys
    #[serde(default)]
    pub context: BTreeMap<String, ContextValue>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_experiment_id() -> String {
    "experiment".to_string()
}

fn default_experiment_root() -> PathBuf {
    PathBuf::from("experiments")
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            experiment_id: default_experiment_id(),
            experiment_root: default_experiment_root(),
            window: WindowParams::default(),
            slots: SlotGrid::default(),
            observations: ObservationsConfig::default(),
            templates: TemplatesConfig::default(),
            archive: ArchiveConfig::default(),
            executable: ExecutableConfig::default(),
            context: BTreeMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Observation acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationsConfig {
    /// Observation types processed each cycle
    #[serde(default)]
    pub types: Vec<String>,

    /// Archive experiment the observations come from
    #[serde(default = "default_obs_experiment")]
    pub experiment: String,

    /// Providers tried in order for each observation type
    #[serde(default = "default_providers")]
    pub providers: Vec<String>,

    /// Provider of bias-correction files
    #[serde(default = "default_bias_provider")]
    pub bias_provider: String,

    /// Directory searched before the template store for observation templates
    #[serde(default)]
    pub records_path: Option<PathBuf>,

    /// Link bias coefficients from the previous cycle instead of fetching them
    #[serde(default)]
    pub cycling_bias_correction: bool,

    /// First cycle of the experiment; bias files are always fetched for it
    #[serde(default)]
    pub first_cycle: Option<DateTime<Utc>>,

    /// Interval between cycles (defaults to the window length)
    #[serde(default)]
    pub cycle_frequency: Option<IsoDuration>,

    /// Dimension merged observation files grow along
    #[serde(default = "default_growing_dimension")]
    pub growing_dimension: String,
}

fn default_obs_experiment() -> String {
    "oper".to_string()
}

fn default_providers() -> Vec<String> {
    vec!["gdas".to_string()]
}

fn default_bias_provider() -> String {
    "gsi".to_string()
}

fn default_growing_dimension() -> String {
    "Location".to_string()
}

impl Default for ObservationsConfig {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            experiment: default_obs_experiment(),
            providers: default_providers(),
            bias_provider: default_bias_provider(),
            records_path: None,
            cycling_bias_correction: false,
            first_cycle: None,
            cycle_frequency: None,
            growing_dimension: default_growing_dimension(),
        }
    }
}

/// Template store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default = "default_templates_root")]
    pub root: PathBuf,

    /// Model interface whose templates are used
    #[serde(default = "default_interface")]
    pub interface: String,
}

fn default_templates_root() -> PathBuf {
    PathBuf::from("templates")
}

fn default_interface() -> String {
    "geos_atmosphere".to_string()
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            root: default_templates_root(),
            interface: default_interface(),
        }
    }
}

/// Local observation archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_root")]
    pub root: PathBuf,
}

fn default_archive_root() -> PathBuf {
    PathBuf::from("archive")
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: default_archive_root(),
        }
    }
}

/// Solver executable settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutableConfig {
    #[serde(default)]
    pub application: Application,

    /// Directory holding the solver binaries named in interface metadata
    #[serde(default = "default_bin_dir")]
    pub bin_dir: PathBuf,

    /// MPI launcher program
    #[serde(default = "default_launcher")]
    pub launcher: String,

    /// Write the rendered configuration and stop before dispatch
    #[serde(default)]
    pub generate_config_only: bool,

    /// hofx: save and merge GeoVaLs
    #[serde(default)]
    pub save_geovals: bool,

    /// hofx: render one configuration per ensemble member instead of running
    #[serde(default)]
    pub ensemble_members: Vec<u32>,

    /// localensembleda: save the posterior mean
    #[serde(default)]
    pub save_posterior_mean: bool,

    /// localensembleda: save the posterior ensemble
    #[serde(default)]
    pub save_posterior_ensemble: bool,
}

fn default_bin_dir() -> PathBuf {
    PathBuf::from("jedi_bundle/build/bin")
}

fn default_launcher() -> String {
    "mpirun".to_string()
}

impl Default for ExecutableConfig {
    fn default() -> Self {
        Self {
            application: Application::default(),
            bin_dir: default_bin_dir(),
            launcher: default_launcher(),
            generate_config_only: false,
            save_geovals: false,
            ensemble_members: Vec::new(),
            save_posterior_mean: false,
            save_posterior_ensemble: false,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Experiment(String),
    Window(String),
    Observations(String),
    Templates(String),
    Executable(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Experiment(msg) => write!(f, "Experiment: {}", msg),
            ValidationError::Window(msg) => write!(f, "Window: {}", msg),
            ValidationError::Observations(msg) => write!(f, "Observations: {}", msg),
            ValidationError::Templates(msg) => write!(f, "Templates: {}", msg),
            ValidationError::Executable(msg) => write!(f, "Executable: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ExperimentConfig {
    /// Validate the entire configuration, collecting every problem
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.experiment_id.trim().is_empty() {
            errors.push(ValidationError::Experiment(
                "experiment_id cannot be empty".to_string(),
            ));
        } else if self.experiment_id.contains('/') {
            errors.push(ValidationError::Experiment(format!(
                "experiment_id '{}' cannot contain '/'",
                self.experiment_id
            )));
        }

        if self.window.length.seconds() <= 0 {
            errors.push(ValidationError::Window(format!(
                "length must be positive, got {}",
                self.window.length
            )));
        }

        let mut seen = HashSet::new();
        for obs in &self.observations.types {
            if obs.trim().is_empty() {
                errors.push(ValidationError::Observations(
                    "observation type names cannot be empty".to_string(),
                ));
            } else if !seen.insert(obs.as_str()) {
                errors.push(ValidationError::Observations(format!(
                    "observation type '{}' listed twice",
                    obs
                )));
            }
        }
        if !self.observations.types.is_empty() && self.observations.providers.is_empty() {
            errors.push(ValidationError::Observations(
                "at least one provider is required".to_string(),
            ));
        }
        if self.observations.growing_dimension.trim().is_empty() {
            errors.push(ValidationError::Observations(
                "growing_dimension cannot be empty".to_string(),
            ));
        }
        if let Some(freq) = self.observations.cycle_frequency {
            if freq.seconds() <= 0 {
                errors.push(ValidationError::Observations(format!(
                    "cycle_frequency must be positive, got {}",
                    freq
                )));
            }
        }

        if self.templates.interface.trim().is_empty() {
            errors.push(ValidationError::Templates(
                "interface cannot be empty".to_string(),
            ));
        }

        if self.executable.launcher.trim().is_empty() {
            errors.push(ValidationError::Executable(
                "launcher cannot be empty".to_string(),
            ));
        }
        if self.executable.save_posterior_mean && self.executable.save_posterior_ensemble {
            errors.push(ValidationError::Executable(
                "save_posterior_mean and save_posterior_ensemble cannot both be true".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Make every relative path absolute against `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.experiment_root);
        resolve(&mut self.templates.root);
        resolve(&mut self.archive.root);
        resolve(&mut self.executable.bin_dir);
        if let Some(records) = self.observations.records_path.as_mut() {
            resolve(records);
        }
    }

    /// Interval between consecutive cycles
    pub fn cycle_frequency(&self) -> IsoDuration {
        self.observations
            .cycle_frequency
            .unwrap_or(self.window.length)
    }
}

/// Join validation errors into one message
pub fn describe_errors(errors: &[ValidationError]) -> String {
    let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    format!("Configuration validation failed:\n{}", lines.join("\n"))
}
