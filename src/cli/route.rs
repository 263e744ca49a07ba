//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::config::{ConfigLoader, ExperimentConfig};
use crate::cycle::{context, task, Cycle, CycleTask, MpiDispatcher};
use crate::dataset;
use crate::error::CycleError;
use crate::fetch::LocalArchive;
use crate::merge::{self, MergeSpec};
use crate::template::{DirectoryTemplateStore, Renderer, TemplateId};
use crate::time;
use crate::window::Window;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cli::parse::Commands;
use crate::cli::{command_name, is_mutation};
use crate::cli::presentation::{
    format_inspect_json, format_inspect_text, format_merge_outcome, format_run_report_json,
    format_run_report_text, format_slots_json, format_slots_text, format_window_json,
    format_window_text,
};

/// Runtime context for CLI execution: workspace, config path and the loaded experiment.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config_path: Option<PathBuf>,
    config: ExperimentConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, CycleError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        debug!(
            workspace = %workspace_root.display(),
            experiment = %config.experiment_id,
            "Configuration loaded"
        );
        Ok(Self {
            workspace_root,
            config_path,
            config,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, CycleError> {
        info!(
            command = command_name(command),
            mutation = is_mutation(command),
            "Executing command"
        );
        match command {
            Commands::Window { cycle, format } => {
                let window = self.window(parse_cycle(cycle)?)?;
                if format == "json" {
                    format_window_json(&window)
                } else {
                    Ok(format_window_text(&window))
                }
            }
            Commands::Slots { cycle, format } => {
                let window = self.window(parse_cycle(cycle)?)?;
                let slots = self.config.slots.reconcile(window.begin(), window.end())?;
                if format == "json" {
                    format_slots_json(&window, &slots)
                } else {
                    Ok(format_slots_text(&window, &self.config.slots, &slots))
                }
            }
            Commands::Render {
                cycle,
                template,
                observation,
                output,
            } => self.handle_render(
                parse_cycle(cycle)?,
                template.as_deref(),
                observation.as_deref(),
                output.as_deref(),
            ),
            Commands::Merge {
                output,
                dimension,
                fixed,
                inputs,
            } => {
                let dimension = dimension
                    .clone()
                    .unwrap_or_else(|| self.config.observations.growing_dimension.clone());
                let mut spec = MergeSpec::new(inputs.clone(), output, dimension);
                if !fixed.is_empty() {
                    spec = spec.with_fixed_dimensions(fixed.iter().cloned());
                }
                let outcome = merge::merge(&spec)?;
                Ok(format_merge_outcome(output, &outcome))
            }
            Commands::Inspect { path, format } => {
                let summary = dataset::inspect(path)?;
                if format == "json" {
                    format_inspect_json(&summary)
                } else {
                    Ok(format_inspect_text(path, &summary))
                }
            }
            Commands::Run {
                cycle,
                generate_config_only,
                format,
            } => {
                let cycle_time = parse_cycle(cycle)?;
                let mut config = self.config.clone();
                if *generate_config_only {
                    config.executable.generate_config_only = true;
                }
                let archive = LocalArchive::new(&config.archive.root);
                let dispatcher = MpiDispatcher::new(&config.executable.launcher);
                let report = CycleTask::from_config(&config, &archive, &dispatcher).run(cycle_time)?;
                if format == "json" {
                    format_run_report_json(&report)
                } else {
                    Ok(format_run_report_text(&report))
                }
            }
        }
    }

    fn window(&self, cycle_time: DateTime<Utc>) -> Result<Window, CycleError> {
        Ok(Window::compute(cycle_time, &self.config.window)?)
    }

    fn handle_render(
        &self,
        cycle_time: DateTime<Utc>,
        template: Option<&str>,
        observation: Option<&str>,
        output: Option<&Path>,
    ) -> Result<String, CycleError> {
        let config = &self.config;
        let cycle = Cycle::new(config, cycle_time);
        let window = self.window(cycle_time)?;
        let ctx = context::build(config, &cycle, &window)?;

        let store = DirectoryTemplateStore::new(&config.templates.root, &config.templates.interface)
            .with_records_path(config.observations.records_path.clone());
        let renderer = Renderer::from_store(store);

        let id = match (template, observation) {
            (_, Some(observation)) => TemplateId::Observation(observation.to_string()),
            (Some(name), None) => TemplateId::Executable(name.to_string()),
            (None, None) => TemplateId::Executable(
                config
                    .executable
                    .application
                    .template_name(window.window_type()),
            ),
        };
        let document = renderer.render(&id, &ctx)?;

        match output {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|e| CycleError::io(parent, e))?;
                }
                task::write_config(path, &document)?;
                Ok(format!("Rendered {} to {}", id, path.display()))
            }
            None => Ok(document.to_yaml_string()?),
        }
    }
}

fn parse_cycle(text: &str) -> Result<DateTime<Utc>, CycleError> {
    Ok(time::parse_timestamp(text)?)
}
