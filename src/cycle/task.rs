//! Cycle sequencing
//!
//! `Configured → WindowComputed → SlotsReconciled → Fetched → Merged → Rendered →
//! Dispatched → Done`. Any fatal error moves the cycle to `Failed` and aborts it.
//! Observation types with no data in any slot are logged and skipped.

use super::application::{self, Application, EditParams};
use super::context;
use super::dispatch::{DispatchRequest, Dispatcher};
use super::state::{CycleState, StateTracker};
use super::Cycle;
use crate::config::ExperimentConfig;
use crate::dataset::io::EXTENSION;
use crate::error::{CycleError, MergeError, RenderError};
use crate::fetch::bias::{self, BiasFiles, BiasReport, BiasRequest, PreviousCycle};
use crate::fetch::{self, FetchClassification, FetchService, ObservationFetch, ProviderFetch};
use crate::merge::{self, MergeOutcome, MergeSpec};
use crate::template::{expr, DirectoryTemplateStore, Node, Renderer, TemplateContext, TemplateId};
use crate::time;
use crate::window::{Window, WindowType};
use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

/// Dimension GeoVaLs files grow along
pub const GEOVALS_DIMENSION: &str = "nlocs";

/// What happened to one observation type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationOutcome {
    /// No provider had data for any slot
    Skipped,
    Merged {
        provider: String,
        output: PathBuf,
        outcome: MergeOutcome,
        /// Slots that stayed empty
        missing: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationReport {
    pub observation: String,
    pub outcome: ObservationOutcome,
    pub bias: BiasReport,
}

/// Result of a completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: Cycle,
    pub window: Window,
    pub slots: Vec<DateTime<Utc>>,
    pub observations: Vec<ObservationReport>,
    pub config_files: Vec<PathBuf>,
    pub dispatched: bool,
    pub geovals: Vec<PathBuf>,
    pub states: Vec<CycleState>,
}

/// Runs cycles of one experiment
pub struct CycleTask<'a> {
    config: &'a ExperimentConfig,
    renderer: Renderer,
    fetcher: &'a dyn FetchService,
    dispatcher: &'a dyn Dispatcher,
    tracker: StateTracker,
}

impl<'a> CycleTask<'a> {
    pub fn new(
        config: &'a ExperimentConfig,
        renderer: Renderer,
        fetcher: &'a dyn FetchService,
        dispatcher: &'a dyn Dispatcher,
    ) -> Self {
        Self {
            config,
            renderer,
            fetcher,
            dispatcher,
            tracker: StateTracker::new(),
        }
    }

    /// Templates come from the configured store and records path
    pub fn from_config(
        config: &'a ExperimentConfig,
        fetcher: &'a dyn FetchService,
        dispatcher: &'a dyn Dispatcher,
    ) -> Self {
        let store = DirectoryTemplateStore::new(&config.templates.root, &config.templates.interface)
            .with_records_path(config.observations.records_path.clone());
        Self::new(config, Renderer::from_store(store), fetcher, dispatcher)
    }

    pub fn state(&self) -> CycleState {
        self.tracker.state()
    }

    pub fn history(&self) -> &[CycleState] {
        self.tracker.history()
    }

    /// Run one cycle to completion
    #[instrument(skip(self), fields(experiment = %self.config.experiment_id, cycle = %time::iso(&cycle_time)))]
    pub fn run(&mut self, cycle_time: DateTime<Utc>) -> Result<CycleReport, CycleError> {
        self.tracker = StateTracker::new();
        match self.run_stages(cycle_time) {
            Ok(report) => {
                info!(states = self.tracker.history().len(), "Cycle complete");
                Ok(report)
            }
            Err(e) => {
                let reached = self.tracker.state();
                self.tracker.fail();
                error!(state = %reached, error = %e, "Cycle failed");
                Err(e)
            }
        }
    }

    fn run_stages(&mut self, cycle_time: DateTime<Utc>) -> Result<CycleReport, CycleError> {
        let config = self.config;
        let application = config.executable.application;
        if application == Application::LocalEnsembleDa
            && config.executable.save_posterior_mean
            && config.executable.save_posterior_ensemble
        {
            return Err(CycleError::ConfigError(
                "save_posterior_mean and save_posterior_ensemble cannot both be true".to_string(),
            ));
        }

        let cycle = Cycle::new(config, cycle_time);
        fs::create_dir_all(cycle.dir()).map_err(|e| CycleError::io(cycle.dir(), e))?;

        let window = Window::compute(cycle_time, &config.window)?;
        info!(window = %window, "Window computed");
        self.tracker.advance(CycleState::WindowComputed)?;

        let slots = config.slots.reconcile(window.begin(), window.end())?;
        info!(
            count = slots.len(),
            slots = ?slots.iter().map(time::iso).collect::<Vec<_>>(),
            "Slots reconciled"
        );
        self.tracker.advance(CycleState::SlotsReconciled)?;

        let context = context::build(config, &cycle, &window)?;

        // Fetch observations and bias files
        let mut fetched = Vec::with_capacity(config.observations.types.len());
        for observation in &config.observations.types {
            let obs_doc = self.renderer.render_observation(observation, &context)?;
            let params = ObservationFetch {
                observation,
                experiment: &config.observations.experiment,
                slots: &slots,
                slot_width: config.slots.width(),
                cycle_dir: cycle.dir(),
                extension: EXTENSION,
            };
            let result =
                fetch::fetch_observation(self.fetcher, &config.observations.providers, &params)?;
            if result.is_none() {
                info!(observation = %observation, "None of the observation files exist for this cycle");
            }
            let bias = self.propagate_bias(observation, &obs_doc, &cycle, &window)?;
            fetched.push((observation.clone(), obs_doc, result, bias));
        }
        self.tracker.advance(CycleState::Fetched)?;

        // Merge or rename what arrived
        let mut observations = Vec::with_capacity(fetched.len());
        for (observation, obs_doc, result, bias) in fetched {
            let outcome = match result {
                None => ObservationOutcome::Skipped,
                Some(provider_fetch) => {
                    let output = merged_path(&obs_doc, config, &cycle, &window, &observation);
                    self.combine(&observation, provider_fetch, output)?
                }
            };
            observations.push(ObservationReport {
                observation,
                outcome,
                bias,
            });
        }
        self.tracker.advance(CycleState::Merged)?;

        // Render the solver configuration
        let window_begin = time::directory(&window.begin());
        let edit = EditParams {
            cycle_dir: cycle.dir(),
            window_begin: &window_begin,
            observations: &config.observations.types,
            extension: EXTENSION,
        };
        let template = TemplateId::Executable(application.template_name(window.window_type()));
        let document = self.renderer.render(&template, &context)?;

        let members: &[u32] = if application == Application::Hofx {
            &config.executable.ensemble_members
        } else {
            &[]
        };
        let mut config_files = Vec::new();
        if members.is_empty() {
            let doc = self.edit_document(&document, &edit, window.window_type(), None)?;
            let path = application.config_file(cycle.dir());
            write_config(&path, &doc)?;
            config_files.push(path);
        } else {
            for &member in members {
                let doc = self.edit_document(&document, &edit, window.window_type(), Some(member))?;
                let path = application.member_config_file(cycle.dir(), member);
                write_config(&path, &doc)?;
                config_files.push(path);
            }
        }
        self.tracker.advance(CycleState::Rendered)?;

        // Dispatch
        let mut dispatched = false;
        let mut geovals = Vec::new();
        if config.executable.generate_config_only || !members.is_empty() {
            info!(files = config_files.len(), "Configuration generated, skipping dispatch");
        } else {
            let processors = self.dispatch(application, &context, &cycle, &window, &config_files[0])?;
            self.tracker.advance(CycleState::Dispatched)?;
            dispatched = true;

            if application == Application::Hofx && config.executable.save_geovals {
                geovals = self.merge_geovals(&cycle, &window_begin, processors)?;
            }
        }
        self.tracker.advance(CycleState::Done)?;

        Ok(CycleReport {
            cycle,
            window,
            slots,
            observations,
            config_files,
            dispatched,
            geovals,
            states: self.tracker.history().to_vec(),
        })
    }

    fn combine(
        &self,
        observation: &str,
        provider_fetch: ProviderFetch,
        output: PathBuf,
    ) -> Result<ObservationOutcome, CycleError> {
        let missing = match &provider_fetch.classification {
            FetchClassification::Present { missing, .. } => missing.len(),
            FetchClassification::AllAbsent => 0,
        };
        let inputs = provider_fetch.files.into_iter().map(|f| f.target).collect();
        let spec = MergeSpec::new(inputs, &output, &self.config.observations.growing_dimension);
        let outcome = merge::merge(&spec)?;
        bias::make_readable(&output).map_err(|e| CycleError::io(&output, e))?;

        info!(
            observation,
            provider = %provider_fetch.provider,
            path = %output.display(),
            missing,
            "Observation file ready"
        );
        Ok(ObservationOutcome::Merged {
            provider: provider_fetch.provider,
            output,
            outcome,
            missing,
        })
    }

    fn propagate_bias(
        &self,
        observation: &str,
        obs_doc: &Node,
        cycle: &Cycle,
        window: &Window,
    ) -> Result<BiasReport, CycleError> {
        let obs_config = &self.config.observations;
        let previous = cycle.previous(self.config.cycle_frequency())?;
        let cycling = obs_config.cycling_bias_correction
            && obs_config.first_cycle != Some(cycle.time());

        let request = BiasRequest {
            observation,
            experiment: &obs_config.experiment,
            provider: &obs_config.bias_provider,
            background_time: window.background_time(),
            previous_cycle: cycling.then(|| PreviousCycle {
                current_dir: cycle.dir(),
                previous_dir: previous.dir(),
            }),
        };

        let mut report = BiasReport::default();
        if observation == bias::AIRCRAFT {
            report.absorb(bias::propagate_aircraft(self.fetcher, cycle.dir(), &request)?);
        }
        if let Some(files) = BiasFiles::from_observation(obs_doc) {
            report.absorb(bias::propagate_satellite(self.fetcher, &files, &request)?);
        }
        Ok(report)
    }

    fn edit_document(
        &self,
        document: &Node,
        edit: &EditParams<'_>,
        window_type: WindowType,
        member: Option<u32>,
    ) -> Result<Node, CycleError> {
        let executable = &self.config.executable;
        Ok(match executable.application {
            Application::Variational => document.clone(),
            Application::Hofx => {
                let mut doc = if window_type == WindowType::FourD {
                    application::add_time_interpolation(document)?
                } else {
                    document.clone()
                };
                if let Some(member) = member {
                    doc = application::tag_member_output(&doc, edit, member)?;
                }
                if executable.save_geovals {
                    doc = application::append_gomsaver(&doc, edit, member)?;
                }
                doc
            }
            Application::LocalEnsembleDa => application::strip_obs_output(document)?,
            Application::ObsFilters => {
                let (doc, copies) = application::thinning_config(document)?;
                for copy in copies {
                    if !copy.from.is_file() {
                        warn!(path = %copy.from.display(), "Observation file missing, not copied");
                        continue;
                    }
                    fs::copy(&copy.from, &copy.to).map_err(|e| CycleError::io(&copy.to, e))?;
                }
                doc
            }
        })
    }

    fn dispatch(
        &self,
        application: Application,
        context: &TemplateContext,
        cycle: &Cycle,
        window: &Window,
        config_file: &Path,
    ) -> Result<u32, CycleError> {
        let meta = self.renderer.render_interface_meta(context)?;

        let processors = if application.single_process() {
            1
        } else {
            let formula = meta
                .get_path(&["total_processors"])
                .ok_or_else(|| RenderError::MissingPath {
                    path: "total_processors".to_string(),
                    expected: "integer or expression",
                })?;
            expr::evaluate_node(formula, context)?
        };
        let processors = u32::try_from(processors)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                CycleError::ConfigError(format!(
                    "processor count must be positive, got {}",
                    processors
                ))
            })?;

        let key = application.executable_key(window.window_type());
        let binary = meta
            .get_path(&["executables", key.as_str()])
            .and_then(Node::as_str)
            .ok_or_else(|| RenderError::MissingPath {
                path: format!("executables.{}", key),
                expected: "string",
            })?;

        let request = DispatchRequest {
            executable: self.config.executable.bin_dir.join(binary),
            config_file: config_file.to_path_buf(),
            log_file: application.log_file(cycle.dir()),
            processors,
            working_dir: cycle.dir().to_path_buf(),
        };
        self.dispatcher.dispatch(&request)?;
        Ok(processors)
    }

    /// Combine the per-process GeoVaLs files of every observation
    fn merge_geovals(
        &self,
        cycle: &Cycle,
        window_begin: &str,
        processors: u32,
    ) -> Result<Vec<PathBuf>, CycleError> {
        let suffix = format!(".{}", EXTENSION);
        let mut outputs = Vec::new();

        for observation in &self.config.observations.types {
            info!(observation = %observation, "Combining GeoVaLs files");
            let prefix = format!("{}-geovals.{}_", observation, window_begin);
            let mut inputs: Vec<PathBuf> = fs::read_dir(cycle.dir())
                .map_err(|e| CycleError::io(cycle.dir(), e))?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| {
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with(&prefix) && n.ends_with(&suffix))
                        .unwrap_or(false)
                })
                .collect();
            inputs.sort();

            if inputs.len() != processors as usize {
                return Err(MergeError::InputCount {
                    pattern: format!("{}*{}", prefix, suffix),
                    expected: processors as usize,
                    found: inputs.len(),
                }
                .into());
            }

            let output = cycle.dir().join(format!(
                "{}.{}-geovals.{}{}",
                self.config.experiment_id, observation, window_begin, suffix
            ));
            merge::merge(&MergeSpec::new(inputs, &output, GEOVALS_DIMENSION))?;
            outputs.push(output);
        }
        Ok(outputs)
    }
}

/// Where the merged observation file goes: the observation template's input file, or
/// `{cycle_dir}/{experiment_id}.{observation}.{window_begin}.{ext}`
pub fn merged_path(
    obs_doc: &Node,
    config: &ExperimentConfig,
    cycle: &Cycle,
    window: &Window,
    observation: &str,
) -> PathBuf {
    obs_doc
        .get_path(&["obs space", "obsdatain", "engine", "obsfile"])
        .and_then(Node::as_str)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            cycle.dir().join(format!(
                "{}.{}.{}.{}",
                config.experiment_id,
                observation,
                time::directory(&window.begin()),
                EXTENSION
            ))
        })
}

/// Write a rendered document as block YAML, atomically
pub fn write_config(path: &Path, document: &Node) -> Result<(), CycleError> {
    let text = document.to_yaml_string()?;

    let mut temp: OsString = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    fs::write(&temp, text).map_err(|e| CycleError::io(&temp, e))?;
    fs::rename(&temp, path).map_err(|e| {
        let _ = fs::remove_file(&temp);
        CycleError::io(path, e)
    })?;
    info!(path = %path.display(), "Wrote solver configuration");
    Ok(())
}
