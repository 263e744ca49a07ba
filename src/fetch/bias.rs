//! Bias-correction file propagation
//!
//! Observations whose rendered template carries an `obs bias` block need coefficient
//! and covariance files at the background time, plus any time-lapse predictor files.
//! When bias correction is cycled, every cycle after the first links the previous
//! cycle's coefficient files instead of fetching them. Aircraft additionally needs
//! three CSV coefficient tables.

use super::{DataKind, FetchRequest, FetchService};
use crate::error::FetchError;
use crate::template::Node;
use crate::time;
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const AIRCRAFT: &str = "aircraft";

pub const AIRCRAFT_BIAS_TYPES: [&str; 3] = [
    "aircraft_abias_air_ascent",
    "aircraft_abias_air_ascentSquared",
    "aircraft_abias_air_constant",
];

/// Bias files named by an observation template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiasFiles {
    pub coefficients: PathBuf,
    pub covariance: PathBuf,
    pub tlapse: Vec<PathBuf>,
}

impl BiasFiles {
    /// Read bias file paths from a rendered observation document. `None` when the
    /// observation has no complete `obs bias` block.
    pub fn from_observation(doc: &Node) -> Option<BiasFiles> {
        let coefficients = doc.get_path(&["obs bias", "input file"])?.as_str()?;
        let covariance = doc
            .get_path(&["obs bias", "covariance", "prior", "input file"])?
            .as_str()?;
        let tlapse = doc
            .get_path(&["obs bias", "variational bc", "predictors"])
            .and_then(Node::as_seq)
            .map(|predictors| {
                predictors
                    .iter()
                    .filter_map(|p| p.get_path(&["tlapse"]).and_then(Node::as_str))
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();
        Some(BiasFiles {
            coefficients: PathBuf::from(coefficients),
            covariance: PathBuf::from(covariance),
            tlapse,
        })
    }
}

/// Current and previous cycle directories, for cycled bias correction
#[derive(Debug, Clone, Copy)]
pub struct PreviousCycle<'a> {
    pub current_dir: &'a Path,
    pub previous_dir: &'a Path,
}

/// Shared parameters for bias requests
#[derive(Debug, Clone)]
pub struct BiasRequest<'a> {
    pub observation: &'a str,
    pub experiment: &'a str,
    pub provider: &'a str,
    pub background_time: DateTime<Utc>,
    /// Set when bias correction is cycled and this is not the first cycle
    pub previous_cycle: Option<PreviousCycle<'a>>,
}

impl BiasRequest<'_> {
    fn fetch_request(&self, obs_type: &str, target: &Path, file_type: &str) -> FetchRequest {
        FetchRequest {
            date: self.background_time,
            target: target.to_path_buf(),
            provider: self.provider.to_string(),
            obs_type: obs_type.to_string(),
            time_window: None,
            experiment: self.experiment.to_string(),
            kind: DataKind::BiasCorrection,
            file_type: Some(file_type.to_string()),
        }
    }
}

/// What happened to each bias file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BiasReport {
    pub linked: Vec<PathBuf>,
    pub fetched: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
}

impl BiasReport {
    /// Fold another report into this one
    pub fn absorb(&mut self, other: BiasReport) {
        self.linked.extend(other.linked);
        self.fetched.extend(other.fetched);
        self.missing.extend(other.missing);
    }

    fn record(&mut self, target: &Path) -> io::Result<()> {
        if target.exists() {
            make_readable(target)?;
            self.fetched.push(target.to_path_buf());
        } else {
            self.missing.push(target.to_path_buf());
        }
        Ok(())
    }
}

/// Fetch or link the satellite bias files of one observation
pub fn propagate_satellite(
    service: &dyn FetchService,
    files: &BiasFiles,
    request: &BiasRequest<'_>,
) -> Result<BiasReport, FetchError> {
    let mut report = BiasReport::default();

    for (target, file_type) in [
        (&files.coefficients, "satbias"),
        (&files.covariance, "satbias_cov"),
    ] {
        if let Some(previous) = request.previous_cycle {
            let source = previous_cycle_path(target, previous);
            if source.exists() {
                info!(
                    observation = request.observation,
                    from = %source.display(),
                    to = %target.display(),
                    "Linking bias file from previous cycle"
                );
                link_or_copy(&source, target)?;
                make_readable(target)?;
                report.linked.push(target.clone());
                continue;
            }
            warn!(
                observation = request.observation,
                path = %source.display(),
                "Previous cycle bias file missing, fetching instead"
            );
        }

        info!(
            observation = request.observation,
            path = %target.display(),
            "Fetching satellite bias file"
        );
        service.fetch(&request.fetch_request(request.observation, target, file_type))?;
        report.record(target)?;
    }

    for target in &files.tlapse {
        info!(observation = request.observation, path = %target.display(), "Fetching time lapse file");
        service.fetch(&request.fetch_request(request.observation, target, "tlapse"))?;
        report.record(target)?;
    }

    Ok(report)
}

/// `{cycle_dir}/{type}.{background_time}.csv` for each aircraft bias table
pub fn aircraft_targets(cycle_dir: &Path, background_time: DateTime<Utc>) -> Vec<(&'static str, PathBuf)> {
    AIRCRAFT_BIAS_TYPES
        .iter()
        .map(|t| {
            (
                *t,
                cycle_dir.join(format!("{}.{}.csv", t, time::directory(&background_time))),
            )
        })
        .collect()
}

/// Fetch the aircraft bias tables
pub fn propagate_aircraft(
    service: &dyn FetchService,
    cycle_dir: &Path,
    request: &BiasRequest<'_>,
) -> Result<BiasReport, FetchError> {
    let mut report = BiasReport::default();
    for (obs_type, target) in aircraft_targets(cycle_dir, request.background_time) {
        info!(path = %target.display(), "Fetching aircraft bias file");
        service.fetch(&request.fetch_request(obs_type, &target, "csv"))?;
        report.record(&target)?;
    }
    Ok(report)
}

/// The same file in the previous cycle's directory
pub fn previous_cycle_path(target: &Path, cycles: PreviousCycle<'_>) -> PathBuf {
    match target.strip_prefix(cycles.current_dir) {
        Ok(relative) => cycles.previous_dir.join(relative),
        Err(_) => match target.file_name() {
            Some(name) => cycles.previous_dir.join(name),
            None => cycles.previous_dir.to_path_buf(),
        },
    }
}

/// Hard-link `source` to `target`, copying when linking is not possible
pub fn link_or_copy(source: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    if target.exists() {
        fs::remove_file(target)?;
    }
    if fs::hard_link(source, target).is_err() {
        fs::copy(source, target)?;
    }
    Ok(())
}

#[cfg(unix)]
pub fn make_readable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
pub fn make_readable(_path: &Path) -> io::Result<()> {
    Ok(())
}
