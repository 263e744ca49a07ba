//! File-set fetching
//!
//! The fetch service contract is narrow: given a request, deposit a file at the
//! target path or leave it absent. Absence is not an error. This module plans one
//! target per reconciled slot, tries providers in order, and classifies what arrived.

pub mod archive;
pub mod bias;

pub use archive::LocalArchive;

use crate::error::FetchError;
use crate::time::{self, IsoDuration};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Kind of archived data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Observation,
    BiasCorrection,
}

impl DataKind {
    /// Short archive tag (`ob`, `bc`)
    pub fn tag(&self) -> &'static str {
        match self {
            DataKind::Observation => "ob",
            DataKind::BiasCorrection => "bc",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// One request to the fetch service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub date: DateTime<Utc>,
    pub target: PathBuf,
    pub provider: String,
    pub obs_type: String,
    pub time_window: Option<IsoDuration>,
    pub experiment: String,
    pub kind: DataKind,
    pub file_type: Option<String>,
}

/// External retrieval service
pub trait FetchService: Send + Sync {
    /// Deposit the requested file at `request.target`, or leave it absent
    fn fetch(&self, request: &FetchRequest) -> Result<(), FetchError>;
}

/// Pre-merge file for one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotFile {
    pub index: usize,
    pub start: DateTime<Utc>,
    pub target: PathBuf,
}

impl SlotFile {
    pub fn exists(&self) -> bool {
        self.target.exists()
    }
}

/// `{cycle_dir}/{observation}.{slot_index}.{extension}` for every slot, in slot order
pub fn plan(
    cycle_dir: &Path,
    observation: &str,
    slots: &[DateTime<Utc>],
    extension: &str,
) -> Vec<SlotFile> {
    slots
        .iter()
        .enumerate()
        .map(|(index, start)| SlotFile {
            index,
            start: *start,
            target: cycle_dir.join(format!("{}.{}.{}", observation, index, extension)),
        })
        .collect()
}

/// What a round of slot fetches produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchClassification {
    /// Nothing arrived
    AllAbsent,
    /// At least one file arrived
    Present {
        existing: Vec<PathBuf>,
        missing: Vec<PathBuf>,
    },
}

impl FetchClassification {
    pub fn is_absent(&self) -> bool {
        matches!(self, FetchClassification::AllAbsent)
    }
}

pub fn classify(files: &[SlotFile]) -> FetchClassification {
    let (existing, missing): (Vec<_>, Vec<_>) = files.iter().partition(|f| f.exists());
    if existing.is_empty() {
        return FetchClassification::AllAbsent;
    }
    FetchClassification::Present {
        existing: existing.into_iter().map(|f| f.target.clone()).collect(),
        missing: missing.into_iter().map(|f| f.target.clone()).collect(),
    }
}

/// Slot files fetched from the provider that produced data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFetch {
    pub provider: String,
    pub files: Vec<SlotFile>,
    pub classification: FetchClassification,
}

/// Observation fetch parameters shared by every provider attempt
#[derive(Debug, Clone)]
pub struct ObservationFetch<'a> {
    pub observation: &'a str,
    pub experiment: &'a str,
    pub slots: &'a [DateTime<Utc>],
    pub slot_width: IsoDuration,
    pub cycle_dir: &'a Path,
    pub extension: &'a str,
}

/// Try providers in order; the first that yields any file wins.
///
/// Returns `None` when every provider left every slot absent.
pub fn fetch_observation(
    service: &dyn FetchService,
    providers: &[String],
    params: &ObservationFetch<'_>,
) -> Result<Option<ProviderFetch>, FetchError> {
    let files = plan(params.cycle_dir, params.observation, params.slots, params.extension);

    for provider in providers {
        for file in &files {
            let request = FetchRequest {
                date: file.start,
                target: file.target.clone(),
                provider: provider.clone(),
                obs_type: params.observation.to_string(),
                time_window: Some(params.slot_width),
                experiment: params.experiment.to_string(),
                kind: DataKind::Observation,
                file_type: None,
            };
            debug!(
                observation = params.observation,
                provider = %provider,
                slot = %time::iso(&file.start),
                target = %file.target.display(),
                "Fetching slot"
            );
            service.fetch(&request)?;
        }

        let classification = classify(&files);
        match &classification {
            FetchClassification::AllAbsent => {
                info!(
                    observation = params.observation,
                    provider = %provider,
                    "No files for this provider"
                );
            }
            FetchClassification::Present { existing, missing } => {
                info!(
                    observation = params.observation,
                    provider = %provider,
                    found = existing.len(),
                    missing = missing.len(),
                    "Fetched observation slots"
                );
                return Ok(Some(ProviderFetch {
                    provider: provider.clone(),
                    files,
                    classification,
                }));
            }
        }
    }
    Ok(None)
}
