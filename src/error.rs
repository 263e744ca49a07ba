//! Error types for cycle data preparation.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Timestamp and duration parsing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("Invalid ISO-8601 duration '{0}'")]
    InvalidDuration(String),

    #[error("Invalid timestamp '{0}' (expected e.g. 2021-12-12T06:00:00Z or 20211212T060000Z)")]
    InvalidTimestamp(String),

    #[error("Timestamp arithmetic overflowed at {0}")]
    Overflow(DateTime<Utc>),
}

/// Slot reconciliation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("No slot of the grid brackets window [{begin}, {end}) within one day on either side")]
    NoCoveringSlot {
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid window: begin {begin} is not before end {end}")]
    InvalidWindow {
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid slot grid: {0}")]
    InvalidGrid(String),
}

/// Template rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template '{template}' references key '{key}' which is not in the render context")]
    UnresolvedKey { template: String, key: String },

    #[error("Template recursion exceeded depth {depth} while rendering '{template}'")]
    TemplateRecursion { template: String, depth: usize },

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Failed to parse template '{template}': {message}")]
    TemplateParse { template: String, message: String },

    #[error("Key '{key}' holds a list or mapping and cannot be embedded in text of template '{template}'")]
    NonScalarInterpolation { template: String, key: String },

    #[error("Document still contains an unresolved delegate at '{0}'")]
    Unrendered(String),

    #[error("Context key '{key}' already holds a {existing}, refusing to replace it with a {incoming}")]
    ConflictingKey {
        key: String,
        existing: &'static str,
        incoming: &'static str,
    },

    #[error("Rendered document has no '{path}' ({expected})")]
    MissingPath { path: String, expected: &'static str },

    #[error("Expression error: {0}")]
    Expression(String),

    #[error("Failed to serialize document: {0}")]
    Serialize(String),

    #[error("Template I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Dataset storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not a dataset file: {0}")]
    NotADataset(PathBuf),

    #[error("Unsupported dataset version {version} in {path:?}")]
    UnsupportedVersion { path: PathBuf, version: u32 },

    #[error("Checksum mismatch in {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Invalid dataset structure: {0}")]
    InvalidStructure(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Merge errors
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Schema mismatch between {template:?} and {other:?}: {detail}")]
    SchemaMismatch {
        template: PathBuf,
        other: PathBuf,
        detail: String,
    },

    #[error("Fixed dimensions of {path:?} are {found:?}, expected {expected:?}")]
    FixedDimensions {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("None of the {0} merge inputs exist")]
    NoInputs(usize),

    #[error("Expected {expected} inputs matching '{pattern}', found {found}")]
    InputCount {
        pattern: String,
        expected: usize,
        found: usize,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Fetch adapter errors (the service itself reports absence by leaving no file)
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Fetch of {obs_type} from provider '{provider}' failed: {message}")]
    Failed {
        provider: String,
        obs_type: String,
        message: String,
    },

    #[error("Fetch I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// External executable dispatch errors
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to launch {executable:?}: {source}")]
    Launch {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Executable {executable:?} exited with status {code:?} (log: {log:?})")]
    ExecutableFailed {
        executable: PathBuf,
        code: Option<i32>,
        log: PathBuf,
    },
}

/// Cycle-level errors: everything that aborts a cycle
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Time error: {0}")]
    Time(#[from] TimeError),

    #[error("Slot error: {0}")]
    Slot(#[from] SlotError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid cycle state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<config::ConfigError> for CycleError {
    fn from(err: config::ConfigError) -> Self {
        CycleError::ConfigError(err.to_string())
    }
}

impl CycleError {
    /// Wrap an I/O error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CycleError::Io {
            path: path.into(),
            source,
        }
    }
}
