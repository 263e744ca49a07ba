//! Template stores
//!
//! Templates are addressed by [`TemplateId`] and laid out on disk as
//!
//! ```text
//! {root}/oops/{name}.yaml
//! {root}/interfaces/{interface}/model/{name}.yaml
//! {root}/interfaces/{interface}/model/interface_meta.yaml
//! {root}/interfaces/{interface}/observations/{name}.yaml
//! ```
//!
//! An optional observation records directory is searched before the store for
//! observation templates.

use crate::error::RenderError;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub const TEMPLATE_EXTENSION: &str = "yaml";
const INTERFACE_META: &str = "interface_meta";

/// Address of a template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateId {
    /// Top-level executable document (`variational3D`, `hofx4D`, `qc_thinning`, ...)
    Executable(String),
    /// Model interface fragment (`background`, `geometry`, ...)
    Model(String),
    /// Observation fragment, one per observation type
    Observation(String),
    /// Interface metadata (executables, processor counts)
    InterfaceMeta,
}

impl TemplateId {
    /// Path relative to the store root, without extension
    pub fn relative_path(&self, interface: &str) -> PathBuf {
        match self {
            TemplateId::Executable(name) => Path::new("oops").join(name),
            TemplateId::Model(name) => Path::new("interfaces")
                .join(interface)
                .join("model")
                .join(name),
            TemplateId::Observation(name) => Path::new("interfaces")
                .join(interface)
                .join("observations")
                .join(name),
            TemplateId::InterfaceMeta => Path::new("interfaces")
                .join(interface)
                .join("model")
                .join(INTERFACE_META),
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateId::Executable(name) => write!(f, "oops/{}", name),
            TemplateId::Model(name) => write!(f, "model/{}", name),
            TemplateId::Observation(name) => write!(f, "observations/{}", name),
            TemplateId::InterfaceMeta => write!(f, "model/{}", INTERFACE_META),
        }
    }
}

/// Source of raw template text
pub trait TemplateStore: Send + Sync {
    fn load(&self, id: &TemplateId) -> Result<String, RenderError>;

    /// Names of the observation templates this store can serve
    fn observation_names(&self) -> Result<Vec<String>, RenderError>;
}

/// Templates on disk
#[derive(Debug, Clone)]
pub struct DirectoryTemplateStore {
    root: PathBuf,
    interface: String,
    records_path: Option<PathBuf>,
}

impl DirectoryTemplateStore {
    pub fn new(root: impl Into<PathBuf>, interface: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            interface: interface.into(),
            records_path: None,
        }
    }

    /// Search `records_path` first for observation templates
    pub fn with_records_path(mut self, records_path: Option<PathBuf>) -> Self {
        self.records_path = records_path;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn candidates(&self, id: &TemplateId) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(2);
        if let (TemplateId::Observation(name), Some(records)) = (id, &self.records_path) {
            paths.push(records.join(name).with_extension(TEMPLATE_EXTENSION));
        }
        paths.push(
            self.root
                .join(id.relative_path(&self.interface))
                .with_extension(TEMPLATE_EXTENSION),
        );
        paths
    }
}

impl TemplateStore for DirectoryTemplateStore {
    fn load(&self, id: &TemplateId) -> Result<String, RenderError> {
        let candidates = self.candidates(id);
        for path in &candidates {
            if path.is_file() {
                debug!(template = %id, path = %path.display(), "Loading template");
                return Ok(fs::read_to_string(path)?);
            }
        }
        let searched: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        Err(RenderError::TemplateNotFound(format!(
            "{} (searched {})",
            id,
            searched.join(", ")
        )))
    }

    fn observation_names(&self) -> Result<Vec<String>, RenderError> {
        let dir = self
            .root
            .join("interfaces")
            .join(&self.interface)
            .join("observations");
        let mut dirs = vec![dir];
        if let Some(records) = &self.records_path {
            dirs.push(records.clone());
        }

        let mut names = Vec::new();
        for dir in dirs.iter().filter(|d| d.is_dir()) {
            for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
                let entry = entry.map_err(|e| {
                    RenderError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e))
                })?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some(TEMPLATE_EXTENSION) {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// In-memory templates, keyed by id
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateStore {
    templates: HashMap<TemplateId, String>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: TemplateId, text: impl Into<String>) -> &mut Self {
        self.templates.insert(id, text.into());
        self
    }

    pub fn with(mut self, id: TemplateId, text: impl Into<String>) -> Self {
        self.insert(id, text);
        self
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn load(&self, id: &TemplateId) -> Result<String, RenderError> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| RenderError::TemplateNotFound(id.to_string()))
    }

    fn observation_names(&self) -> Result<Vec<String>, RenderError> {
        let mut names: Vec<String> = self
            .templates
            .keys()
            .filter_map(|id| match id {
                TemplateId::Observation(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        names.sort();
        Ok(names)
    }
}
