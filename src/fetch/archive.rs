//! Directory-tree archive implementing the fetch contract
//!
//! Layout:
//!
//! ```text
//! {root}/{experiment}/{ob|bc}/{provider}/{obs_type}/{YYYYmmddTHHMMSSZ}[.{window}].{file_type}
//! ```
//!
//! Observation files default to the dataset extension when no file type is given.

use super::{FetchRequest, FetchService};
use crate::dataset::io::EXTENSION;
use crate::error::FetchError;
use crate::time;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct LocalArchive {
    root: PathBuf,
}

impl LocalArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the archive keeps the file a request asks for
    pub fn archive_path(&self, request: &FetchRequest) -> PathBuf {
        let mut name = time::directory(&request.date);
        if let Some(window) = request.time_window {
            name.push('.');
            name.push_str(&window.to_string());
        }
        name.push('.');
        name.push_str(request.file_type.as_deref().unwrap_or(EXTENSION));

        self.root
            .join(&request.experiment)
            .join(request.kind.tag())
            .join(&request.provider)
            .join(&request.obs_type)
            .join(name)
    }
}

impl FetchService for LocalArchive {
    fn fetch(&self, request: &FetchRequest) -> Result<(), FetchError> {
        let source = self.archive_path(request);
        if !source.is_file() {
            debug!(
                obs_type = %request.obs_type,
                provider = %request.provider,
                path = %source.display(),
                "Not in archive"
            );
            return Ok(());
        }

        if let Some(parent) = request.target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, &request.target).map_err(|e| {
            warn!(path = %source.display(), error = %e, "Archive copy failed");
            FetchError::Failed {
                provider: request.provider.clone(),
                obs_type: request.obs_type.clone(),
                message: format!("copy {:?} -> {:?}: {}", source, request.target, e),
            }
        })?;
        Ok(())
    }
}
