//! Dataset container format
//!
//! ```text
//! [0..4)   magic  b"ADSF"
//! [4..8)   format version, u32 little-endian
//! [8..40)  BLAKE3 hash of the payload
//! [40..)   bincode(Dataset)
//! ```

use super::model::Dataset;
use crate::error::StorageError;
use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MAGIC: &[u8; 4] = b"ADSF";
pub const FORMAT_VERSION: u32 = 1;
/// File extension for dataset files
pub const EXTENSION: &str = "ads";
const HEADER_LEN: usize = 4 + 4 + 32;

fn io_error(message: String) -> StorageError {
    StorageError::IoError(std::io::Error::new(std::io::ErrorKind::Other, message))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write a dataset atomically
pub fn write(path: &Path, dataset: &Dataset) -> Result<(), StorageError> {
    dataset.validate()?;

    // Create parent directories if needed
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            io_error(format!("Failed to create parent directory {:?}: {}", parent, e))
        })?;
    }

    let payload = bincode::serialize(dataset)
        .map_err(|e| io_error(format!("Failed to serialize dataset: {}", e)))?;
    let checksum = blake3::hash(&payload);

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(checksum.as_bytes());
    bytes.extend_from_slice(&payload);

    // Write to temporary file, then rename into place
    let temp = temp_path(path);
    fs::write(&temp, &bytes)
        .map_err(|e| io_error(format!("Failed to write dataset to {:?}: {}", temp, e)))?;
    fs::rename(&temp, path).map_err(|e| {
        let _ = fs::remove_file(&temp);
        io_error(format!("Failed to rename temp file to {:?}: {}", path, e))
    })?;

    debug!(path = %path.display(), bytes = bytes.len(), "Wrote dataset");
    Ok(())
}

/// Read and verify a dataset
pub fn read(path: &Path) -> Result<Dataset, StorageError> {
    let bytes = fs::read(path)
        .map_err(|e| io_error(format!("Failed to read dataset from {:?}: {}", path, e)))?;

    if bytes.len() < HEADER_LEN || &bytes[0..4] != MAGIC {
        return Err(StorageError::NotADataset(path.to_path_buf()));
    }

    let mut version_bytes = [0u8; 4];
    version_bytes.copy_from_slice(&bytes[4..8]);
    let version = u32::from_le_bytes(version_bytes);
    if version != FORMAT_VERSION {
        return Err(StorageError::UnsupportedVersion {
            path: path.to_path_buf(),
            version,
        });
    }

    let payload = &bytes[HEADER_LEN..];
    let expected = hex::encode(&bytes[8..HEADER_LEN]);
    let actual = blake3::hash(payload).to_hex().to_string();
    if expected != actual {
        return Err(StorageError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }

    let dataset: Dataset = bincode::deserialize(payload).map_err(|e| {
        io_error(format!("Failed to deserialize dataset from {:?}: {}", path, e))
    })?;
    dataset.validate()?;
    Ok(dataset)
}

/// True when the file starts with the container magic
pub fn is_dataset(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    fs::File::open(path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .map(|_| &magic == MAGIC)
        .unwrap_or(false)
}
