//! Self-describing structured data files
//!
//! Observation, bias and GeoVaLs files share one container: named dimensions, nested
//! groups, typed n-dimensional variables with ordered attributes and a fill value fixed
//! at variable creation. See [`io`] for the on-disk layout.

pub mod io;
pub mod model;

pub use io::{is_dataset, read, write};
pub use model::{
    ArrayData, AttrValue, Attributes, DType, Dataset, Dimension, FillValue, Group, Variable,
};

use crate::error::StorageError;
use serde::Serialize;
use std::path::Path;

/// One row of a dataset summary
#[derive(Debug, Clone, Serialize)]
pub struct VariableSummary {
    pub path: String,
    pub dtype: String,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub fill_value: Option<String>,
    pub masked: usize,
}

/// Structure of a dataset file, for inspection
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub dimensions: Vec<(String, usize)>,
    pub groups: Vec<String>,
    pub variables: Vec<VariableSummary>,
}

impl DatasetSummary {
    pub fn of(dataset: &Dataset) -> Self {
        let variables = dataset
            .variables()
            .into_iter()
            .map(|(path, v)| VariableSummary {
                path,
                dtype: v.dtype().to_string(),
                dims: v.dims.clone(),
                shape: v.data.shape(),
                fill_value: v.fill_value.as_ref().map(|f| f.to_string()),
                masked: v
                    .fill_value
                    .as_ref()
                    .map(|f| v.data.count_fill(f))
                    .unwrap_or(0),
            })
            .collect();
        Self {
            dimensions: dataset
                .dimensions
                .iter()
                .map(|d| (d.name.clone(), d.len))
                .collect(),
            groups: dataset.group_paths(),
            variables,
        }
    }
}

/// Read a file and summarize it
pub fn inspect(path: &Path) -> Result<DatasetSummary, StorageError> {
    Ok(DatasetSummary::of(&read(path)?))
}
