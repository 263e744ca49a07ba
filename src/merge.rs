//! Structured multi-file merge
//!
//! Combines schema-identical dataset files along one growing dimension. The first
//! existing input is the structural template: its dimensions, groups, variables,
//! dtypes and attribute order are reproduced in the output. Variables whose leading
//! dimension is the growing one are concatenated across inputs; every other variable
//! is taken from the template alone.
//!
//! Elements equal to an input's fill value are rewritten to the template's fill value,
//! so masked entries stay masked in the output.

use crate::dataset::{self, ArrayData, Dataset, Group, Variable};
use crate::error::MergeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What to merge, and where to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSpec {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    /// Dimension whose size is summed across inputs. All other dimensions are fixed.
    pub growing_dimension: String,
    /// Expected fixed dimensions. When absent they are taken from the first input.
    #[serde(default)]
    pub fixed_dimensions: Option<Vec<String>>,
}

impl MergeSpec {
    pub fn new(
        inputs: Vec<PathBuf>,
        output: impl Into<PathBuf>,
        growing_dimension: impl Into<String>,
    ) -> Self {
        Self {
            inputs,
            output: output.into(),
            growing_dimension: growing_dimension.into(),
            fixed_dimensions: None,
        }
    }

    /// Require exactly these fixed dimensions (order does not matter)
    pub fn with_fixed_dimensions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fixed_dimensions = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn existing_inputs(&self) -> Vec<&PathBuf> {
        self.inputs.iter().filter(|p| p.exists()).collect()
    }
}

/// How the output came to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A single surviving input was moved to the output path
    Renamed { from: PathBuf },
    /// Several inputs were combined
    Merged {
        inputs: usize,
        growing_len: usize,
        fixed_dimensions: Vec<String>,
    },
}

/// Merge the existing inputs of `spec` into its output.
///
/// A single surviving input is moved without being read, so a declared fixed-dimension
/// set is only checked when inputs are actually combined.
pub fn merge(spec: &MergeSpec) -> Result<MergeOutcome, MergeError> {
    let existing = spec.existing_inputs();
    if existing.is_empty() {
        return Err(MergeError::NoInputs(spec.inputs.len()));
    }

    if let Some(parent) = spec.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(dataset_io)?;
    }

    if existing.len() == 1 {
        let from = existing[0].clone();
        info!(from = %from.display(), to = %spec.output.display(), "Single input, renaming");
        move_file(&from, &spec.output)?;
        return Ok(MergeOutcome::Renamed { from });
    }

    if spec.output.exists() {
        debug!(path = %spec.output.display(), "Removing existing merge output");
        fs::remove_file(&spec.output).map_err(dataset_io)?;
    }

    let inputs: Vec<(PathBuf, Dataset)> = existing
        .iter()
        .map(|p| Ok(((*p).clone(), dataset::read(p)?)))
        .collect::<Result<_, MergeError>>()?;

    let (template_path, template) = &inputs[0];
    for (path, other) in &inputs[1..] {
        check_schema(template_path, template, path, other, &spec.growing_dimension)?;
    }

    let datasets: Vec<&Dataset> = inputs.iter().map(|(_, d)| d).collect();
    let mut output = Dataset::new();
    let mut fixed_dimensions = Vec::new();
    let mut growing_len = 0;
    for dim in &template.dimensions {
        if dim.name == spec.growing_dimension {
            growing_len = datasets
                .iter()
                .map(|d| d.dimension(&dim.name).unwrap_or(0))
                .sum();
            output.set_dimension(dim.name.clone(), growing_len);
        } else {
            fixed_dimensions.push(dim.name.clone());
            output.set_dimension(dim.name.clone(), dim.len);
        }
    }

    if let Some(declared) = &spec.fixed_dimensions {
        let mut expected = declared.clone();
        expected.sort();
        expected.dedup();
        let mut found = fixed_dimensions.clone();
        found.sort();
        if expected != found {
            return Err(MergeError::FixedDimensions {
                path: template_path.clone(),
                expected,
                found,
            });
        }
    }

    output.root = merge_group(&template.root, "", &datasets, &spec.growing_dimension)
        .map_err(|m| MergeError::SchemaMismatch {
            template: template_path.clone(),
            other: inputs[m.input].0.clone(),
            detail: m.detail,
        })?;

    dataset::write(&spec.output, &output)?;
    info!(
        inputs = inputs.len(),
        output = %spec.output.display(),
        dimension = %spec.growing_dimension,
        size = growing_len,
        "Merged files"
    );

    Ok(MergeOutcome::Merged {
        inputs: inputs.len(),
        growing_len,
        fixed_dimensions,
    })
}

fn dataset_io(e: std::io::Error) -> MergeError {
    MergeError::Storage(e.into())
}

fn move_file(from: &Path, to: &Path) -> Result<(), MergeError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Rename fails across filesystems; fall back to copy + remove.
    fs::copy(from, to).map_err(dataset_io)?;
    fs::remove_file(from).map_err(dataset_io)?;
    Ok(())
}

fn check_schema(
    template_path: &Path,
    template: &Dataset,
    other_path: &Path,
    other: &Dataset,
    growing: &str,
) -> Result<(), MergeError> {
    let mismatch = |detail: String| MergeError::SchemaMismatch {
        template: template_path.to_path_buf(),
        other: other_path.to_path_buf(),
        detail,
    };

    if template.dimension(growing).is_none() {
        return Err(mismatch(format!("growing dimension '{}' is not declared", growing)));
    }

    let names = |d: &Dataset| d.dimensions.iter().map(|x| x.name.clone()).collect::<Vec<_>>();
    if names(template) != names(other) {
        return Err(mismatch(format!(
            "dimensions {:?} vs {:?}",
            names(template),
            names(other)
        )));
    }
    for dim in template.dimensions.iter().filter(|d| d.name != growing) {
        let theirs = other.dimension(&dim.name).unwrap_or(0);
        if theirs != dim.len {
            return Err(mismatch(format!(
                "fixed dimension '{}' has size {} vs {}",
                dim.name, dim.len, theirs
            )));
        }
    }

    if template.group_paths() != other.group_paths() {
        return Err(mismatch(format!(
            "groups {:?} vs {:?}",
            template.group_paths(),
            other.group_paths()
        )));
    }

    let ours = template.variables();
    let theirs = other.variables();
    let paths = |vars: &[(String, &Variable)]| vars.iter().map(|(p, _)| p.clone()).collect::<Vec<_>>();
    if paths(&ours) != paths(&theirs) {
        return Err(mismatch(format!(
            "variables {:?} vs {:?}",
            paths(&ours),
            paths(&theirs)
        )));
    }
    for ((path, a), (_, b)) in ours.iter().zip(theirs.iter()) {
        if a.dtype() != b.dtype() {
            return Err(mismatch(format!(
                "variable '{}' is {} vs {}",
                path,
                a.dtype(),
                b.dtype()
            )));
        }
        if a.dims != b.dims {
            return Err(mismatch(format!(
                "variable '{}' has dimensions {:?} vs {:?}",
                path, a.dims, b.dims
            )));
        }
    }
    Ok(())
}

/// Input that could not be combined, by position
#[derive(Debug)]
struct InputMismatch {
    input: usize,
    detail: String,
}

fn merge_group(
    template: &Group,
    prefix: &str,
    inputs: &[&Dataset],
    growing: &str,
) -> Result<Group, InputMismatch> {
    let mut out = Group::new(template.name.clone());
    out.attributes = template.attributes.clone();

    for variable in &template.variables {
        let path = if prefix.is_empty() {
            variable.name.clone()
        } else {
            format!("{}/{}", prefix, variable.name)
        };
        out.variables.push(merge_variable(variable, &path, inputs, growing)?);
    }

    for child in &template.groups {
        let child_prefix = if prefix.is_empty() {
            child.name.clone()
        } else {
            format!("{}/{}", prefix, child.name)
        };
        out.groups.push(merge_group(child, &child_prefix, inputs, growing)?);
    }
    Ok(out)
}

fn merge_variable(
    template: &Variable,
    path: &str,
    inputs: &[&Dataset],
    growing: &str,
) -> Result<Variable, InputMismatch> {
    let mut merged = Variable {
        name: template.name.clone(),
        dims: template.dims.clone(),
        data: template.data.clone(),
        attributes: template.attributes.clone(),
        fill_value: template.fill_value.clone(),
    };

    if template.dims.first().map(String::as_str) != Some(growing) {
        return Ok(merged);
    }

    let template_shape = template.data.shape();
    let mut parts: Vec<ArrayData> = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let mismatch = |detail: String| InputMismatch {
            input: index,
            detail,
        };
        let variable = input
            .variable(path)
            .ok_or_else(|| mismatch(format!("variable '{}' is missing", path)))?;
        if variable.data.dtype() != template.data.dtype() {
            return Err(mismatch(format!(
                "variable '{}' is {} vs {}",
                path,
                variable.data.dtype(),
                template.data.dtype()
            )));
        }
        let shape = variable.data.shape();
        if shape.len() != template_shape.len() || shape[1..] != template_shape[1..] {
            return Err(mismatch(format!(
                "variable '{}' has shape {:?} vs {:?}",
                path, shape, template_shape
            )));
        }
        let mut data = variable.data.clone();
        if let (Some(from), Some(to)) = (&variable.fill_value, &template.fill_value) {
            if !from.same_as(to) {
                data.replace_fill(from, to);
            }
        }
        parts.push(data);
    }
    let refs: Vec<&ArrayData> = parts.iter().collect();
    merged.data = ArrayData::concatenate(&refs).map_err(|e| InputMismatch {
        input: inputs.len() - 1,
        detail: format!("variable '{}': {}", path, e),
    })?;
    Ok(merged)
}
