//! In-memory dataset model: dimensions, nested groups, typed variables, attributes.

use crate::error::StorageError;
use ndarray::{ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    I32,
    I64,
    F32,
    F64,
    Str,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::Str => "string",
        };
        write!(f, "{}", name)
    }
}

/// Typed n-dimensional variable data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    Str(ArrayD<String>),
}

macro_rules! dispatch {
    ($data:expr, $a:ident => $body:expr) => {
        match $data {
            ArrayData::I32($a) => $body,
            ArrayData::I64($a) => $body,
            ArrayData::F32($a) => $body,
            ArrayData::F64($a) => $body,
            ArrayData::Str($a) => $body,
        }
    };
}

macro_rules! concat_as {
    ($variant:ident, $parts:expr, $dtype:expr) => {{
        let views = $parts
            .iter()
            .map(|p| match p {
                ArrayData::$variant(a) => Ok(a.view()),
                other => Err(format!("dtype {} does not match {}", other.dtype(), $dtype)),
            })
            .collect::<Result<Vec<_>, String>>()?;
        let joined = ndarray::concatenate(Axis(0), &views).map_err(|e| e.to_string())?;
        Ok(ArrayData::$variant(joined))
    }};
}

impl ArrayData {
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::I32(_) => DType::I32,
            ArrayData::I64(_) => DType::I64,
            ArrayData::F32(_) => DType::F32,
            ArrayData::F64(_) => DType::F64,
            ArrayData::Str(_) => DType::Str,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        dispatch!(self, a => a.shape().to_vec())
    }

    pub fn ndim(&self) -> usize {
        dispatch!(self, a => a.ndim())
    }

    pub fn len(&self) -> usize {
        dispatch!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Join arrays along their leading axis. All parts must share dtype and trailing shape.
    pub fn concatenate(parts: &[&ArrayData]) -> Result<ArrayData, String> {
        let first = parts.first().ok_or_else(|| "nothing to concatenate".to_string())?;
        let dtype = first.dtype();
        match first {
            ArrayData::I32(_) => concat_as!(I32, parts, dtype),
            ArrayData::I64(_) => concat_as!(I64, parts, dtype),
            ArrayData::F32(_) => concat_as!(F32, parts, dtype),
            ArrayData::F64(_) => concat_as!(F64, parts, dtype),
            ArrayData::Str(_) => concat_as!(Str, parts, dtype),
        }
    }

    /// Rewrite every element equal to `from` (NaN matches NaN) as `to`
    pub fn replace_fill(&mut self, from: &FillValue, to: &FillValue) {
        match (self, from, to) {
            (ArrayData::I32(a), FillValue::I32(f), FillValue::I32(t)) => {
                a.mapv_inplace(|x| if x == *f { *t } else { x })
            }
            (ArrayData::I64(a), FillValue::I64(f), FillValue::I64(t)) => {
                a.mapv_inplace(|x| if x == *f { *t } else { x })
            }
            (ArrayData::F32(a), FillValue::F32(f), FillValue::F32(t)) => {
                a.mapv_inplace(|x| if same_f32(x, *f) { *t } else { x })
            }
            (ArrayData::F64(a), FillValue::F64(f), FillValue::F64(t)) => {
                a.mapv_inplace(|x| if same_f64(x, *f) { *t } else { x })
            }
            (ArrayData::Str(a), FillValue::Str(f), FillValue::Str(t)) => a.map_inplace(|x| {
                if *x == *f {
                    *x = t.clone();
                }
            }),
            _ => {}
        }
    }

    /// Count of elements equal to `fill`
    pub fn count_fill(&self, fill: &FillValue) -> usize {
        match (self, fill) {
            (ArrayData::I32(a), FillValue::I32(f)) => a.iter().filter(|x| *x == f).count(),
            (ArrayData::I64(a), FillValue::I64(f)) => a.iter().filter(|x| *x == f).count(),
            (ArrayData::F32(a), FillValue::F32(f)) => {
                a.iter().filter(|x| same_f32(**x, *f)).count()
            }
            (ArrayData::F64(a), FillValue::F64(f)) => {
                a.iter().filter(|x| same_f64(**x, *f)).count()
            }
            (ArrayData::Str(a), FillValue::Str(f)) => a.iter().filter(|x| *x == f).count(),
            _ => 0,
        }
    }

    pub fn zeros(dtype: DType, shape: &[usize]) -> ArrayData {
        let shape = IxDyn(shape);
        match dtype {
            DType::I32 => ArrayData::I32(ArrayD::zeros(shape)),
            DType::I64 => ArrayData::I64(ArrayD::zeros(shape)),
            DType::F32 => ArrayData::F32(ArrayD::zeros(shape)),
            DType::F64 => ArrayData::F64(ArrayD::zeros(shape)),
            DType::Str => ArrayData::Str(ArrayD::from_elem(shape, String::new())),
        }
    }
}

fn same_f32(a: f32, b: f32) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn same_f64(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Creation-time fill value of a variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
}

impl FillValue {
    pub fn dtype(&self) -> DType {
        match self {
            FillValue::I32(_) => DType::I32,
            FillValue::I64(_) => DType::I64,
            FillValue::F32(_) => DType::F32,
            FillValue::F64(_) => DType::F64,
            FillValue::Str(_) => DType::Str,
        }
    }

    /// Equality where a NaN fill equals a NaN fill
    pub fn same_as(&self, other: &FillValue) -> bool {
        match (self, other) {
            (FillValue::F32(a), FillValue::F32(b)) => same_f32(*a, *b),
            (FillValue::F64(a), FillValue::F64(b)) => same_f64(*a, *b),
            _ => self == other,
        }
    }
}

impl fmt::Display for FillValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillValue::I32(v) => write!(f, "{}", v),
            FillValue::I64(v) => write!(f, "{}", v),
            FillValue::F32(v) => write!(f, "{}", v),
            FillValue::F64(v) => write!(f, "{}", v),
            FillValue::Str(v) => write!(f, "{:?}", v),
        }
    }
}

/// Attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Str(v) => write!(f, "{}", v),
            AttrValue::IntList(v) => write!(f, "{:?}", v),
            AttrValue::FloatList(v) => write!(f, "{:?}", v),
        }
    }
}

/// Ordered attribute list. Names are unique.
pub type Attributes = Vec<(String, AttrValue)>;

fn set_attribute(attributes: &mut Attributes, name: impl Into<String>, value: AttrValue) {
    let name = name.into();
    match attributes.iter_mut().find(|(n, _)| *n == name) {
        Some(slot) => slot.1 = value,
        None => attributes.push((name, value)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<String>,
    pub data: ArrayData,
    pub attributes: Attributes,
    pub fill_value: Option<FillValue>,
}

impl Variable {
    pub fn new(name: impl Into<String>, dims: &[&str], data: ArrayData) -> Self {
        Self {
            name: name.into(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            data,
            attributes: Vec::new(),
            fill_value: None,
        }
    }

    pub fn with_fill(mut self, fill: FillValue) -> Self {
        self.fill_value = Some(fill);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        set_attribute(&mut self.attributes, name, value);
        self
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub attributes: Attributes,
    pub variables: Vec<Variable>,
    pub groups: Vec<Group>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.add_variable(variable);
        self
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    pub fn add_variable(&mut self, variable: Variable) {
        match self.variables.iter_mut().find(|v| v.name == variable.name) {
            Some(slot) => *slot = variable,
            None => self.variables.push(variable),
        }
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: AttrValue) {
        set_attribute(&mut self.attributes, name, value);
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Every variable below this group as `(path, variable)`, depth-first
    pub fn walk_variables<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Variable)>) {
        for v in &self.variables {
            out.push((join_path(prefix, &v.name), v));
        }
        for g in &self.groups {
            g.walk_variables(&join_path(prefix, &g.name), out);
        }
    }

    /// Every group path below this group, depth-first
    pub fn walk_groups(&self, prefix: &str, out: &mut Vec<String>) {
        for g in &self.groups {
            let path = join_path(prefix, &g.name);
            out.push(path.clone());
            g.walk_groups(&path, out);
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// A complete dataset: root dimensions plus the root group
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub dimensions: Vec<Dimension>,
    pub root: Group,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(mut self, name: impl Into<String>, len: usize) -> Self {
        self.set_dimension(name, len);
        self
    }

    pub fn with_root(mut self, root: Group) -> Self {
        self.root = root;
        self
    }

    pub fn set_dimension(&mut self, name: impl Into<String>, len: usize) {
        let name = name.into();
        match self.dimensions.iter_mut().find(|d| d.name == name) {
            Some(dim) => dim.len = len,
            None => self.dimensions.push(Dimension { name, len }),
        }
    }

    pub fn dimension(&self, name: &str) -> Option<usize> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.len)
    }

    /// Variables by slash-separated path (`MetaData/latitude`)
    pub fn variables(&self) -> Vec<(String, &Variable)> {
        let mut out = Vec::new();
        self.root.walk_variables("", &mut out);
        out
    }

    pub fn variable(&self, path: &str) -> Option<&Variable> {
        let mut parts: Vec<&str> = path.split('/').collect();
        let name = parts.pop()?;
        let mut group = &self.root;
        for part in parts {
            group = group.group(part)?;
        }
        group.variable(name)
    }

    pub fn group_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.walk_groups("", &mut out);
        out
    }

    /// Check every variable against the declared dimensions and its own fill value
    pub fn validate(&self) -> Result<(), StorageError> {
        let mut seen = std::collections::HashSet::new();
        for dim in &self.dimensions {
            if !seen.insert(dim.name.as_str()) {
                return Err(StorageError::InvalidStructure(format!(
                    "dimension '{}' declared twice",
                    dim.name
                )));
            }
        }

        for (path, variable) in self.variables() {
            let expected: Vec<usize> = variable
                .dims
                .iter()
                .map(|d| {
                    self.dimension(d).ok_or_else(|| {
                        StorageError::InvalidStructure(format!(
                            "variable '{}' uses undeclared dimension '{}'",
                            path, d
                        ))
                    })
                })
                .collect::<Result<_, _>>()?;
            let actual = variable.data.shape();
            if expected != actual {
                return Err(StorageError::InvalidStructure(format!(
                    "variable '{}' has shape {:?} but its dimensions {:?} give {:?}",
                    path, actual, variable.dims, expected
                )));
            }
            if let Some(fill) = &variable.fill_value {
                if fill.dtype() != variable.dtype() {
                    return Err(StorageError::InvalidStructure(format!(
                        "variable '{}' is {} but its fill value is {}",
                        path,
                        variable.dtype(),
                        fill.dtype()
                    )));
                }
            }
        }
        Ok(())
    }
}
