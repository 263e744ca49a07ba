//! Render context: the key → value table templates are rendered against.

use crate::error::RenderError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A context value: scalar, list or nested mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ContextValue>),
    Map(BTreeMap<String, ContextValue>),
}

impl ContextValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ContextValue::Bool(_) => "boolean",
            ContextValue::Int(_) => "integer",
            ContextValue::Float(_) => "float",
            ContextValue::Str(_) => "string",
            ContextValue::List(_) => "list",
            ContextValue::Map(_) => "mapping",
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, ContextValue::List(_) | ContextValue::Map(_))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ContextValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ContextValue]> {
        match self {
            ContextValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Integers and floats may replace one another; any other kind change is a conflict.
    fn compatible_with(&self, other: &ContextValue) -> bool {
        let numeric = |v: &ContextValue| matches!(v, ContextValue::Int(_) | ContextValue::Float(_));
        std::mem::discriminant(self) == std::mem::discriminant(other)
            || (numeric(self) && numeric(other))
    }

    /// Text used when the value is embedded in a longer string
    pub fn to_text(&self) -> String {
        match self {
            ContextValue::Bool(b) => b.to_string(),
            ContextValue::Int(i) => i.to_string(),
            ContextValue::Float(f) => format_float(*f),
            ContextValue::Str(s) => s.clone(),
            ContextValue::List(_) | ContextValue::Map(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<bool> for ContextValue {
    fn from(v: bool) -> Self {
        ContextValue::Bool(v)
    }
}

impl From<i64> for ContextValue {
    fn from(v: i64) -> Self {
        ContextValue::Int(v)
    }
}

impl From<i32> for ContextValue {
    fn from(v: i32) -> Self {
        ContextValue::Int(v as i64)
    }
}

impl From<usize> for ContextValue {
    fn from(v: usize) -> Self {
        ContextValue::Int(v as i64)
    }
}

impl From<f64> for ContextValue {
    fn from(v: f64) -> Self {
        ContextValue::Float(v)
    }
}

impl From<String> for ContextValue {
    fn from(v: String) -> Self {
        ContextValue::Str(v)
    }
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        ContextValue::Str(v.to_string())
    }
}

impl<T: Into<ContextValue>> From<Vec<T>> for ContextValue {
    fn from(v: Vec<T>) -> Self {
        ContextValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// Key → value table. Insertion order is irrelevant; lookups are by key only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateContext {
    values: BTreeMap<String, ContextValue>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a key. Replacing with a value of a different kind is rejected.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ContextValue>,
    ) -> Result<(), RenderError> {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.values.get(&key) {
            if !existing.compatible_with(&value) {
                return Err(RenderError::ConflictingKey {
                    key,
                    existing: existing.kind(),
                    incoming: value.kind(),
                });
            }
        }
        self.values.insert(key, value);
        Ok(())
    }

    /// Add a key only when a value is present. Absent values stay unresolvable.
    pub fn insert_optional<V: Into<ContextValue>>(
        &mut self,
        key: impl Into<String>,
        value: Option<V>,
    ) -> Result<(), RenderError> {
        match value {
            Some(v) => self.insert(key, v),
            None => Ok(()),
        }
    }

    /// Merge every entry of `other` into this context
    pub fn extend<I>(&mut self, entries: I) -> Result<(), RenderError>
    where
        I: IntoIterator<Item = (String, ContextValue)>,
    {
        for (key, value) in entries {
            self.insert(key, value)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(ContextValue::as_int)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.values.iter()
    }
}
