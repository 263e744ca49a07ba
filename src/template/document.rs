//! Rendered document tree
//!
//! Templates parse into a [`Node`] tree whose leaves are either literal scalars or
//! delegates. A delegate marks a spot that is filled by rendering another template:
//! `TASKFILL<name>` delegates to the model template `<name>`, `SPECIALobservations`
//! expands into one rendered observation template per configured observation.
//! Sentinel strings are classified once, at load time; nothing downstream inspects
//! raw strings for markers.
//!
//! Mappings keep insertion order so output follows the template's key order.

use crate::error::RenderError;
use serde_yaml::{Mapping as YamlMapping, Number, Value};
use std::fmt;

const MODEL_SENTINEL: &str = "TASKFILL";
const OBSERVATIONS_SENTINEL: &str = "SPECIALobservations";

/// Literal scalar value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Str(s) => write!(f, "{}", s),
        }
    }
}

/// A spot filled by rendering another template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delegate {
    /// Model template of the active interface
    Model(String),
    /// One observation template per entry of the `observations` context list
    Observations,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    Literal(Scalar),
    Delegate(Delegate),
}

/// Ordered string-keyed mapping
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    entries: Vec<(String, Node)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replace in place when the key exists, append otherwise
    pub fn insert(&mut self, key: impl Into<String>, value: Node) -> Option<Node> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Node)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        let mut mapping = Mapping::new();
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

/// Document tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf(Leaf),
    Seq(Vec<Node>),
    Map(Mapping),
}

impl Node {
    pub fn null() -> Self {
        Node::Leaf(Leaf::Literal(Scalar::Null))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Node::Leaf(Leaf::Literal(Scalar::Str(value.into())))
    }

    pub fn int(value: i64) -> Self {
        Node::Leaf(Leaf::Literal(Scalar::Int(value)))
    }

    pub fn bool(value: bool) -> Self {
        Node::Leaf(Leaf::Literal(Scalar::Bool(value)))
    }

    pub fn float(value: f64) -> Self {
        Node::Leaf(Leaf::Literal(Scalar::Float(value)))
    }

    /// Mapping node from ordered entries
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Node)>) -> Self {
        Node::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn delegate(delegate: Delegate) -> Self {
        Node::Leaf(Leaf::Delegate(delegate))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Leaf(Leaf::Literal(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.as_scalar() {
            Some(Scalar::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.as_scalar() {
            Some(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Node]> {
        match self {
            Node::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_seq_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Walk nested mappings by key
    pub fn get_path(&self, path: &[&str]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, key| node.as_map().and_then(|m| m.get(key)))
    }

    pub fn get_path_mut(&mut self, path: &[&str]) -> Option<&mut Node> {
        let mut node = self;
        for key in path {
            node = node.as_map_mut()?.get_mut(key)?;
        }
        Some(node)
    }

    /// Number of delegates left anywhere in the tree
    pub fn delegate_count(&self) -> usize {
        match self {
            Node::Leaf(Leaf::Delegate(_)) => 1,
            Node::Leaf(Leaf::Literal(_)) => 0,
            Node::Seq(items) => items.iter().map(Node::delegate_count).sum(),
            Node::Map(m) => m.iter().map(|(_, v)| v.delegate_count()).sum(),
        }
    }

    /// Build a tree from parsed YAML, classifying sentinel strings
    pub fn from_yaml(value: Value) -> Result<Node, String> {
        Ok(match value {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::bool(b),
            Value::Number(n) => Node::Leaf(Leaf::Literal(number_scalar(&n)?)),
            Value::String(s) => Node::Leaf(classify(s)?),
            Value::Sequence(items) => Node::Seq(
                items
                    .into_iter()
                    .map(Node::from_yaml)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Mapping(map) => {
                let mut out = Mapping::new();
                for (k, v) in map {
                    out.insert(key_text(k)?, Node::from_yaml(v)?);
                }
                Node::Map(out)
            }
            Value::Tagged(tagged) => {
                return Err(format!("unsupported YAML tag {}", tagged.tag));
            }
        })
    }

    /// Convert back to YAML. Fails on any remaining delegate.
    pub fn to_yaml(&self) -> Result<Value, RenderError> {
        self.to_yaml_at("")
    }

    fn to_yaml_at(&self, path: &str) -> Result<Value, RenderError> {
        Ok(match self {
            Node::Leaf(Leaf::Delegate(_)) => {
                let at = if path.is_empty() { "/" } else { path };
                return Err(RenderError::Unrendered(at.to_string()));
            }
            Node::Leaf(Leaf::Literal(scalar)) => match scalar {
                Scalar::Null => Value::Null,
                Scalar::Bool(b) => Value::Bool(*b),
                Scalar::Int(i) => Value::Number(Number::from(*i)),
                Scalar::Float(x) => Value::Number(Number::from(*x)),
                Scalar::Str(s) => Value::String(s.clone()),
            },
            Node::Seq(items) => Value::Sequence(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| item.to_yaml_at(&format!("{}/{}", path, i)))
                    .collect::<Result<_, _>>()?,
            ),
            Node::Map(m) => {
                let mut out = YamlMapping::new();
                for (k, v) in m.iter() {
                    out.insert(
                        Value::String(k.clone()),
                        v.to_yaml_at(&format!("{}/{}", path, k))?,
                    );
                }
                Value::Mapping(out)
            }
        })
    }

    /// Block-style YAML text
    pub fn to_yaml_string(&self) -> Result<String, RenderError> {
        let value = self.to_yaml()?;
        serde_yaml::to_string(&value).map_err(|e| RenderError::Serialize(e.to_string()))
    }
}

fn number_scalar(n: &Number) -> Result<Scalar, String> {
    if let Some(i) = n.as_i64() {
        Ok(Scalar::Int(i))
    } else if let Some(x) = n.as_f64() {
        Ok(Scalar::Float(x))
    } else {
        Err(format!("number {} is out of range", n))
    }
}

fn key_text(key: Value) -> Result<String, String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(format!("mapping keys must be scalars, got {:?}", other)),
    }
}

fn classify(s: String) -> Result<Leaf, String> {
    if s.trim() == OBSERVATIONS_SENTINEL {
        return Ok(Leaf::Delegate(Delegate::Observations));
    }
    if s.contains(MODEL_SENTINEL) {
        let name = s.replace(MODEL_SENTINEL, "").trim().to_string();
        if name.is_empty() {
            return Err(format!("'{}' names no model template", s));
        }
        return Ok(Leaf::Delegate(Delegate::Model(name)));
    }
    Ok(Leaf::Literal(Scalar::Str(s)))
}
