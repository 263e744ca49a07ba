//! Recursive template rendering
//!
//! Rendering runs in two steps. [`Renderer::load`] parses the template text into a
//! [`Node`] tree with delegates classified and `{{ key }}` placeholders kept verbatim in
//! string leaves and keys. [`Renderer::resolve`] then rebuilds the tree depth-first,
//! replacing every delegate with the fully rendered tree of the template it names (same
//! context) and substituting placeholders. Context values never pass through the YAML
//! parser. Trees are never edited in place during the walk.

use super::context::{ContextValue, TemplateContext};
use super::document::{Delegate, Leaf, Mapping, Node, Scalar};
use super::placeholder::{self, Segment};
use super::store::{TemplateId, TemplateStore};
use crate::error::RenderError;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Maximum delegate nesting depth
pub const MAX_DEPTH: usize = 32;

const OBSERVATIONS_KEY: &str = "observations";
const DOCUMENT: &str = "<document>";

/// Renders templates from a store against a context
#[derive(Clone)]
pub struct Renderer {
    store: Arc<dyn TemplateStore>,
}

impl Renderer {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    pub fn from_store<S: TemplateStore + 'static>(store: S) -> Self {
        Self::new(Arc::new(store))
    }

    pub fn store(&self) -> &dyn TemplateStore {
        self.store.as_ref()
    }

    /// Parse a template, leaving delegates and placeholders in place
    pub fn load(&self, id: &TemplateId) -> Result<Node, RenderError> {
        let name = id.to_string();
        let raw = self.store.load(id)?;
        let parse_error = |message: String| RenderError::TemplateParse {
            template: name.clone(),
            message,
        };
        let (masked, keys) = placeholder::mask(&raw).map_err(parse_error)?;
        let value: serde_yaml::Value =
            serde_yaml::from_str(&masked).map_err(|e| parse_error(e.to_string()))?;
        let node = Node::from_yaml(value).map_err(parse_error)?;
        Ok(unmask_node(node, &keys))
    }

    /// Fully render a template: load it, then resolve every delegate recursively
    #[instrument(skip(self, context), fields(template = %id))]
    pub fn render(&self, id: &TemplateId, context: &TemplateContext) -> Result<Node, RenderError> {
        self.render_at(id, context, 0)
    }

    /// Resolve a document. Idempotent on fully rendered documents.
    pub fn resolve(&self, document: &Node, context: &TemplateContext) -> Result<Node, RenderError> {
        self.resolve_at(document, context, DOCUMENT, 0)
    }

    pub fn render_interface_meta(&self, context: &TemplateContext) -> Result<Node, RenderError> {
        self.render(&TemplateId::InterfaceMeta, context)
    }

    pub fn render_observation(
        &self,
        observation: &str,
        context: &TemplateContext,
    ) -> Result<Node, RenderError> {
        self.render(&TemplateId::Observation(observation.to_string()), context)
    }

    fn render_at(
        &self,
        id: &TemplateId,
        context: &TemplateContext,
        depth: usize,
    ) -> Result<Node, RenderError> {
        if depth > MAX_DEPTH {
            return Err(RenderError::TemplateRecursion {
                template: id.to_string(),
                depth,
            });
        }
        debug!(template = %id, depth, "Rendering template");
        let loaded = self.load(id)?;
        self.resolve_at(&loaded, context, &id.to_string(), depth)
    }

    fn resolve_at(
        &self,
        node: &Node,
        context: &TemplateContext,
        template: &str,
        depth: usize,
    ) -> Result<Node, RenderError> {
        match node {
            Node::Leaf(Leaf::Delegate(Delegate::Model(name))) => {
                self.render_at(&TemplateId::Model(name.clone()), context, depth + 1)
            }
            Node::Leaf(Leaf::Delegate(Delegate::Observations)) => {
                let names = observation_names(context, template)?;
                let observers = names
                    .iter()
                    .map(|name| {
                        self.render_at(&TemplateId::Observation(name.clone()), context, depth + 1)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::Seq(observers))
            }
            Node::Leaf(Leaf::Literal(Scalar::Str(text)))
                if placeholder::contains_placeholder(text) =>
            {
                substitute_leaf(template, text, context)
            }
            Node::Leaf(leaf) => Ok(Node::Leaf(leaf.clone())),
            Node::Seq(items) => Ok(Node::Seq(
                items
                    .iter()
                    .map(|item| self.resolve_at(item, context, template, depth))
                    .collect::<Result<_, _>>()?,
            )),
            Node::Map(mapping) => {
                let mut out = Mapping::new();
                for (key, value) in mapping.iter() {
                    let key = if placeholder::contains_placeholder(key) {
                        substitute_text(template, key, context)?
                    } else {
                        key.clone()
                    };
                    out.insert(key, self.resolve_at(value, context, template, depth)?);
                }
                Ok(Node::Map(out))
            }
        }
    }
}

fn observation_names(context: &TemplateContext, template: &str) -> Result<Vec<String>, RenderError> {
    let value = context
        .get(OBSERVATIONS_KEY)
        .ok_or_else(|| RenderError::UnresolvedKey {
            template: template.to_string(),
            key: OBSERVATIONS_KEY.to_string(),
        })?;
    let invalid = || RenderError::TemplateParse {
        template: template.to_string(),
        message: format!("'{}' must be a list of names", OBSERVATIONS_KEY),
    };
    value
        .as_list()
        .ok_or_else(invalid)?
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

/// Restore the placeholders masked out for parsing
fn unmask_node(node: Node, keys: &[String]) -> Node {
    if keys.is_empty() {
        return node;
    }
    match node {
        Node::Leaf(Leaf::Literal(Scalar::Str(text))) => Node::str(placeholder::unmask(&text, keys)),
        Node::Leaf(leaf) => Node::Leaf(leaf),
        Node::Seq(items) => Node::Seq(items.into_iter().map(|i| unmask_node(i, keys)).collect()),
        Node::Map(mapping) => Node::Map(
            mapping
                .iter()
                .map(|(k, v)| (placeholder::unmask(k, keys), unmask_node(v.clone(), keys)))
                .collect(),
        ),
    }
}

/// Substitute scalars into text. Lists and maps only substitute as a whole leaf.
fn substitute_text(
    template: &str,
    text: &str,
    context: &TemplateContext,
) -> Result<String, RenderError> {
    let segments = placeholder::segments(text).map_err(|message| RenderError::TemplateParse {
        template: template.to_string(),
        message,
    })?;
    let mut out = String::with_capacity(text.len());
    for segment in segments {
        match segment {
            Segment::Text(t) => out.push_str(t),
            Segment::Key(key) => {
                let value = lookup(template, key, context)?;
                if !value.is_scalar() {
                    return Err(RenderError::NonScalarInterpolation {
                        template: template.to_string(),
                        key: key.to_string(),
                    });
                }
                out.push_str(&value.to_text());
            }
        }
    }
    Ok(out)
}

/// A leaf that is exactly one placeholder takes the context value structurally
fn substitute_leaf(
    template: &str,
    text: &str,
    context: &TemplateContext,
) -> Result<Node, RenderError> {
    match placeholder::sole_key(text) {
        Some(key) => Ok(value_node(lookup(template, key, context)?)),
        None => Ok(Node::str(substitute_text(template, text, context)?)),
    }
}

fn lookup<'c>(
    template: &str,
    key: &str,
    context: &'c TemplateContext,
) -> Result<&'c ContextValue, RenderError> {
    context.get(key).ok_or_else(|| RenderError::UnresolvedKey {
        template: template.to_string(),
        key: key.to_string(),
    })
}

fn value_node(value: &ContextValue) -> Node {
    match value {
        ContextValue::Bool(b) => Node::bool(*b),
        ContextValue::Int(i) => Node::int(*i),
        ContextValue::Float(f) => Node::Leaf(Leaf::Literal(Scalar::Float(*f))),
        ContextValue::Str(s) => Node::str(s.clone()),
        ContextValue::List(items) => Node::Seq(items.iter().map(value_node).collect()),
        ContextValue::Map(map) => Node::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), value_node(v)))
                .collect(),
        ),
    }
}
