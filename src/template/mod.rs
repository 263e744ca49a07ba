//! Configuration template rendering
//!
//! A template store serves raw YAML templates by [`TemplateId`]. The [`Renderer`]
//! substitutes context values into them and expands delegate leaves by rendering the
//! templates they name, producing a fully resolved [`Node`] tree that serializes to
//! block-style YAML.

pub mod context;
pub mod document;
pub mod expr;
pub mod placeholder;
pub mod render;
pub mod store;

pub use context::{ContextValue, TemplateContext};
pub use document::{Delegate, Leaf, Mapping, Node, Scalar};
pub use render::{Renderer, MAX_DEPTH};
pub use store::{DirectoryTemplateStore, MemoryTemplateStore, TemplateId, TemplateStore};
