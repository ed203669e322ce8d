//! The document surface the engine rewrites.
//!
//! The engine never serializes and reparses the content root. It walks text
//! nodes and swaps each one that holds markers for a run of new nodes, so
//! unrelated nodes keep their identity, listeners and focus.
//!
//! A marker must sit inside a single text node to be found. The engine
//! normalizes the root first, so markers split across adjacent text siblings
//! are joined, but a marker whose payload contains elements (for example
//! `MATHSTARTINLINE\(x<sup>2</sup>\)MATHENDINLINE`) is not converted.

use crate::error::HostError;
use crate::monitor::{MutationCallback, MutationSubscription};

/// Elements whose text is never scanned: raw text (`script`, `style`) and
/// escapable raw text (`textarea`, `title`), which cannot hold child elements.
pub const SKIPPED_TEXT_PARENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Node to materialize in place of a text node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSpec {
    /// Text node with the given data.
    Text(String),
    /// Element with attributes and a single text child.
    Element {
        /// Tag name.
        tag: &'static str,
        /// Attributes in output order.
        attributes: Vec<(&'static str, String)>,
        /// Text content.
        text: String,
    },
}

/// Live content root plus the hooks the engine needs around it.
pub trait ContentRoot {
    /// Host node handle.
    type Node: Clone;
    /// Handle returned by [`ContentRoot::observe`].
    type Subscription: MutationSubscription;

    /// Run `callback` once the document is parsed: later if parsing is
    /// still in progress, right away otherwise.
    fn on_ready(&self, callback: Box<dyn FnOnce()>);

    /// Merge adjacent text nodes and drop empty ones under the root.
    fn normalize(&self);

    /// Text nodes under the root in document order, skipping the contents of
    /// [`SKIPPED_TEXT_PARENTS`].
    fn text_nodes(&self) -> Vec<Self::Node>;

    /// Data of a text node.
    fn text(&self, node: &Self::Node) -> String;

    /// Replace `node` with `replacement`, in order. On error the document
    /// must be left as it was.
    fn replace_text(&self, node: &Self::Node, replacement: &[NodeSpec]) -> Result<(), HostError>;

    /// Elements under the root carrying `class`, in document order.
    fn elements_with_class(&self, class: &str) -> Vec<Self::Node>;

    /// Add or remove `class` on the root element.
    fn set_class(&self, class: &str, enabled: bool) -> Result<(), HostError>;

    /// Subscribe `callback` to subtree insertions under the root.
    fn observe(&self, callback: MutationCallback) -> Result<Self::Subscription, HostError>;
}
