//! In-memory document used as the native content root.
//!
//! Nodes live in an arena owned by the document and are addressed by
//! [`NodeId`]. Insertions under `body` are queued per observer and handed out
//! by [`Document::deliver_mutations`], which plays the part of the browser's
//! microtask checkpoint.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::error::HostError;
use crate::host::{ContentRoot, NodeSpec, SKIPPED_TEXT_PARENTS};
use crate::monitor::{InsertedKind, InsertedNode, MutationCallback, MutationSubscription};
use crate::style::StyleSink;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Handle to a node of one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Parsing state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Still being parsed; ready callbacks are queued.
    Loading,
    /// Fully parsed.
    Complete,
}

#[derive(Debug)]
enum NodeData {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<NodeId>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct Slot {
    parent: Option<NodeId>,
    data: NodeData,
}

#[derive(Debug, Default)]
struct Tree {
    slots: Vec<Slot>,
}

impl Tree {
    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot { parent: None, data });
        id
    }

    fn contains(&self, id: NodeId) -> bool {
        id.0 < self.slots.len()
    }

    fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.slots.get(id.0).map(|slot| &slot.data)
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots.get(id.0).and_then(|slot| slot.parent)
    }

    fn children(&self, id: NodeId) -> &[NodeId] {
        match self.data(id) {
            Some(NodeData::Element { children, .. }) => children,
            _ => &[],
        }
    }

    fn children_mut(&mut self, id: NodeId) -> Option<&mut Vec<NodeId>> {
        match self.slots.get_mut(id.0).map(|slot| &mut slot.data) {
            Some(NodeData::Element { children, .. }) => Some(children),
            _ => None,
        }
    }

    fn attributes_mut(&mut self, id: NodeId) -> Option<&mut Vec<(String, String)>> {
        match self.slots.get_mut(id.0).map(|slot| &mut slot.data) {
            Some(NodeData::Element { attributes, .. }) => Some(attributes),
            _ => None,
        }
    }

    fn tag(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            Some(NodeData::Element { tag, .. }) => Some(tag),
            _ => None,
        }
    }

    fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.data(id) {
            Some(NodeData::Element { attributes, .. }) => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .is_some_and(|value| value.split_ascii_whitespace().any(|c| c == class))
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(children) = self.children_mut(parent) {
            children.retain(|child| *child != id);
        }
        self.slots[id.0].parent = None;
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        if let Some(children) = self.children_mut(parent) {
            match index {
                Some(index) => children.insert(index, child),
                None => children.push(child),
            }
            self.slots[child.0].parent = Some(parent);
        }
    }

    fn insert(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), &'static str> {
        if !self.contains(parent) || !self.contains(child) {
            return Err("unknown node");
        }
        if self.tag(parent).is_none() {
            return Err("parent is not an element");
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err("the new child contains the parent");
        }
        if reference == Some(child) {
            return Err("reference node is the inserted node");
        }
        if let Some(reference) = reference
            && self.parent(reference) != Some(parent)
        {
            return Err("reference node is not a child of parent");
        }

        self.detach(child);
        let index = reference.and_then(|reference| {
            self.children(parent)
                .iter()
                .position(|sibling| *sibling == reference)
        });
        self.attach(parent, child, index);
        Ok(())
    }

    /// Swap `node` for `replacement` in one step. Nothing changes on error.
    fn replace(&mut self, node: NodeId, replacement: &[NodeId]) -> Result<NodeId, &'static str> {
        let parent = self.parent(node).ok_or("node is detached")?;
        for (index, &child) in replacement.iter().enumerate() {
            if !self.contains(child) {
                return Err("unknown node");
            }
            if child == node || self.parent(child).is_some() {
                return Err("replacement node is already attached");
            }
            if self.is_inclusive_ancestor(child, parent) {
                return Err("the new child contains the parent");
            }
            if replacement[..index].contains(&child) {
                return Err("replacement node is listed twice");
            }
        }

        let index = self
            .children(parent)
            .iter()
            .position(|sibling| *sibling == node)
            .ok_or("node is not a child of its parent")?;
        if let Some(children) = self.children_mut(parent) {
            children.splice(index..=index, replacement.iter().copied());
        }
        self.slots[node.0].parent = None;
        for &child in replacement {
            self.slots[child.0].parent = Some(parent);
        }
        Ok(parent)
    }

    fn normalize(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        let mut kept: Vec<NodeId> = Vec::with_capacity(children.len());
        for child in children {
            let text = match &self.slots[child.0].data {
                NodeData::Text(text) => Some(text.clone()),
                NodeData::Element { .. } => {
                    self.normalize(child);
                    None
                }
                NodeData::Comment(_) => None,
            };
            if let Some(text) = text {
                if text.is_empty() {
                    self.slots[child.0].parent = None;
                    continue;
                }
                if let Some(&last) = kept.last()
                    && let NodeData::Text(previous) = &mut self.slots[last.0].data
                {
                    previous.push_str(&text);
                    self.slots[child.0].parent = None;
                    continue;
                }
            }
            kept.push(child);
        }
        if let Some(children) = self.children_mut(id) {
            *children = kept;
        }
    }

    fn collect_text_nodes(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &child in self.children(id) {
            match self.data(child) {
                Some(NodeData::Text(_)) => out.push(child),
                Some(NodeData::Element { tag, .. })
                    if !SKIPPED_TEXT_PARENTS.contains(&tag.as_str()) =>
                {
                    self.collect_text_nodes(child, out)
                }
                _ => {}
            }
        }
    }

    fn collect_by_class(&self, id: NodeId, class: &str, out: &mut Vec<NodeId>) {
        for &child in self.children(id) {
            if self.tag(child).is_some() {
                if self.has_class(child, class) {
                    out.push(child);
                }
                self.collect_by_class(child, class, out);
            }
        }
    }

    fn find_by_id(&self, id: NodeId, value: &str) -> Option<NodeId> {
        if self.attribute(id, "id") == Some(value) {
            return Some(id);
        }
        self.children(id)
            .iter()
            .find_map(|&child| self.find_by_id(child, value))
    }

    fn text_content(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            Some(NodeData::Text(text)) => out.push_str(text),
            Some(NodeData::Element { children, .. }) => {
                for &child in children {
                    self.text_content(child, out);
                }
            }
            _ => {}
        }
    }

    fn write_children(&self, id: NodeId, out: &mut String) {
        let raw = self
            .tag(id)
            .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
        for &child in self.children(id) {
            self.write_node(child, raw, out);
        }
    }

    fn write_node(&self, id: NodeId, raw: bool, out: &mut String) {
        match self.data(id) {
            Some(NodeData::Text(text)) if raw => out.push_str(text),
            Some(NodeData::Text(text)) => out.push_str(&html_escape::encode_text(text)),
            Some(NodeData::Comment(text)) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            Some(NodeData::Element {
                tag,
                attributes,
                children,
            }) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if children.is_empty() && VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                self.write_children(id, out);
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            None => {}
        }
    }
}

struct Observer {
    id: usize,
    callback: Rc<RefCell<MutationCallback>>,
    pending: Vec<NodeId>,
}

struct Shared {
    tree: RefCell<Tree>,
    html: NodeId,
    head: NodeId,
    body: NodeId,
    ready: Cell<ReadyState>,
    ready_callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
    observers: RefCell<Vec<Observer>>,
    next_observer: Cell<usize>,
}

/// A tree of elements and text with `html`, `head` and `body` in place.
///
/// Cloning yields another handle to the same document.
#[derive(Clone)]
pub struct Document {
    shared: Rc<Shared>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty, fully parsed document.
    pub fn new() -> Self {
        Self::with_state(ReadyState::Complete)
    }

    /// An empty document that is still loading; see [`Document::finish_loading`].
    pub fn loading() -> Self {
        Self::with_state(ReadyState::Loading)
    }

    fn with_state(state: ReadyState) -> Self {
        let mut tree = Tree::default();
        let html = tree.push(element_data("html"));
        let head = tree.push(element_data("head"));
        let body = tree.push(element_data("body"));
        tree.attach(html, head, None);
        tree.attach(html, body, None);
        Self {
            shared: Rc::new(Shared {
                tree: RefCell::new(tree),
                html,
                head,
                body,
                ready: Cell::new(state),
                ready_callbacks: RefCell::new(Vec::new()),
                observers: RefCell::new(Vec::new()),
                next_observer: Cell::new(0),
            }),
        }
    }

    /// Current parsing state.
    pub fn ready_state(&self) -> ReadyState {
        self.shared.ready.get()
    }

    /// Mark the document parsed and run the queued ready callbacks.
    pub fn finish_loading(&self) {
        if self.shared.ready.replace(ReadyState::Complete) == ReadyState::Complete {
            return;
        }
        let callbacks = std::mem::take(&mut *self.shared.ready_callbacks.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }

    /// The `html` element.
    pub fn html(&self) -> NodeId {
        self.shared.html
    }

    /// The `head` element.
    pub fn head(&self) -> NodeId {
        self.shared.head
    }

    /// The `body` element.
    pub fn body(&self) -> NodeId {
        self.shared.body
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.shared
            .tree
            .borrow_mut()
            .push(element_data(&tag.to_ascii_lowercase()))
    }

    /// Create a detached text node.
    pub fn create_text(&self, data: &str) -> NodeId {
        self.shared
            .tree
            .borrow_mut()
            .push(NodeData::Text(data.to_string()))
    }

    /// Create a detached comment node.
    pub fn create_comment(&self, data: &str) -> NodeId {
        self.shared
            .tree
            .borrow_mut()
            .push(NodeData::Comment(data.to_string()))
    }

    /// Move `child` to the end of `parent`.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        self.insert(parent, child, None, "appendChild")
    }

    /// Move `child` into `parent`, right before `reference`.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<(), HostError> {
        self.insert(parent, child, Some(reference), "insertBefore")
    }

    fn insert(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
        operation: &'static str,
    ) -> Result<(), HostError> {
        self.shared
            .tree
            .borrow_mut()
            .insert(parent, child, reference)
            .map_err(|message| HostError::rejected(operation, message))?;
        self.record_insertion(parent, child);
        Ok(())
    }

    fn record_insertion(&self, parent: NodeId, child: NodeId) {
        let observed = self
            .shared
            .tree
            .borrow()
            .is_inclusive_ancestor(self.shared.body, parent);
        if !observed {
            return;
        }
        for observer in self.shared.observers.borrow_mut().iter_mut() {
            observer.pending.push(child);
        }
    }

    /// Detach `node` from its parent.
    pub fn remove(&self, node: NodeId) -> Result<(), HostError> {
        let mut tree = self.shared.tree.borrow_mut();
        if tree.parent(node).is_none() {
            return Err(HostError::Detached);
        }
        tree.detach(node);
        Ok(())
    }

    /// Create an element and append it to `parent`.
    pub fn append_element(&self, parent: NodeId, tag: &str) -> Result<NodeId, HostError> {
        let element = self.create_element(tag);
        self.append_child(parent, element)?;
        Ok(element)
    }

    /// Create a text node and append it to `parent`.
    pub fn append_text(&self, parent: NodeId, data: &str) -> Result<NodeId, HostError> {
        let text = self.create_text(data);
        self.append_child(parent, text)?;
        Ok(text)
    }

    /// Set an attribute, replacing any previous value.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), HostError> {
        let mut tree = self.shared.tree.borrow_mut();
        let attributes = tree
            .attributes_mut(node)
            .ok_or_else(|| HostError::rejected("setAttribute", "node is not an element"))?;
        match attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, current)) => *current = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Remove an attribute if present.
    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        if let Some(attributes) = self.shared.tree.borrow_mut().attributes_mut(node) {
            attributes.retain(|(key, _)| key != name);
        }
    }

    /// Attribute value, if the node is an element carrying it.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.shared
            .tree
            .borrow()
            .attribute(node, name)
            .map(str::to_string)
    }

    /// Lowercase tag name of an element.
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.shared.tree.borrow().tag(node).map(str::to_string)
    }

    /// Child nodes in order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.shared.tree.borrow().children(node).to_vec()
    }

    /// Parent node, `None` when detached.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.shared.tree.borrow().parent(node)
    }

    /// Concatenated text of the node and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.shared.tree.borrow().text_content(node, &mut out);
        out
    }

    /// Serialized children of `node`.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.shared.tree.borrow().write_children(node, &mut out);
        out
    }

    /// Whether the element's class list contains `class`.
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.shared.tree.borrow().has_class(node, class)
    }

    /// Add `class` to the element's class list.
    pub fn add_class(&self, node: NodeId, class: &str) -> Result<(), HostError> {
        if self.has_class(node, class) {
            return Ok(());
        }
        let value = match self.attribute(node, "class") {
            Some(current) if !current.trim().is_empty() => format!("{} {}", current.trim(), class),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", &value)
    }

    /// Remove `class` from the element's class list.
    pub fn remove_class(&self, node: NodeId, class: &str) -> Result<(), HostError> {
        let Some(current) = self.attribute(node, "class") else {
            return Ok(());
        };
        let value = current
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(node, "class", &value)
    }

    /// First element in the document whose `id` attribute equals `id`.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.shared.tree.borrow().find_by_id(self.shared.html, id)
    }

    /// Records queued for all observers and not yet delivered.
    pub fn pending_mutations(&self) -> usize {
        self.shared
            .observers
            .borrow()
            .iter()
            .map(|observer| observer.pending.len())
            .sum()
    }

    /// Hand each observer its queued insertions as one batch. Returns the
    /// number of callbacks invoked.
    pub fn deliver_mutations(&self) -> usize {
        let batches: Vec<_> = self
            .shared
            .observers
            .borrow_mut()
            .iter_mut()
            .filter(|observer| !observer.pending.is_empty())
            .map(|observer| {
                (
                    Rc::clone(&observer.callback),
                    std::mem::take(&mut observer.pending),
                )
            })
            .collect();

        let delivered = batches.len();
        for (callback, nodes) in batches {
            let batch: Vec<InsertedNode> = nodes.iter().map(|&node| self.snapshot(node)).collect();
            let mut guard = callback.borrow_mut();
            let callback: &mut dyn FnMut(&[InsertedNode]) = &mut **guard;
            callback(&batch);
        }
        delivered
    }

    fn snapshot(&self, node: NodeId) -> InsertedNode {
        let tree = self.shared.tree.borrow();
        match tree.data(node) {
            Some(NodeData::Text(text)) => InsertedNode::text(text.clone()),
            Some(NodeData::Element { .. }) => {
                let mut content = String::new();
                tree.write_children(node, &mut content);
                InsertedNode::element(content)
            }
            Some(NodeData::Comment(text)) => InsertedNode {
                kind: InsertedKind::Other,
                content: text.clone(),
            },
            None => InsertedNode {
                kind: InsertedKind::Other,
                content: String::new(),
            },
        }
    }

    fn materialize(&self, spec: &NodeSpec) -> Result<NodeId, HostError> {
        match spec {
            NodeSpec::Text(data) => Ok(self.create_text(data)),
            NodeSpec::Element {
                tag,
                attributes,
                text,
            } => {
                let element = self.create_element(tag);
                for (name, value) in attributes {
                    self.set_attribute(element, name, value)?;
                }
                self.append_text(element, text)?;
                Ok(element)
            }
        }
    }
}

fn element_data(tag: &str) -> NodeData {
    NodeData::Element {
        tag: tag.to_string(),
        attributes: Vec::new(),
        children: Vec::new(),
    }
}

/// Observer registration returned by [`ContentRoot::observe`].
pub struct DocumentSubscription {
    shared: Weak<Shared>,
    id: usize,
}

impl MutationSubscription for DocumentSubscription {
    fn take_records(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if let Some(observer) = shared
            .observers
            .borrow_mut()
            .iter_mut()
            .find(|observer| observer.id == self.id)
        {
            observer.pending.clear();
        }
    }
}

impl ContentRoot for Document {
    type Node = NodeId;
    type Subscription = DocumentSubscription;

    fn on_ready(&self, callback: Box<dyn FnOnce()>) {
        match self.ready_state() {
            ReadyState::Complete => callback(),
            ReadyState::Loading => self.shared.ready_callbacks.borrow_mut().push(callback),
        }
    }

    fn normalize(&self) {
        self.shared.tree.borrow_mut().normalize(self.shared.body);
    }

    fn text_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.shared
            .tree
            .borrow()
            .collect_text_nodes(self.shared.body, &mut out);
        out
    }

    fn text(&self, node: &NodeId) -> String {
        match self.shared.tree.borrow().data(*node) {
            Some(NodeData::Text(text)) => text.clone(),
            _ => String::new(),
        }
    }

    fn replace_text(&self, node: &NodeId, replacement: &[NodeSpec]) -> Result<(), HostError> {
        if self.parent(*node).is_none() {
            return Err(HostError::Detached);
        }
        let nodes = replacement
            .iter()
            .map(|spec| self.materialize(spec))
            .collect::<Result<Vec<_>, _>>()?;
        let parent = self
            .shared
            .tree
            .borrow_mut()
            .replace(*node, &nodes)
            .map_err(|message| HostError::rejected("replaceWith", message))?;
        for child in nodes {
            self.record_insertion(parent, child);
        }
        Ok(())
    }

    fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.shared
            .tree
            .borrow()
            .collect_by_class(self.shared.body, class, &mut out);
        out
    }

    fn set_class(&self, class: &str, enabled: bool) -> Result<(), HostError> {
        if enabled {
            self.add_class(self.shared.body, class)
        } else {
            self.remove_class(self.shared.body, class)
        }
    }

    fn observe(&self, callback: MutationCallback) -> Result<DocumentSubscription, HostError> {
        let id = self.shared.next_observer.get();
        self.shared.next_observer.set(id + 1);
        self.shared.observers.borrow_mut().push(Observer {
            id,
            callback: Rc::new(RefCell::new(callback)),
            pending: Vec::new(),
        });
        Ok(DocumentSubscription {
            shared: Rc::downgrade(&self.shared),
            id,
        })
    }
}

impl StyleSink for Document {
    fn has_style(&self, id: &str) -> bool {
        self.get_element_by_id(id).is_some()
    }

    fn insert_style(&self, id: &str, css: &str) -> Result<(), HostError> {
        let style = self.create_element("style");
        self.set_attribute(style, "id", id)?;
        self.append_text(style, css)?;
        self.append_child(self.shared.head, style)
    }
}
