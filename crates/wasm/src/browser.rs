//! Live browser document as a content root.

use eqmark_core::{
    ContentRoot, HostError, InsertedKind, InsertedNode, MutationCallback, MutationSubscription,
    NodeSpec, SKIPPED_TEXT_PARENTS, StyleSink,
};
use js_sys::Array;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, HtmlElement, MutationObserver, MutationObserverInit,
    MutationRecord, Node,
};

const SHOW_TEXT: u32 = 0x4;

pub(crate) fn describe(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

/// `window.document` with `body` as the content root.
#[derive(Debug, Clone)]
pub struct BrowserDocument {
    document: Document,
}

impl BrowserDocument {
    /// Wrap the global document.
    pub fn from_window() -> Result<Self, HostError> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| HostError::rejected("window.document", "no global document"))?;
        Ok(Self { document })
    }

    fn body(&self) -> Result<HtmlElement, HostError> {
        self.document.body().ok_or(HostError::MissingElement("body"))
    }

    fn build(&self, spec: &NodeSpec) -> Result<Node, HostError> {
        match spec {
            NodeSpec::Text(data) => Ok(self.document.create_text_node(data).into()),
            NodeSpec::Element {
                tag,
                attributes,
                text,
            } => {
                let element = self
                    .document
                    .create_element(tag)
                    .map_err(|e| HostError::rejected("createElement", describe(&e)))?;
                for (name, value) in attributes {
                    element
                        .set_attribute(name, value)
                        .map_err(|e| HostError::rejected("setAttribute", describe(&e)))?;
                }
                element.set_text_content(Some(text));
                Ok(element.into())
            }
        }
    }
}

fn is_skipped_text(node: &Node) -> bool {
    node.parent_element().is_some_and(|parent| {
        let tag = parent.tag_name().to_ascii_lowercase();
        SKIPPED_TEXT_PARENTS.contains(&tag.as_str())
    })
}

fn inserted(node: &Node) -> InsertedNode {
    match node.node_type() {
        Node::ELEMENT_NODE => InsertedNode::element(
            node.dyn_ref::<Element>()
                .map(Element::inner_html)
                .unwrap_or_default(),
        ),
        Node::TEXT_NODE => InsertedNode::text(node.text_content().unwrap_or_default()),
        _ => InsertedNode {
            kind: InsertedKind::Other,
            content: String::new(),
        },
    }
}

/// A connected `MutationObserver` and the closure it calls.
pub struct BrowserSubscription {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(Array, MutationObserver)>,
}

impl MutationSubscription for BrowserSubscription {
    fn take_records(&self) {
        self.observer.take_records();
    }
}

impl Drop for BrowserSubscription {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

impl ContentRoot for BrowserDocument {
    type Node = Node;
    type Subscription = BrowserSubscription;

    fn on_ready(&self, callback: Box<dyn FnOnce()>) {
        if self.document.ready_state() != "loading" {
            log::info!("document already loaded, processing equations immediately");
            callback();
            return;
        }
        let listener = Closure::once_into_js(move || callback());
        if let Err(err) = self
            .document
            .add_event_listener_with_callback("DOMContentLoaded", listener.unchecked_ref())
        {
            log::error!("could not wait for DOMContentLoaded: {}", describe(&err));
        }
    }

    fn normalize(&self) {
        if let Ok(body) = self.body() {
            body.normalize();
        }
    }

    fn text_nodes(&self) -> Vec<Node> {
        let Ok(body) = self.body() else {
            return Vec::new();
        };
        let walker = match self.document.create_tree_walker_with_what_to_show(&body, SHOW_TEXT) {
            Ok(walker) => walker,
            Err(err) => {
                log::warn!("could not walk text nodes: {}", describe(&err));
                return Vec::new();
            }
        };
        let mut nodes = Vec::new();
        while let Ok(Some(node)) = walker.next_node() {
            if !is_skipped_text(&node) {
                nodes.push(node);
            }
        }
        nodes
    }

    fn text(&self, node: &Node) -> String {
        node.text_content().unwrap_or_default()
    }

    fn replace_text(&self, node: &Node, replacement: &[NodeSpec]) -> Result<(), HostError> {
        let parent = node.parent_node().ok_or(HostError::Detached)?;
        let fragment = self.document.create_document_fragment();
        for spec in replacement {
            let new_node = self.build(spec)?;
            fragment
                .append_child(&new_node)
                .map_err(|e| HostError::rejected("appendChild", describe(&e)))?;
        }
        // The fragment is still detached; the page only sees the swap.
        parent
            .replace_child(&fragment, node)
            .map_err(|e| HostError::rejected("replaceChild", describe(&e)))?;
        Ok(())
    }

    fn elements_with_class(&self, class: &str) -> Vec<Node> {
        let Ok(body) = self.body() else {
            return Vec::new();
        };
        let collection = body.get_elements_by_class_name(class);
        (0..collection.length())
            .filter_map(|index| collection.item(index))
            .map(Node::from)
            .collect()
    }

    fn set_class(&self, class: &str, enabled: bool) -> Result<(), HostError> {
        let classes = self.body()?.class_list();
        let result = if enabled {
            classes.add_1(class)
        } else {
            classes.remove_1(class)
        };
        result.map_err(|e| HostError::rejected("classList", describe(&e)))
    }

    fn observe(&self, mut callback: MutationCallback) -> Result<BrowserSubscription, HostError> {
        let body = self.body()?;
        let handler = Closure::<dyn FnMut(Array, MutationObserver)>::new(
            move |records: Array, _observer: MutationObserver| {
                let mut batch = Vec::new();
                for record in records.iter() {
                    let Ok(record) = record.dyn_into::<MutationRecord>() else {
                        continue;
                    };
                    let added = record.added_nodes();
                    batch.extend(
                        (0..added.length())
                            .filter_map(|index| added.item(index))
                            .map(|node| inserted(&node)),
                    );
                }
                if !batch.is_empty() {
                    callback(&batch);
                }
            },
        );

        let observer = MutationObserver::new(handler.as_ref().unchecked_ref())
            .map_err(|e| HostError::rejected("MutationObserver", describe(&e)))?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        observer
            .observe_with_options(&body, &init)
            .map_err(|e| HostError::rejected("observe", describe(&e)))?;

        Ok(BrowserSubscription {
            observer,
            _callback: handler,
        })
    }
}

impl StyleSink for BrowserDocument {
    fn has_style(&self, id: &str) -> bool {
        self.document.get_element_by_id(id).is_some()
    }

    fn insert_style(&self, id: &str, css: &str) -> Result<(), HostError> {
        let head = self.document.head().ok_or(HostError::MissingElement("head"))?;
        let style = self
            .document
            .create_element("style")
            .map_err(|e| HostError::rejected("createElement", describe(&e)))?;
        style.set_id(id);
        style.set_text_content(Some(css));
        head.append_child(&style)
            .map_err(|e| HostError::rejected("appendChild", describe(&e)))?;
        Ok(())
    }
}
