//! Element handlers shared by the rewriting passes.

use lol_html::html_content::ContentType;
use lol_html::{ElementContentHandlers, Selector, element};
use std::borrow::Cow;
use std::cell::Cell;

/// One selector and the handlers attached to it.
pub type ElementHandler<'h> = (Cow<'static, Selector>, ElementContentHandlers<'h>);

/// Builder for aggregating element handlers before passing to lol_html.
pub struct HandlerList<'h> {
    handlers: Vec<ElementHandler<'h>>,
}

impl<'h> HandlerList<'h> {
    /// Creates an empty handler list.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Pushes a single handler tuple.
    pub fn push(&mut self, handler: ElementHandler<'h>) {
        self.handlers.push(handler);
    }

    /// Extends the list with more handlers.
    pub fn extend(&mut self, handlers: impl IntoIterator<Item = ElementHandler<'h>>) {
        self.handlers.extend(handlers);
    }

    /// Converts into the handler vector.
    pub fn into_vec(self) -> Vec<ElementHandler<'h>> {
        self.handlers
    }
}

impl Default for HandlerList<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Selector for elements whose class list contains `class`.
///
/// Names are validated to `[A-Za-z0-9_-]` by the engine configuration, so the
/// quoted attribute form always parses.
pub fn class_selector(class: &str) -> String {
    format!("[class~=\"{}\"]", class)
}

/// Selector for the element with identifier `id`.
pub fn id_selector(id: &str) -> String {
    format!("[id=\"{}\"]", id)
}

/// Counts elements matching `selector`.
pub fn counter<'h>(selector: &str, count: &'h Cell<u32>) -> ElementHandler<'h> {
    element!(selector, move |_el| {
        count.set(count.get() + 1);
        Ok(())
    })
}

/// Appends `markup` to the first `head` element and records that it did.
pub fn head_appender<'h>(markup: &'h str, appended: &'h Cell<bool>) -> ElementHandler<'h> {
    element!("head", move |el| {
        if !appended.get() {
            el.append(markup, ContentType::Html);
            appended.set(true);
        }
        Ok(())
    })
}

/// Adds or removes `class` on every `body` element.
pub fn body_class_toggle<'h>(class: &'h str, enabled: bool) -> ElementHandler<'h> {
    element!("body", move |el| {
        let current = el.get_attribute("class").unwrap_or_default();
        let mut classes: Vec<&str> = current
            .split_ascii_whitespace()
            .filter(|existing| *existing != class)
            .collect();
        if enabled {
            classes.push(class);
        }
        if classes.is_empty() {
            el.remove_attribute("class");
        } else {
            el.set_attribute("class", &classes.join(" "))?;
        }
        Ok(())
    })
}
