//! Change monitor: decides whether inserted content needs a rescan.
//!
//! The host owns the actual observation mechanism (a `MutationObserver` in a
//! browser, [`crate::Document::deliver_mutations`] natively). It hands each
//! batch of inserted nodes to one callback; the rule applied to that batch is
//! the pure predicate [`batch_has_markers`].

/// Kind of an inserted node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertedKind {
    /// Element node; `content` is its inner markup.
    Element,
    /// Text node; `content` is its data.
    Text,
    /// Comments and anything else; never inspected.
    Other,
}

/// Snapshot of one inserted node, taken when the batch is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedNode {
    /// Node kind.
    pub kind: InsertedKind,
    /// Inner markup or text data.
    pub content: String,
}

impl InsertedNode {
    /// Inserted element with the given inner markup.
    pub fn element(content: impl Into<String>) -> Self {
        Self {
            kind: InsertedKind::Element,
            content: content.into(),
        }
    }

    /// Inserted text node.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: InsertedKind::Text,
            content: content.into(),
        }
    }
}

/// Callback invoked with every batch of insertions.
pub type MutationCallback = Box<dyn FnMut(&[InsertedNode])>;

/// Live subscription returned by the host.
pub trait MutationSubscription {
    /// Drop records queued but not yet delivered (`takeRecords`).
    fn take_records(&self);
}

/// Result of arming the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStatus {
    /// A subscription was installed by this call.
    Armed,
    /// A subscription already existed; nothing changed.
    AlreadyArmed,
}

/// Whether `content` mentions any of the watch patterns.
pub fn contains_unprocessed_markers(content: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|pattern| content.contains(pattern.as_str()))
}

/// Whether any inserted element or text node mentions a watch pattern.
pub fn batch_has_markers(batch: &[InsertedNode], patterns: &[String]) -> bool {
    batch.iter().any(|node| {
        node.kind != InsertedKind::Other && contains_unprocessed_markers(&node.content, patterns)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MarkerGrammar;

    fn patterns() -> &'static [String] {
        MarkerGrammar::standard().watch_patterns()
    }

    #[test]
    fn start_or_end_fragment_qualifies() {
        assert!(contains_unprocessed_markers("x MATHSTARTINLINE", patterns()));
        assert!(contains_unprocessed_markers("MATHEND only", patterns()));
        assert!(!contains_unprocessed_markers(
            r#"<span class="inlineMath">\(x\)</span>"#,
            patterns()
        ));
    }

    #[test]
    fn batch_checks_elements_and_text() {
        let quiet = [InsertedNode::element("<p>hello</p>"), InsertedNode::text("plain")];
        assert!(!batch_has_markers(&quiet, patterns()));

        let with_text = [InsertedNode::text(r"MATHSTARTINLINE\(a\)MATHENDINLINE")];
        assert!(batch_has_markers(&with_text, patterns()));

        let with_element = [
            InsertedNode::element("<b>x</b>"),
            InsertedNode::element(r"MATHSTARTDISPLAY\[b\]MATHENDDISPLAY"),
        ];
        assert!(batch_has_markers(&with_element, patterns()));
    }

    #[test]
    fn other_nodes_are_ignored() {
        let comment = [InsertedNode {
            kind: InsertedKind::Other,
            content: "MATHSTART in a comment".to_string(),
        }];
        assert!(!batch_has_markers(&comment, patterns()));
    }
}
