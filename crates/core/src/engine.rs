//! The equation engine: transform, style and render, kept in sync with the
//! document by an optional change monitor.
//!
//! Numbering restarts at 1 on every pass. Identifiers are stable within a
//! pass, and across passes only for elements that are never rescanned;
//! converted elements are never rescanned because they hold no markers.

use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::config::{Delimiter, EngineConfig};
use crate::error::{ConfigError, HostError};
use crate::host::{ContentRoot, NodeSpec};
use crate::marker::{EquationKind, MarkerGrammar};
use crate::monitor::{self, InsertedNode, MutationCallback, MutationSubscription, WatchStatus};
use crate::render::{self, RenderReport, RenderRequest, TypesetEngine};
use crate::scan::{ElementLayout, PassCounts, Scanner, Segment};
use crate::style::{StyleOutcome, StyleSheet, StyleSink};

/// Version reported to host pages.
pub const VERSION: &str = "1.0.0";

/// Counts returned by a pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessStats {
    /// Inline equations.
    pub inline: u32,
    /// Display equations.
    pub display: u32,
    /// Sum of both.
    pub total: u32,
}

impl From<PassCounts> for ProcessStats {
    fn from(counts: PassCounts) -> Self {
        Self {
            inline: counts.inline,
            display: counts.display,
            total: counts.total(),
        }
    }
}

/// Equation elements currently present under the content root.
#[derive(Debug, Clone)]
pub struct LiveStats<N> {
    /// Inline equation elements, in document order.
    pub inline: Vec<N>,
    /// Display equation elements, in document order.
    pub display: Vec<N>,
}

impl<N> LiveStats<N> {
    /// Counts without the node collections.
    pub fn summary(&self) -> ProcessStats {
        let inline = self.inline.len() as u32;
        let display = self.display.len() as u32;
        ProcessStats {
            inline,
            display,
            total: inline + display,
        }
    }
}

/// Everything one pipeline run did.
#[derive(Debug, Clone)]
pub struct PassReport {
    /// Equations converted.
    pub stats: ProcessStats,
    /// Style registration result.
    pub styles: StyleOutcome,
    /// Typesetting adapters outcome.
    pub render: RenderReport,
}

/// Collects the parts of an [`EquationEngine`].
pub struct EngineBuilder<R, S> {
    root: R,
    styles: S,
    config: EngineConfig,
    engines: Vec<Box<dyn TypesetEngine>>,
}

impl<R, S> EngineBuilder<R, S>
where
    R: ContentRoot + 'static,
    S: StyleSink + 'static,
{
    /// Replace the default configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a typesetting adapter; adapters run in insertion order.
    pub fn engine(mut self, engine: impl TypesetEngine + 'static) -> Self {
        self.engines.push(Box::new(engine));
        self
    }

    /// Validate the configuration and build the engine.
    pub fn build(self) -> Result<EquationEngine<R, S>, ConfigError> {
        self.config.validate()?;
        let grammar = MarkerGrammar::new(&self.config.markers)?;
        Ok(EquationEngine {
            inner: Rc::new(Inner {
                root: self.root,
                styles: self.styles,
                grammar,
                layout: ElementLayout::from_config(&self.config),
                sheet: StyleSheet::from_config(&self.config),
                debug_class: self.config.debug_class,
                delimiters: self.config.delimiters,
                engines: self.engines,
                monitor: RefCell::new(None),
                passes: Cell::new(0),
            }),
        })
    }
}

struct Inner<R: ContentRoot, S> {
    root: R,
    styles: S,
    grammar: MarkerGrammar,
    layout: ElementLayout,
    sheet: StyleSheet,
    debug_class: String,
    delimiters: Vec<Delimiter>,
    engines: Vec<Box<dyn TypesetEngine>>,
    monitor: RefCell<Option<R::Subscription>>,
    passes: Cell<u64>,
}

/// Equation marker engine bound to one document.
///
/// Cloning yields another handle to the same engine.
pub struct EquationEngine<R: ContentRoot, S> {
    inner: Rc<Inner<R, S>>,
}

impl<R: ContentRoot, S> Clone for EquationEngine<R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<R, S> EquationEngine<R, S>
where
    R: ContentRoot + 'static,
    S: StyleSink + 'static,
{
    /// Start building an engine over `root`, writing styles into `styles`.
    pub fn builder(root: R, styles: S) -> EngineBuilder<R, S> {
        EngineBuilder {
            root,
            styles,
            config: EngineConfig::default(),
            engines: Vec::new(),
        }
    }

    /// Schedule the initial pass for when the document is ready.
    pub fn start(&self) {
        let weak = Rc::downgrade(&self.inner);
        self.inner.root.on_ready(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                log::info!("document ready, processing equations");
                inner.run_pipeline();
            }
        }));
    }

    /// Run the full pipeline once and return the counts of this pass.
    pub fn process(&self) -> ProcessStats {
        self.inner.run_pipeline().stats
    }

    /// Same as [`EquationEngine::process`], for dynamically loaded content.
    pub fn reprocess(&self) -> ProcessStats {
        log::info!("reprocessing equations");
        self.process()
    }

    /// Run the pipeline and return the full report.
    pub fn process_with_report(&self) -> PassReport {
        self.inner.run_pipeline()
    }

    /// Equation elements currently in the document, found by class.
    pub fn stats(&self) -> LiveStats<R::Node> {
        let root = &self.inner.root;
        LiveStats {
            inline: root.elements_with_class(self.inner.layout.class(EquationKind::Inline)),
            display: root.elements_with_class(self.inner.layout.class(EquationKind::Display)),
        }
    }

    /// Show each equation's identifier in front of it.
    pub fn enable_debug(&self) -> Result<(), HostError> {
        self.inner.root.set_class(&self.inner.debug_class, true)?;
        log::info!("debug mode enabled, equation ids are visible");
        Ok(())
    }

    /// Hide equation identifiers again.
    pub fn disable_debug(&self) -> Result<(), HostError> {
        self.inner.root.set_class(&self.inner.debug_class, false)?;
        log::info!("debug mode disabled");
        Ok(())
    }

    /// Arm the change monitor. Calling it again has no effect.
    pub fn watch_for_changes(&self) -> Result<WatchStatus, HostError> {
        if self.is_watching() {
            return Ok(WatchStatus::AlreadyArmed);
        }

        let weak = Rc::downgrade(&self.inner);
        let callback: MutationCallback = Box::new(move |batch: &[InsertedNode]| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if monitor::batch_has_markers(batch, inner.grammar.watch_patterns()) {
                log::info!("new content with markers detected, reprocessing");
                inner.run_pipeline();
            }
        });

        let subscription = self.inner.root.observe(callback)?;
        *self.inner.monitor.borrow_mut() = Some(subscription);
        log::info!("watching for dynamic content changes");
        Ok(WatchStatus::Armed)
    }

    /// Whether the change monitor is armed.
    pub fn is_watching(&self) -> bool {
        self.inner.monitor.borrow().is_some()
    }

    /// Number of pipeline runs so far.
    pub fn passes(&self) -> u64 {
        self.inner.passes.get()
    }

    /// Version string.
    pub fn version(&self) -> &'static str {
        VERSION
    }
}

impl<R, S> Inner<R, S>
where
    R: ContentRoot,
    S: StyleSink,
{
    fn run_pipeline(&self) -> PassReport {
        let stats = self.transform();
        let styles = self.sheet.ensure(&self.styles);
        let render = render::trigger(
            &self.engines,
            &RenderRequest {
                delimiters: &self.delimiters,
            },
        );

        // Our own insertions must not wake the monitor.
        if let Some(subscription) = self.monitor.borrow().as_ref() {
            subscription.take_records();
        }

        self.passes.set(self.passes.get() + 1);
        log::info!(
            "processed {} inline and {} display equations ({} total)",
            stats.inline,
            stats.display,
            stats.total
        );
        PassReport {
            stats,
            styles,
            render,
        }
    }

    fn transform(&self) -> ProcessStats {
        self.root.normalize();
        let mut scanner = Scanner::new(&self.grammar);
        for node in self.root.text_nodes() {
            let text = self.root.text(&node);
            let before = scanner.counts();
            let Some(segments) = scanner.segment(&text) else {
                continue;
            };
            let replacement: Vec<NodeSpec> = segments
                .iter()
                .map(|segment| self.node_spec(segment))
                .collect();
            if let Err(err) = self.root.replace_text(&node, &replacement) {
                log::warn!("left equation markers in place: {}", err);
                scanner.restore(before);
            }
        }
        scanner.counts().into()
    }

    fn node_spec(&self, segment: &Segment<'_>) -> NodeSpec {
        match segment {
            Segment::Text(text) => NodeSpec::Text((*text).to_string()),
            Segment::Equation(element) => NodeSpec::Element {
                tag: self.layout.tag(element.kind),
                attributes: self.layout.attributes(element),
                text: element.content.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, DocumentSubscription, NodeId};
    use crate::error::RenderError;
    use crate::render::EngineKind;

    /// Document host that refuses to rewrite text mentioning `locked`.
    struct Locked(Document);

    impl ContentRoot for Locked {
        type Node = NodeId;
        type Subscription = DocumentSubscription;

        fn on_ready(&self, callback: Box<dyn FnOnce()>) {
            ContentRoot::on_ready(&self.0, callback)
        }

        fn normalize(&self) {
            ContentRoot::normalize(&self.0)
        }

        fn text_nodes(&self) -> Vec<NodeId> {
            ContentRoot::text_nodes(&self.0)
        }

        fn text(&self, node: &NodeId) -> String {
            ContentRoot::text(&self.0, node)
        }

        fn replace_text(&self, node: &NodeId, replacement: &[NodeSpec]) -> Result<(), HostError> {
            if ContentRoot::text(&self.0, node).contains("locked") {
                return Err(HostError::rejected("replaceWith", "node is read-only"));
            }
            ContentRoot::replace_text(&self.0, node, replacement)
        }

        fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
            ContentRoot::elements_with_class(&self.0, class)
        }

        fn set_class(&self, class: &str, enabled: bool) -> Result<(), HostError> {
            ContentRoot::set_class(&self.0, class, enabled)
        }

        fn observe(&self, callback: MutationCallback) -> Result<DocumentSubscription, HostError> {
            ContentRoot::observe(&self.0, callback)
        }
    }

    fn engine(doc: &Document) -> EquationEngine<Document, Document> {
        EquationEngine::builder(doc.clone(), doc.clone())
            .build()
            .unwrap()
    }

    fn paragraph(doc: &Document, text: &str) -> NodeId {
        let p = doc.append_element(doc.body(), "p").unwrap();
        doc.append_text(p, text).unwrap();
        p
    }

    fn ids(doc: &Document, nodes: &[NodeId]) -> Vec<String> {
        nodes
            .iter()
            .filter_map(|node| doc.attribute(*node, "data-equation-id"))
            .collect()
    }

    #[test]
    fn converts_mixed_paragraph() {
        let doc = Document::new();
        let p = paragraph(
            &doc,
            r"See MATHSTARTINLINE\(x+1\)MATHENDINLINE and MATHSTARTDISPLAY\[y=2x\]MATHENDDISPLAY.",
        );
        let stats = engine(&doc).process();
        assert_eq!(
            stats,
            ProcessStats {
                inline: 1,
                display: 1,
                total: 2
            }
        );
        insta::assert_snapshot!(doc.inner_html(p), @r#"See <span class="inlineMath" data-equation-kind="inline" data-equation-id="inline-1">\(x+1\)</span> and <div class="Math_box" data-equation-kind="display" data-equation-id="display-1">\[y=2x\]</div>."#);
    }

    #[test]
    fn malformed_marker_stays_literal() {
        let doc = Document::new();
        let p = paragraph(
            &doc,
            r"MATHSTARTINLINE\(a\) then MATHSTARTINLINE\(b\)MATHENDINLINE",
        );
        let stats = engine(&doc).process();
        assert_eq!(stats.inline, 1);
        assert!(doc.inner_html(p).starts_with(r"MATHSTARTINLINE\(a\) then <span"));
        assert_eq!(doc.text_content(p), r"MATHSTARTINLINE\(a\) then \(b\)");
    }

    #[test]
    fn numbering_spans_text_nodes_in_document_order() {
        let doc = Document::new();
        paragraph(&doc, r"MATHSTARTINLINE\(a\)MATHENDINLINE");
        let section = doc.append_element(doc.body(), "section").unwrap();
        let inner = doc.append_element(section, "p").unwrap();
        doc.append_text(inner, r"MATHSTARTDISPLAY\[b\]MATHENDDISPLAY").unwrap();
        doc.append_text(section, r"MATHSTARTINLINE\(c\)MATHENDINLINE").unwrap();

        let eq = engine(&doc);
        eq.process();
        let live = eq.stats();
        assert_eq!(ids(&doc, &live.inline), vec!["inline-1", "inline-2"]);
        assert_eq!(ids(&doc, &live.display), vec!["display-1"]);
        assert_eq!(live.summary().total, 3);
    }

    #[test]
    fn form_field_and_title_text_is_not_converted() {
        let doc = Document::new();
        let textarea = doc.append_element(doc.body(), "textarea").unwrap();
        doc.append_text(textarea, r"MATHSTARTINLINE\(x\)MATHENDINLINE").unwrap();
        let title = doc.append_element(doc.body(), "title").unwrap();
        doc.append_text(title, r"MATHSTARTDISPLAY\[t\]MATHENDDISPLAY").unwrap();
        paragraph(&doc, r"MATHSTARTINLINE\(y\)MATHENDINLINE");

        let eq = engine(&doc);
        let stats = eq.process();
        assert_eq!((stats.inline, stats.display), (1, 0));
        assert_eq!(doc.inner_html(textarea), r"MATHSTARTINLINE\(x\)MATHENDINLINE");
        assert_eq!(doc.inner_html(title), r"MATHSTARTDISPLAY\[t\]MATHENDDISPLAY");
        assert_eq!(ids(&doc, &eq.stats().inline), vec!["inline-1"]);
    }

    #[test]
    fn refused_rewrite_keeps_text_and_numbering() {
        let doc = Document::new();
        let first = paragraph(&doc, r"locked MATHSTARTINLINE\(a\)MATHENDINLINE here");
        paragraph(&doc, r"MATHSTARTINLINE\(b\)MATHENDINLINE");
        let before = doc.inner_html(first);

        let eq = EquationEngine::builder(Locked(doc.clone()), doc.clone())
            .build()
            .unwrap();
        let stats = eq.process();
        assert_eq!(stats.inline, 1);
        assert_eq!(doc.inner_html(first), before);
        assert_eq!(doc.children(first).len(), 1);
        assert_eq!(ids(&doc, &eq.stats().inline), vec!["inline-1"]);
    }

    #[test]
    fn second_pass_converts_nothing() {
        let doc = Document::new();
        paragraph(&doc, r"MATHSTARTINLINE\(x\)MATHENDINLINE");
        let eq = engine(&doc);
        eq.process();
        let html = doc.inner_html(doc.body());
        assert_eq!(eq.reprocess(), ProcessStats::default());
        assert_eq!(doc.inner_html(doc.body()), html);
        assert_eq!(eq.passes(), 2);
    }

    #[test]
    fn styles_are_inserted_once() {
        let doc = Document::new();
        let eq = engine(&doc);
        let first = eq.process_with_report();
        let second = eq.process_with_report();
        assert_eq!(first.styles, StyleOutcome::Inserted);
        assert_eq!(second.styles, StyleOutcome::AlreadyPresent);
        assert_eq!(doc.children(doc.head()).len(), 1);
        assert!(doc.get_element_by_id("equation-processor-styles").is_some());
    }

    #[test]
    fn markers_inside_scripts_are_ignored() {
        let doc = Document::new();
        let script = doc.append_element(doc.body(), "script").unwrap();
        doc.append_text(script, r#"s = "MATHSTARTINLINE\(x\)MATHENDINLINE";"#)
            .unwrap();
        assert_eq!(engine(&doc).process().total, 0);
    }

    #[test]
    fn insertion_after_arming_reprocesses_once_with_fresh_numbering() {
        let doc = Document::new();
        paragraph(&doc, r"MATHSTARTINLINE\(a\)MATHENDINLINE MATHSTARTINLINE\(b\)MATHENDINLINE");
        let eq = engine(&doc);
        eq.process();
        assert_eq!(eq.watch_for_changes().unwrap(), WatchStatus::Armed);
        assert_eq!(eq.watch_for_changes().unwrap(), WatchStatus::AlreadyArmed);

        let late = doc.create_element("div");
        doc.append_text(late, r"MATHSTARTINLINE\(c\)MATHENDINLINE").unwrap();
        doc.append_child(doc.body(), late).unwrap();

        assert_eq!(doc.deliver_mutations(), 1);
        assert_eq!(eq.passes(), 2);
        assert_eq!(doc.pending_mutations(), 0);
        assert_eq!(doc.deliver_mutations(), 0);

        let converted = eq.stats().inline;
        assert_eq!(ids(&doc, &converted), vec!["inline-1", "inline-2", "inline-1"]);
        assert_eq!(doc.text_content(late), r"\(c\)");
    }

    #[test]
    fn insertion_without_markers_is_ignored() {
        let doc = Document::new();
        let eq = engine(&doc);
        eq.process();
        eq.watch_for_changes().unwrap();
        paragraph(&doc, "no equations here");
        doc.deliver_mutations();
        assert_eq!(eq.passes(), 1);
    }

    #[test]
    fn bare_text_insertion_triggers_reprocessing() {
        let doc = Document::new();
        let eq = engine(&doc);
        eq.watch_for_changes().unwrap();
        doc.append_text(doc.body(), r"MATHSTARTDISPLAY\[z\]MATHENDDISPLAY")
            .unwrap();
        doc.deliver_mutations();
        assert_eq!(eq.passes(), 1);
        assert_eq!(eq.stats().display.len(), 1);
    }

    #[test]
    fn stats_follow_external_removal() {
        let doc = Document::new();
        let p = paragraph(&doc, r"MATHSTARTINLINE\(a\)MATHENDINLINE MATHSTARTINLINE\(b\)MATHENDINLINE");
        let eq = engine(&doc);
        eq.process();
        let first = eq.stats().inline[0];
        doc.remove(first).unwrap();
        assert_eq!(eq.stats().summary().inline, 1);
        assert_eq!(doc.children(p).len(), 2);
    }

    #[test]
    fn debug_toggles_body_class() {
        let doc = Document::new();
        let eq = engine(&doc);
        eq.enable_debug().unwrap();
        eq.enable_debug().unwrap();
        assert_eq!(doc.attribute(doc.body(), "class").as_deref(), Some("debug-equations"));
        eq.disable_debug().unwrap();
        assert!(!doc.has_class(doc.body(), "debug-equations"));
    }

    #[test]
    fn start_waits_for_document_ready() {
        let doc = Document::loading();
        paragraph(&doc, r"MATHSTARTINLINE\(a\)MATHENDINLINE");
        let eq = engine(&doc);
        eq.start();
        assert_eq!(eq.passes(), 0);
        doc.finish_loading();
        assert_eq!(eq.passes(), 1);
        assert_eq!(eq.stats().inline.len(), 1);
    }

    #[test]
    fn custom_config_changes_classes_and_tokens() {
        let doc = Document::new();
        let p = paragraph(&doc, r"<<\(q\)>>");
        let config = EngineConfig::from_json(
            r#"{"markers":{"inlineStart":"<<","inlineEnd":">>"},"inlineClass":"eq"}"#,
        )
        .unwrap();
        let eq = EquationEngine::builder(doc.clone(), doc.clone())
            .config(config)
            .build()
            .unwrap();
        assert_eq!(eq.process().inline, 1);
        assert!(doc.inner_html(p).starts_with(r#"<span class="eq""#));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let doc = Document::new();
        let config = EngineConfig {
            inline_class: "not a class".to_string(),
            ..EngineConfig::default()
        };
        let built = EquationEngine::builder(doc.clone(), doc).config(config).build();
        assert!(matches!(built, Err(ConfigError::InvalidName { .. })));
    }

    struct Failing;

    impl TypesetEngine for Failing {
        fn kind(&self) -> EngineKind {
            EngineKind::Tex
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn render(&self, _: &RenderRequest<'_>) -> Result<(), RenderError> {
            Err(RenderError::new("failing", "not configured"))
        }
    }

    #[test]
    fn render_failure_keeps_conversion() {
        let doc = Document::new();
        paragraph(&doc, r"MATHSTARTINLINE\(a\)MATHENDINLINE");
        let eq = EquationEngine::builder(doc.clone(), doc.clone())
            .engine(Failing)
            .engine(crate::render::NoEngine)
            .build()
            .unwrap();
        let report = eq.process_with_report();
        assert_eq!(report.stats.inline, 1);
        assert_eq!(report.render.failed.len(), 1);
        assert_eq!(report.render.skipped, vec!["none".to_string()]);
        assert_eq!(eq.version(), "1.0.0");
    }
}
