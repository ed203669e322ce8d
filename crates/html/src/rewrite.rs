//! Streaming post-processor for serialized HTML.
//!
//! Applies the same conversion as the live engine to an HTML string: markers
//! in ordinary text are replaced, text inside the elements listed in
//! [`eqmark_core::SKIPPED_TEXT_PARENTS`] is left alone, and the equation style
//! block is appended to `head` when missing.

use std::cell::{Cell, RefCell};

use eqmark_core::{
    ElementLayout, EngineConfig, EquationKind, MarkerCensus, MarkerGrammar, ProcessStats, Scanner,
    StyleSheet, count_markers,
};
use lol_html::html_content::{ContentType, TextType};
use lol_html::{RewriteStrSettings, doc_text, rewrite_str};
use serde::Serialize;

use crate::error::HtmlError;
use crate::handlers::{self, HandlerList};

/// What happened to the style block during [`HtmlProcessor::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleInjection {
    /// Appended to `head`.
    Inserted,
    /// An element with the reserved identifier already exists.
    AlreadyPresent,
    /// The input has no `head`; see [`HtmlProcessor::style_html`].
    NoHead,
}

/// Result of processing one HTML string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HtmlOutput {
    /// Rewritten markup.
    pub html: String,
    /// Equations converted.
    pub stats: ProcessStats,
    /// Style block handling.
    pub styles: StyleInjection,
}

#[derive(Default)]
struct Probe {
    heads: Cell<u32>,
    styles: Cell<u32>,
}

struct TextState<'g> {
    scanner: Scanner<'g>,
    buffer: String,
    chunks: usize,
}

/// Converts equation markers in HTML strings.
#[derive(Debug, Clone)]
pub struct HtmlProcessor {
    grammar: MarkerGrammar,
    layout: ElementLayout,
    sheet: StyleSheet,
    debug_class: String,
}

impl HtmlProcessor {
    /// Validate `config` and compile its grammar.
    pub fn new(config: &EngineConfig) -> Result<Self, HtmlError> {
        config.validate()?;
        Ok(Self {
            grammar: MarkerGrammar::new(&config.markers)?,
            layout: ElementLayout::from_config(config),
            sheet: StyleSheet::from_config(config),
            debug_class: config.debug_class.clone(),
        })
    }

    /// `<style>` element carrying the equation rules.
    pub fn style_html(&self) -> String {
        self.sheet.to_html()
    }

    /// Convert every marker in ordinary text and make sure the style block is
    /// present.
    pub fn process(&self, html: &str) -> Result<HtmlOutput, HtmlError> {
        let probe = self.probe(html)?;
        let style_html = self.sheet.to_html();
        let appended = Cell::new(false);

        let mut element_handlers = HandlerList::new();
        if probe.styles.get() == 0 && probe.heads.get() > 0 {
            element_handlers.push(handlers::head_appender(&style_html, &appended));
        }

        let state = RefCell::new(TextState {
            scanner: Scanner::new(&self.grammar),
            buffer: String::new(),
            chunks: 0,
        });
        let layout = &self.layout;

        let output = rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: element_handlers.into_vec(),
                document_content_handlers: vec![doc_text!(|chunk| {
                    if !matches!(chunk.text_type(), TextType::Data) {
                        return Ok(());
                    }
                    let mut state = state.borrow_mut();
                    let TextState {
                        scanner,
                        buffer,
                        chunks,
                    } = &mut *state;

                    buffer.push_str(chunk.as_str());
                    *chunks += 1;
                    if !chunk.last_in_text_node() {
                        chunk.remove();
                        return Ok(());
                    }

                    let text = std::mem::take(buffer);
                    let split = std::mem::take(chunks) > 1;
                    match scanner.segment(&text) {
                        Some(segments) => chunk.replace(&layout.render(&segments), ContentType::Html),
                        None if split => chunk.replace(&text, ContentType::Html),
                        None => {}
                    }
                    Ok(())
                })],
                ..RewriteStrSettings::new()
            },
        )?;

        let stats: ProcessStats = state.into_inner().scanner.counts().into();
        let styles = if probe.styles.get() > 0 {
            StyleInjection::AlreadyPresent
        } else if appended.get() {
            StyleInjection::Inserted
        } else {
            StyleInjection::NoHead
        };
        log::debug!(
            "converted {} inline and {} display equations, styles {:?}",
            stats.inline,
            stats.display,
            styles
        );

        Ok(HtmlOutput {
            html: output,
            stats,
            styles,
        })
    }

    /// Count equation elements already present in `html`, by class.
    pub fn stats(&self, html: &str) -> Result<ProcessStats, HtmlError> {
        let inline = Cell::new(0);
        let display = Cell::new(0);
        let inline_selector = handlers::class_selector(self.layout.class(EquationKind::Inline));
        let display_selector = handlers::class_selector(self.layout.class(EquationKind::Display));

        let mut element_handlers = HandlerList::new();
        element_handlers.extend([
            handlers::counter(&inline_selector, &inline),
            handlers::counter(&display_selector, &display),
        ]);
        rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: element_handlers.into_vec(),
                ..RewriteStrSettings::new()
            },
        )?;

        Ok(ProcessStats {
            inline: inline.get(),
            display: display.get(),
            total: inline.get() + display.get(),
        })
    }

    /// Add or remove the debug class on `body`.
    pub fn set_debug(&self, html: &str, enabled: bool) -> Result<String, HtmlError> {
        let mut element_handlers = HandlerList::new();
        element_handlers.push(handlers::body_class_toggle(&self.debug_class, enabled));
        Ok(rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: element_handlers.into_vec(),
                ..RewriteStrSettings::new()
            },
        )?)
    }

    /// Start tokens and well-formed markers in `text`, for checking converter
    /// output before rendering.
    pub fn count_markers(&self, text: &str) -> MarkerCensus {
        count_markers(text, &self.grammar)
    }

    fn probe(&self, html: &str) -> Result<Probe, HtmlError> {
        let probe = Probe::default();
        let style_selector = handlers::id_selector(self.sheet.id());
        let mut element_handlers = HandlerList::new();
        element_handlers.extend([
            handlers::counter("head", &probe.heads),
            handlers::counter(&style_selector, &probe.styles),
        ]);
        rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: element_handlers.into_vec(),
                ..RewriteStrSettings::new()
            },
        )?;
        Ok(probe)
    }
}

/// Process `html` with `config` in one call.
pub fn process_html(html: &str, config: &EngineConfig) -> Result<HtmlOutput, HtmlError> {
    HtmlProcessor::new(config)?.process(html)
}

/// Count equation elements in `html` with `config` in one call.
pub fn html_stats(html: &str, config: &EngineConfig) -> Result<ProcessStats, HtmlError> {
    HtmlProcessor::new(config)?.stats(html)
}

/// Toggle the debug class on `body` with `config` in one call.
pub fn set_debug(html: &str, config: &EngineConfig, enabled: bool) -> Result<String, HtmlError> {
    HtmlProcessor::new(config)?.set_debug(html, enabled)
}
