//! Style registrar: the presentational rules for equation elements.

use crate::config::EngineConfig;
use crate::error::HostError;

/// Destination for style rule blocks (the document head in a browser).
pub trait StyleSink {
    /// Whether a rule block with `id` is already present.
    fn has_style(&self, id: &str) -> bool;
    /// Insert a rule block under `id`.
    fn insert_style(&self, id: &str, css: &str) -> Result<(), HostError>;
}

/// Result of [`StyleSheet::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleOutcome {
    /// The rule block was inserted by this call.
    Inserted,
    /// A block with the reserved identifier already existed.
    AlreadyPresent,
    /// The host refused the insertion.
    Refused,
}

/// The equation rule block and its reserved identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSheet {
    id: String,
    css: String,
}

impl Default for StyleSheet {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl StyleSheet {
    /// Build the rule block for the configured class names.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            id: config.style_id.clone(),
            css: equation_css(config),
        }
    }

    /// Reserved identifier of the rule block.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Rule text.
    pub fn css(&self) -> &str {
        &self.css
    }

    /// `<style>` element markup.
    pub fn to_html(&self) -> String {
        format!("<style id=\"{}\">{}</style>", self.id, self.css)
    }

    /// Insert the rule block unless one with the same identifier exists.
    pub fn ensure<S: StyleSink + ?Sized>(&self, sink: &S) -> StyleOutcome {
        if sink.has_style(&self.id) {
            return StyleOutcome::AlreadyPresent;
        }
        match sink.insert_style(&self.id, &self.css) {
            Ok(()) => {
                log::debug!("inserted equation styles `{}`", self.id);
                StyleOutcome::Inserted
            }
            Err(err) => {
                log::warn!("could not insert equation styles: {}", err);
                StyleOutcome::Refused
            }
        }
    }
}

fn equation_css(config: &EngineConfig) -> String {
    let inline = &config.inline_class;
    let display = &config.display_class;
    let debug = &config.debug_class;
    let breakpoint = config.mobile_breakpoint_px;
    format!(
        r#"
.{inline} {{
    display: inline;
    margin: 0 0.2em;
}}
.{display} {{
    display: block;
    text-align: center;
    margin: 1em auto;
    overflow-x: auto;
    padding: 0.5em;
    max-width: 100%;
}}
.{inline}:hover, .{display}:hover {{
    background-color: rgba(255, 255, 0, 0.05);
    transition: background-color 0.3s ease;
}}
@media (max-width: {breakpoint}px) {{
    .{display} {{
        font-size: 0.9em;
        padding: 0.3em;
    }}
}}
.{debug} .{inline}::before,
.{debug} .{display}::before {{
    content: "[" attr(data-equation-id) "] ";
    color: #ff6b6b;
    font-size: 0.7em;
    font-family: monospace;
}}
"#
    )
}
