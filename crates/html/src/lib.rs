#![deny(missing_docs)]
//! eqmark HTML post-processing: converts equation markers in serialized HTML
//! with lol_html, for build pipelines and servers.

/// Error types.
pub mod error;
/// Element handler builders.
pub mod handlers;
/// The HTML processor.
pub mod rewrite;

pub use error::HtmlError;
pub use handlers::{HandlerList, class_selector, id_selector};
pub use rewrite::{HtmlOutput, HtmlProcessor, StyleInjection, html_stats, process_html, set_debug};
