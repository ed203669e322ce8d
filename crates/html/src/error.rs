use eqmark_core::ConfigError;
use lol_html::errors::RewritingError;
use thiserror::Error;

/// Errors raised by the HTML post-processor.
#[derive(Debug, Error)]
pub enum HtmlError {
    /// The engine configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// lol_html aborted the rewrite.
    #[error("HTML rewrite failed: {0}")]
    Rewrite(#[from] RewritingError),
}
