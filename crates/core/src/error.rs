use thiserror::Error;

/// Errors raised while building an engine from configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A marker token was configured as an empty string.
    #[error("marker token `{field}` must not be empty")]
    EmptyToken {
        /// Configuration field name.
        field: &'static str,
    },
    /// A marker token spans more than one line.
    #[error("marker token `{field}` must not contain line breaks")]
    MultilineToken {
        /// Configuration field name.
        field: &'static str,
    },
    /// Start and end tokens of one kind are identical.
    #[error("{kind} markers use the same start and end token `{token}`")]
    AmbiguousTokens {
        /// Marker kind (`inline` or `display`).
        kind: &'static str,
        /// The duplicated token.
        token: String,
    },
    /// A class name or identifier contains characters outside `[A-Za-z0-9_-]`.
    #[error("`{field}` must be a non-empty name of ASCII letters, digits, `-` or `_`, got `{value}`")]
    InvalidName {
        /// Configuration field name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// The marker pattern failed to compile.
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
    /// JSON configuration could not be decoded.
    #[error("Config error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The host document refused a mutation requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The target node is no longer attached to a parent.
    #[error("node is detached from the document")]
    Detached,
    /// The document has no element to host the requested content.
    #[error("document has no `{0}` element")]
    MissingElement(&'static str),
    /// The host rejected the operation.
    #[error("{operation} failed: {message}")]
    Rejected {
        /// Operation being performed (e.g. `insertBefore`).
        operation: &'static str,
        /// Host supplied message.
        message: String,
    },
}

impl HostError {
    /// Create a rejection error for the given operation.
    pub fn rejected(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            message: message.into(),
        }
    }
}

/// A typesetting adapter failed to render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{engine} render failed: {message}")]
pub struct RenderError {
    /// Adapter name.
    pub engine: String,
    /// Failure description.
    pub message: String,
}

impl RenderError {
    /// Create a render error for the named adapter.
    pub fn new(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            message: message.into(),
        }
    }
}
