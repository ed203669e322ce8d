#![deny(missing_docs)]
//! Eqmark core: restores LaTeX equations from converter sentinel markers.
//!
//! Document converters sometimes emit equations as
//! `MATHSTARTINLINE\(...\)MATHENDINLINE` and
//! `MATHSTARTDISPLAY\[...\]MATHENDDISPLAY`. This crate finds those markers,
//! swaps them for classed containers, registers the presentational rules and
//! asks any available typesetting engine to render.

/// Engine configuration.
pub mod config;
/// In-memory document host.
pub mod document;
/// The equation engine.
pub mod engine;
/// Error types.
pub mod error;
/// Host document abstraction.
pub mod host;
/// Marker grammar.
pub mod marker;
/// Change monitor predicate and subscription types.
pub mod monitor;
/// Typesetting engine adapters.
pub mod render;
/// Marker scanning and element serialization.
pub mod scan;
/// Style rules.
pub mod style;

pub use config::{Delimiter, EngineConfig, MarkerTokens};
pub use document::{Document, DocumentSubscription, NodeId, ReadyState};
pub use engine::{EngineBuilder, EquationEngine, LiveStats, PassReport, ProcessStats, VERSION};
pub use error::{ConfigError, HostError, RenderError};
pub use host::{ContentRoot, NodeSpec, SKIPPED_TEXT_PARENTS};
pub use marker::{EquationKind, MarkerGrammar, MarkerMatch};
pub use monitor::{
    InsertedKind, InsertedNode, MutationCallback, MutationSubscription, WatchStatus,
    batch_has_markers, contains_unprocessed_markers,
};
pub use render::{EngineKind, NoEngine, RenderReport, RenderRequest, TypesetEngine, trigger};
pub use scan::{
    ElementLayout, EquationElement, KindCensus, MarkerCensus, PassCounts, Scanner, Segment,
    Transformed, count_markers, transform,
};
pub use style::{StyleOutcome, StyleSheet, StyleSink};
