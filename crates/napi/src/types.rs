//! NAPI-exposed data structures.

use eqmark_core::{EngineConfig, MarkerCensus, ProcessStats};
use eqmark_html::{HtmlOutput, StyleInjection};
use napi_derive::napi;
use serde::Serialize;

/// Options passed to the processor constructor. Missing fields keep their
/// defaults.
#[napi(object)]
#[derive(Debug, Clone, Default)]
pub struct EquationConfig {
    /// Token opening an inline marker (`MATHSTARTINLINE`).
    pub inline_start: Option<String>,
    /// Token closing an inline marker (`MATHENDINLINE`).
    pub inline_end: Option<String>,
    /// Token opening a display marker (`MATHSTARTDISPLAY`).
    pub display_start: Option<String>,
    /// Token closing a display marker (`MATHENDDISPLAY`).
    pub display_end: Option<String>,
    /// Class of inline containers (`inlineMath`).
    pub inline_class: Option<String>,
    /// Class of display containers (`Math_box`).
    pub display_class: Option<String>,
    /// Identifier of the injected style element.
    pub style_id: Option<String>,
    /// Class added to `body` in debug mode.
    pub debug_class: Option<String>,
    /// Viewport width below which display equations shrink.
    pub mobile_breakpoint_px: Option<u32>,
}

impl EquationConfig {
    pub(crate) fn into_engine_config(self) -> EngineConfig {
        let mut config = EngineConfig::default();
        let markers = &mut config.markers;
        for (slot, value) in [
            (&mut markers.inline_start, self.inline_start),
            (&mut markers.inline_end, self.inline_end),
            (&mut markers.display_start, self.display_start),
            (&mut markers.display_end, self.display_end),
        ] {
            if let Some(value) = value {
                *slot = value;
            }
        }
        for (slot, value) in [
            (&mut config.inline_class, self.inline_class),
            (&mut config.display_class, self.display_class),
            (&mut config.style_id, self.style_id),
            (&mut config.debug_class, self.debug_class),
        ] {
            if let Some(value) = value {
                *slot = value;
            }
        }
        if let Some(px) = self.mobile_breakpoint_px {
            config.mobile_breakpoint_px = px;
        }
        config
    }
}

/// Equation counts.
#[napi(object)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EquationStats {
    /// Inline equations.
    pub inline: u32,
    /// Display equations.
    pub display: u32,
    /// Sum of both.
    pub total: u32,
}

impl From<ProcessStats> for EquationStats {
    fn from(stats: ProcessStats) -> Self {
        Self {
            inline: stats.inline,
            display: stats.display,
            total: stats.total,
        }
    }
}

/// Result of processing one HTML document.
#[napi(object)]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    /// Rewritten HTML.
    pub html: String,
    /// Equations converted by this pass.
    pub stats: EquationStats,
    /// `inserted`, `alreadyPresent` or `noHead`.
    pub styles: String,
}

impl From<HtmlOutput> for ProcessResult {
    fn from(output: HtmlOutput) -> Self {
        let styles = match output.styles {
            StyleInjection::Inserted => "inserted",
            StyleInjection::AlreadyPresent => "alreadyPresent",
            StyleInjection::NoHead => "noHead",
        };
        Self {
            html: output.html,
            stats: output.stats.into(),
            styles: styles.to_string(),
        }
    }
}

/// Marker inventory of converter output.
#[napi(object)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerCounts {
    /// Inline start tokens.
    pub inline_start_tokens: u32,
    /// Well-formed inline markers.
    pub inline_well_formed: u32,
    /// Display start tokens.
    pub display_start_tokens: u32,
    /// Well-formed display markers.
    pub display_well_formed: u32,
    /// Start tokens that open no well-formed marker.
    pub malformed: u32,
}

impl From<MarkerCensus> for MarkerCounts {
    fn from(census: MarkerCensus) -> Self {
        Self {
            inline_start_tokens: census.inline.start_tokens,
            inline_well_formed: census.inline.well_formed,
            display_start_tokens: census.display.start_tokens,
            display_well_formed: census.display.well_formed,
            malformed: census.malformed(),
        }
    }
}
