//! The reusable processor exposed to Node callers.

use crate::batch::{BatchInput, BatchOptions, BatchProcessingResult, process_batch};
use crate::convert_error;
use crate::types::{EquationConfig, EquationStats, MarkerCounts, ProcessResult};
use eqmark_core::EngineConfig;
use eqmark_html::HtmlProcessor;
use napi_derive::napi;

/// Stateless equation post-processor; build once, reuse across documents.
#[napi]
pub struct EquationPostProcessor {
    pub(crate) inner: HtmlProcessor,
}

#[napi]
impl EquationPostProcessor {
    #[napi(constructor)]
    /// Creates a processor, validating the configuration.
    pub fn new(config: Option<EquationConfig>) -> napi::Result<Self> {
        let config = config.unwrap_or_default().into_engine_config();
        Ok(Self {
            inner: HtmlProcessor::new(&config).map_err(convert_error)?,
        })
    }

    /// Creates a processor from a JSON configuration string.
    #[napi(factory, js_name = "fromJson")]
    pub fn from_json(json: String) -> napi::Result<Self> {
        let config = EngineConfig::from_json(&json).map_err(|e| convert_error(e.into()))?;
        Ok(Self {
            inner: HtmlProcessor::new(&config).map_err(convert_error)?,
        })
    }

    /// Converts markers in one document.
    #[napi]
    pub fn process(&self, html: String) -> napi::Result<ProcessResult> {
        self.inner
            .process(&html)
            .map(ProcessResult::from)
            .map_err(convert_error)
    }

    /// Converts markers in many documents in parallel using Rayon.
    #[napi(js_name = "processBatch")]
    pub fn process_batch(
        &self,
        inputs: Vec<BatchInput>,
        options: Option<BatchOptions>,
    ) -> BatchProcessingResult {
        process_batch(&self.inner, inputs, options)
    }

    /// Counts equation elements already present in a document.
    #[napi]
    pub fn stats(&self, html: String) -> napi::Result<EquationStats> {
        self.inner
            .stats(&html)
            .map(EquationStats::from)
            .map_err(convert_error)
    }

    /// Adds the debug class to `body`.
    #[napi(js_name = "enableDebug")]
    pub fn enable_debug(&self, html: String) -> napi::Result<String> {
        self.inner.set_debug(&html, true).map_err(convert_error)
    }

    /// Removes the debug class from `body`.
    #[napi(js_name = "disableDebug")]
    pub fn disable_debug(&self, html: String) -> napi::Result<String> {
        self.inner.set_debug(&html, false).map_err(convert_error)
    }

    /// Counts start tokens and well-formed markers in converter output.
    #[napi(js_name = "countMarkers")]
    pub fn count_markers(&self, text: String) -> MarkerCounts {
        self.inner.count_markers(&text).into()
    }

    /// The `<style>` element, for documents without a `head`.
    #[napi(js_name = "styleHtml")]
    pub fn style_html(&self) -> String {
        self.inner.style_html()
    }

    /// Version of the processor.
    #[napi]
    pub fn version(&self) -> String {
        eqmark_core::VERSION.to_string()
    }
}
