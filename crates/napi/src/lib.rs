#![deny(missing_docs)]
//! Node.js bindings for eqmark's HTML equation post-processor.

use eqmark_html::{HtmlError, HtmlProcessor};
use napi::bindgen_prelude::*;
use napi_derive::napi;

/// Batch processing types and functions.
pub mod batch;
/// The reusable processor class.
pub mod processor;
/// NAPI-exposed data structures.
pub mod types;

pub use batch::*;
pub use processor::EquationPostProcessor;
pub use types::*;

fn processor(config: Option<EquationConfig>) -> Result<HtmlProcessor> {
    let config = config.unwrap_or_default().into_engine_config();
    HtmlProcessor::new(&config).map_err(convert_error)
}

/// Converts equation markers in one HTML document.
#[napi(js_name = "processHtml")]
pub fn process_html(html: String, config: Option<EquationConfig>) -> Result<ProcessResult> {
    processor(config)?
        .process(&html)
        .map(ProcessResult::from)
        .map_err(convert_error)
}

/// Converts equation markers in many documents in parallel.
#[napi(js_name = "processHtmlBatch")]
pub fn process_html_batch(
    inputs: Vec<BatchInput>,
    config: Option<EquationConfig>,
    options: Option<BatchOptions>,
) -> Result<BatchProcessingResult> {
    let processor = processor(config)?;
    Ok(batch::process_batch(&processor, inputs, options))
}

/// Counts equation elements already present in an HTML document.
#[napi(js_name = "htmlStats")]
pub fn html_stats(html: String, config: Option<EquationConfig>) -> Result<EquationStats> {
    processor(config)?
        .stats(&html)
        .map(EquationStats::from)
        .map_err(convert_error)
}

/// Counts start tokens and well-formed markers in converter output.
#[napi(js_name = "countMarkers")]
pub fn count_markers(text: String, config: Option<EquationConfig>) -> Result<MarkerCounts> {
    Ok(processor(config)?.count_markers(&text).into())
}

/// Version of the bindings.
#[napi]
pub fn version() -> String {
    eqmark_core::VERSION.to_string()
}

pub(crate) fn convert_error(err: HtmlError) -> Error {
    match err {
        HtmlError::Config(e) => Error::new(Status::InvalidArg, format!("Config error: {}", e)),
        HtmlError::Rewrite(e) => Error::from_reason(format!("Rewrite error: {}", e)),
    }
}
