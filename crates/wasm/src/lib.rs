//! Browser build of eqmark: processes equation markers in the live page and
//! exposes the `window.EquationProcessor` API.

use eqmark_core::{EngineConfig, EquationEngine, LiveStats, ProcessStats, WatchStatus};
use js_sys::{Array, Object, Reflect};
use log::LevelFilter;
use serde::Deserialize;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;

/// The browser document host.
pub mod browser;
/// MathJax and KaTeX adapters.
pub mod engines;
/// Console logging.
pub mod logger;

pub use browser::BrowserDocument;
pub use engines::{KatexEngine, MathJaxEngine};

const GLOBAL_NAME: &str = "EquationProcessor";

/// Options accepted by the constructor and `install`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WasmOptions {
    /// Engine configuration.
    #[serde(default)]
    pub config: EngineConfig,
    /// Console verbosity: `error`, `warn`, `info`, `debug` or `off`.
    #[serde(default, alias = "logLevel")]
    pub log_level: Option<String>,
    /// Arm the change monitor right away.
    #[serde(default, alias = "watchForChanges")]
    pub watch_for_changes: Option<bool>,
}

fn parse_options(options: JsValue) -> Result<WasmOptions, JsError> {
    if options.is_undefined() || options.is_null() {
        return Ok(WasmOptions::default());
    }
    Ok(serde_wasm_bindgen::from_value(options)?)
}

fn level(name: Option<&str>) -> LevelFilter {
    name.and_then(|name| name.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

fn stats_value(stats: ProcessStats) -> Result<JsValue, JsError> {
    Ok(serde_wasm_bindgen::to_value(&stats)?)
}

fn set(target: &Object, key: &str, value: &JsValue) -> Result<(), JsError> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(|e| JsError::new(&browser::describe(&e)))
}

fn live_stats_value(live: LiveStats<web_sys::Node>) -> Result<JsValue, JsError> {
    let summary = live.summary();
    let elements = Object::new();
    set(&elements, "inline", &live.inline.into_iter().collect::<Array>())?;
    set(&elements, "display", &live.display.into_iter().collect::<Array>())?;

    let result = Object::new();
    set(&result, "inline", &summary.inline.into())?;
    set(&result, "display", &summary.display.into())?;
    set(&result, "total", &summary.total.into())?;
    set(&result, "elements", &elements)?;
    Ok(result.into())
}

/// Equation processor bound to the page's document.
#[wasm_bindgen]
#[derive(Clone)]
pub struct EquationProcessor {
    engine: EquationEngine<BrowserDocument, BrowserDocument>,
}

#[wasm_bindgen]
impl EquationProcessor {
    /// Build a processor for `window.document`. Nothing runs until `process`
    /// is called.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<EquationProcessor, JsError> {
        let options = parse_options(options)?;
        logger::init(level(options.log_level.as_deref()));
        Self::with_config(options.config)
    }

    /// Run the full pipeline once; returns `{ inline, display, total }`.
    pub fn process(&self) -> Result<JsValue, JsError> {
        stats_value(self.engine.process())
    }

    /// Same as `process`, for dynamically loaded content.
    pub fn reprocess(&self) -> Result<JsValue, JsError> {
        stats_value(self.engine.reprocess())
    }

    /// Live counts and element collections.
    #[wasm_bindgen(js_name = getStats)]
    pub fn get_stats(&self) -> Result<JsValue, JsError> {
        live_stats_value(self.engine.stats())
    }

    /// Show equation identifiers.
    #[wasm_bindgen(js_name = enableDebug)]
    pub fn enable_debug(&self) -> Result<(), JsError> {
        Ok(self.engine.enable_debug()?)
    }

    /// Hide equation identifiers.
    #[wasm_bindgen(js_name = disableDebug)]
    pub fn disable_debug(&self) -> Result<(), JsError> {
        Ok(self.engine.disable_debug()?)
    }

    /// Arm the change monitor; returns `false` when it was already armed.
    #[wasm_bindgen(js_name = watchForChanges)]
    pub fn watch_for_changes(&self) -> Result<bool, JsError> {
        Ok(self.engine.watch_for_changes()? == WatchStatus::Armed)
    }

    /// Number of pipeline runs so far.
    #[wasm_bindgen(getter)]
    pub fn passes(&self) -> f64 {
        self.engine.passes() as f64
    }

    /// Version string.
    #[wasm_bindgen(getter)]
    pub fn version(&self) -> String {
        self.engine.version().to_string()
    }
}

impl EquationProcessor {
    fn with_config(config: EngineConfig) -> Result<EquationProcessor, JsError> {
        let document = BrowserDocument::from_window()?;
        let engine = EquationEngine::builder(document.clone(), document)
            .config(config)
            .engine(MathJaxEngine)
            .engine(KatexEngine)
            .build()?;
        Ok(Self { engine })
    }
}

/// Create a processor, schedule the first pass for when the document is
/// ready, and publish it as `window.EquationProcessor`.
#[wasm_bindgen]
pub fn install(options: JsValue) -> Result<EquationProcessor, JsError> {
    let options = parse_options(options)?;
    logger::init(level(options.log_level.as_deref()));
    let processor = EquationProcessor::with_config(options.config)?;

    processor.engine.start();
    if options.watch_for_changes.unwrap_or(false) {
        processor.engine.watch_for_changes()?;
    }

    let window = web_sys::window().ok_or_else(|| JsError::new("no global window"))?;
    Reflect::set(
        &window,
        &JsValue::from_str(GLOBAL_NAME),
        &JsValue::from(processor.clone()),
    )
    .map_err(|e| JsError::new(&browser::describe(&e)))?;

    log::info!("Equation Processor v{} loaded", eqmark_core::VERSION);
    Ok(processor)
}

/// Version of the browser build.
#[wasm_bindgen]
pub fn version() -> String {
    eqmark_core::VERSION.to_string()
}
