//! Adapters for the typesetting engines a page may have loaded.

use eqmark_core::{EngineKind, RenderError, RenderRequest, TypesetEngine};
use js_sys::{Function, Promise, Reflect};
use serde::Serialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};

use crate::browser::describe;

fn global(name: &str) -> Option<JsValue> {
    let window = web_sys::window()?;
    Reflect::get(&window, &JsValue::from_str(name))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

fn method(target: &JsValue, name: &str) -> Option<Function> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
}

/// `window.MathJax.typesetPromise()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathJaxEngine;

impl TypesetEngine for MathJaxEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Tex
    }

    fn name(&self) -> &str {
        "MathJax"
    }

    fn is_available(&self) -> bool {
        global("MathJax").is_some_and(|mathjax| method(&mathjax, "typesetPromise").is_some())
    }

    fn render(&self, _: &RenderRequest<'_>) -> Result<(), RenderError> {
        let mathjax = global("MathJax").ok_or_else(|| RenderError::new(self.name(), "not loaded"))?;
        let typeset = method(&mathjax, "typesetPromise")
            .ok_or_else(|| RenderError::new(self.name(), "typesetPromise is missing"))?;
        let promise: Promise = typeset
            .call0(&mathjax)
            .map_err(|e| RenderError::new(self.name(), describe(&e)))?
            .dyn_into()
            .map_err(|_| RenderError::new(self.name(), "typesetPromise did not return a promise"))?;

        log::info!("triggering MathJax rendering");
        spawn_local(async move {
            match JsFuture::from(promise).await {
                Ok(_) => log::info!("MathJax rendering complete"),
                Err(err) => log::error!("MathJax error: {}", describe(&err)),
            }
        });
        Ok(())
    }
}

#[derive(Serialize)]
struct AutoRenderOptions<'a> {
    delimiters: &'a [eqmark_core::Delimiter],
}

/// `renderMathInElement(document.body, { delimiters })` from KaTeX's
/// auto-render extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct KatexEngine;

impl TypesetEngine for KatexEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Delimiter
    }

    fn name(&self) -> &str {
        "KaTeX"
    }

    fn is_available(&self) -> bool {
        global("katex").is_some() && global("renderMathInElement").is_some()
    }

    fn render(&self, request: &RenderRequest<'_>) -> Result<(), RenderError> {
        let render = global("renderMathInElement")
            .and_then(|value| value.dyn_into::<Function>().ok())
            .ok_or_else(|| RenderError::new(self.name(), "renderMathInElement is missing"))?;
        let body = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.body())
            .ok_or_else(|| RenderError::new(self.name(), "document has no body"))?;
        let options = serde_wasm_bindgen::to_value(&AutoRenderOptions {
            delimiters: request.delimiters,
        })
        .map_err(|e| RenderError::new(self.name(), e.to_string()))?;

        log::info!("triggering KaTeX rendering");
        render
            .call2(&JsValue::NULL, &body, &options)
            .map_err(|e| RenderError::new(self.name(), describe(&e)))?;
        log::info!("KaTeX rendering complete");
        Ok(())
    }
}
