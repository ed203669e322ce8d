//! Render trigger: hands converted content to external typesetting engines.
//!
//! The engine never typesets anything itself. Adapters wrap whatever the host
//! offers (a TeX/MathML engine with a promise-based "typeset everything" call,
//! or a renderer that annotates a subtree given delimiter pairs) and report
//! their own availability. Failures are logged and never propagate.

use serde::Serialize;

use crate::config::Delimiter;
use crate::error::RenderError;

/// Adapter variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Placeholder adapter that renders nothing.
    None,
    /// Promise-based TeX/MathML engine (typesets the whole document).
    Tex,
    /// Delimiter-driven renderer (annotates a subtree).
    Delimiter,
}

/// What the trigger hands to each adapter.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Delimiter pairs for delimiter-driven engines.
    pub delimiters: &'a [Delimiter],
}

/// A typesetting engine adapter.
pub trait TypesetEngine {
    /// Adapter variant.
    fn kind(&self) -> EngineKind;

    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Capability probe. Unavailable adapters are skipped silently, as are
    /// [`EngineKind::Delimiter`] adapters when no delimiters are configured.
    fn is_available(&self) -> bool {
        true
    }

    /// Re-typeset the content root.
    ///
    /// Adapters with asynchronous completion return once the work is
    /// dispatched and log the eventual failure themselves.
    fn render(&self, request: &RenderRequest<'_>) -> Result<(), RenderError>;
}

/// Adapter for hosts without any typesetting engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEngine;

impl TypesetEngine for NoEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::None
    }

    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn render(&self, _: &RenderRequest<'_>) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Outcome of one trigger round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Adapters that accepted the render call.
    pub dispatched: Vec<String>,
    /// Adapters that reported themselves unavailable.
    pub skipped: Vec<String>,
    /// Adapters whose render call failed.
    pub failed: Vec<RenderError>,
}

impl RenderReport {
    /// Whether any adapter rendered.
    pub fn rendered(&self) -> bool {
        !self.dispatched.is_empty()
    }
}

/// Invoke every available adapter in order. A failure is logged and does not
/// stop the remaining adapters.
pub fn trigger(engines: &[Box<dyn TypesetEngine>], request: &RenderRequest<'_>) -> RenderReport {
    let mut report = RenderReport::default();
    for engine in engines {
        let name = engine.name().to_string();
        if !engine.is_available() {
            report.skipped.push(name);
            continue;
        }
        if engine.kind() == EngineKind::Delimiter && request.delimiters.is_empty() {
            log::debug!("{} skipped: no delimiters configured", name);
            report.skipped.push(name);
            continue;
        }
        log::debug!("triggering {} rendering", name);
        match engine.render(request) {
            Ok(()) => report.dispatched.push(name),
            Err(err) => {
                log::error!("{}", err);
                report.failed.push(err);
            }
        }
    }
    if !report.rendered() {
        log::debug!("no typesetting engine rendered; equations stay as styled containers");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Fake {
        kind: EngineKind,
        name: &'static str,
        available: bool,
        fail: bool,
        calls: Rc<Cell<u32>>,
    }

    impl TypesetEngine for Fake {
        fn kind(&self) -> EngineKind {
            self.kind
        }

        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn render(&self, request: &RenderRequest<'_>) -> Result<(), RenderError> {
            self.calls.set(self.calls.get() + 1);
            if self.kind == EngineKind::Delimiter {
                assert_eq!(request.delimiters.len(), 2);
            }
            if self.fail {
                Err(RenderError::new(self.name, "typeset rejected"))
            } else {
                Ok(())
            }
        }
    }

    fn fake(kind: EngineKind, name: &'static str, available: bool, fail: bool) -> (Box<dyn TypesetEngine>, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let engine = Fake {
            kind,
            name,
            available,
            fail,
            calls: calls.clone(),
        };
        (Box::new(engine), calls)
    }

    #[test]
    fn failing_engine_does_not_stop_the_other() {
        let (tex, tex_calls) = fake(EngineKind::Tex, "mathjax", true, true);
        let (katex, katex_calls) = fake(EngineKind::Delimiter, "katex", true, false);
        let delimiters = Delimiter::defaults();
        let report = trigger(&[tex, katex], &RenderRequest { delimiters: &delimiters });
        assert_eq!(tex_calls.get(), 1);
        assert_eq!(katex_calls.get(), 1);
        assert_eq!(report.dispatched, vec!["katex".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].engine, "mathjax");
    }

    #[test]
    fn unavailable_engines_are_skipped() {
        let (tex, tex_calls) = fake(EngineKind::Tex, "mathjax", false, false);
        let delimiters = Delimiter::defaults();
        let report = trigger(
            &[tex, Box::new(NoEngine)],
            &RenderRequest { delimiters: &delimiters },
        );
        assert_eq!(tex_calls.get(), 0);
        assert_eq!(report.skipped, vec!["mathjax".to_string(), "none".to_string()]);
        assert!(!report.rendered());
    }

    #[test]
    fn delimiter_engine_needs_delimiters() {
        let (tex, tex_calls) = fake(EngineKind::Tex, "mathjax", true, false);
        let (katex, katex_calls) = fake(EngineKind::Delimiter, "katex", true, false);
        let report = trigger(&[tex, katex], &RenderRequest { delimiters: &[] });
        assert_eq!(tex_calls.get(), 1);
        assert_eq!(katex_calls.get(), 0);
        assert_eq!(report.dispatched, vec!["mathjax".to_string()]);
        assert_eq!(report.skipped, vec!["katex".to_string()]);
    }

    #[test]
    fn no_engines_is_not_an_error() {
        let report = trigger(&[], &RenderRequest { delimiters: &[] });
        assert_eq!(report, RenderReport::default());
    }
}
