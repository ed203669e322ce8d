//! Scanner/transformer: splits content into text and equation segments.
//!
//! A [`Scanner`] owns the per-kind counters of one pass. Feeding it several
//! texts (one per text node, in document order) numbers the equations exactly
//! as a single scan over the concatenated content would.

use serde::Serialize;
use std::fmt::Write as _;

use crate::config::EngineConfig;
use crate::marker::{EquationKind, MarkerGrammar};

/// Per-kind equation counts for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassCounts {
    /// Inline equations converted.
    pub inline: u32,
    /// Display equations converted.
    pub display: u32,
}

impl PassCounts {
    /// Sum over both kinds.
    pub fn total(&self) -> u32 {
        self.inline + self.display
    }

    fn advance(&mut self, kind: EquationKind) -> u32 {
        let slot = match kind {
            EquationKind::Inline => &mut self.inline,
            EquationKind::Display => &mut self.display,
        };
        *slot += 1;
        *slot
    }
}

/// A materialized equation: the payload plus its per-pass identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EquationElement<'a> {
    /// Marker kind.
    pub kind: EquationKind,
    /// 1-based ordinal within the pass, per kind.
    pub sequence_id: u32,
    /// Equation source, unmodified.
    pub content: &'a str,
}

impl EquationElement<'_> {
    /// Identifier written to `data-equation-id`, e.g. `inline-3`.
    pub fn equation_id(&self) -> String {
        format!("{}-{}", self.kind, self.sequence_id)
    }
}

/// Piece of scanned content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text outside any marker, kept verbatim.
    Text(&'a str),
    /// A converted marker.
    Equation(EquationElement<'a>),
}

/// Scans texts for markers, numbering matches across one pass.
#[derive(Debug)]
pub struct Scanner<'g> {
    grammar: &'g MarkerGrammar,
    counts: PassCounts,
}

impl<'g> Scanner<'g> {
    /// Start a fresh pass; numbering begins at 1 for each kind.
    pub fn new(grammar: &'g MarkerGrammar) -> Self {
        Self {
            grammar,
            counts: PassCounts::default(),
        }
    }

    /// Counts assigned so far in this pass.
    pub fn counts(&self) -> PassCounts {
        self.counts
    }

    /// Roll counters back, e.g. when the host refused to materialize the
    /// segments of the last text.
    pub fn restore(&mut self, counts: PassCounts) {
        self.counts = counts;
    }

    /// Split `text` into segments, inline markers first, then display markers
    /// in the text left between them. Returns `None` when `text` holds no
    /// well-formed marker.
    pub fn segment<'a>(&mut self, text: &'a str) -> Option<Vec<Segment<'a>>> {
        let mut segments = vec![Segment::Text(text)];
        let mut found = false;
        for kind in EquationKind::ALL {
            let mut next = Vec::with_capacity(segments.len());
            for segment in segments {
                match segment {
                    Segment::Text(piece) => found |= self.split_kind(kind, piece, &mut next),
                    equation => next.push(equation),
                }
            }
            segments = next;
        }
        found.then_some(segments)
    }

    fn split_kind<'a>(
        &mut self,
        kind: EquationKind,
        text: &'a str,
        out: &mut Vec<Segment<'a>>,
    ) -> bool {
        let grammar = self.grammar;
        let mut cursor = 0;
        let mut found = false;
        for m in grammar.find_iter(kind, text) {
            if m.start > cursor {
                out.push(Segment::Text(&text[cursor..m.start]));
            }
            out.push(Segment::Equation(EquationElement {
                kind,
                sequence_id: self.counts.advance(kind),
                content: m.payload,
            }));
            cursor = m.end;
            found = true;
        }
        if cursor < text.len() {
            out.push(Segment::Text(&text[cursor..]));
        }
        found
    }
}

/// How equation elements are tagged and classed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementLayout {
    inline_class: String,
    display_class: String,
}

impl Default for ElementLayout {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ElementLayout {
    /// Layout using the configured class names.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            inline_class: config.inline_class.clone(),
            display_class: config.display_class.clone(),
        }
    }

    /// `span` for inline equations, `div` for display equations.
    pub fn tag(&self, kind: EquationKind) -> &'static str {
        match kind {
            EquationKind::Inline => "span",
            EquationKind::Display => "div",
        }
    }

    /// Class carried by equations of `kind`.
    pub fn class(&self, kind: EquationKind) -> &str {
        match kind {
            EquationKind::Inline => &self.inline_class,
            EquationKind::Display => &self.display_class,
        }
    }

    /// Attributes of the container element, in output order.
    pub fn attributes(&self, element: &EquationElement<'_>) -> Vec<(&'static str, String)> {
        vec![
            ("class", self.class(element.kind).to_string()),
            ("data-equation-kind", element.kind.as_str().to_string()),
            ("data-equation-id", element.equation_id()),
        ]
    }

    /// Serialize an element. The payload is emitted as is, so it must already
    /// be markup-safe (it came out of markup in the first place).
    pub fn to_html(&self, element: &EquationElement<'_>) -> String {
        let tag = self.tag(element.kind);
        let mut html = String::with_capacity(element.content.len() + 96);
        html.push('<');
        html.push_str(tag);
        for (name, value) in self.attributes(element) {
            write!(html, " {}=\"{}\"", name, value).ok();
        }
        html.push('>');
        html.push_str(element.content);
        write!(html, "</{}>", tag).ok();
        html
    }

    /// Serialize segments back into markup.
    pub fn render(&self, segments: &[Segment<'_>]) -> String {
        let mut html = String::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => html.push_str(text),
                Segment::Equation(element) => html.push_str(&self.to_html(element)),
            }
        }
        html
    }
}

/// Result of transforming one content string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// Content with markers replaced by equation elements.
    pub content: String,
    /// Equations converted in this pass.
    pub counts: PassCounts,
}

/// Transform a content string in one pass.
pub fn transform(content: &str, grammar: &MarkerGrammar, layout: &ElementLayout) -> Transformed {
    let mut scanner = Scanner::new(grammar);
    let content = match scanner.segment(content) {
        Some(segments) => layout.render(&segments),
        None => content.to_string(),
    };
    Transformed {
        content,
        counts: scanner.counts(),
    }
}

/// Start tokens versus well-formed markers, for one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCensus {
    /// Occurrences of the start token.
    pub start_tokens: u32,
    /// Well-formed markers.
    pub well_formed: u32,
}

impl KindCensus {
    /// Start tokens that do not open a well-formed marker.
    pub fn malformed(&self) -> u32 {
        self.start_tokens.saturating_sub(self.well_formed)
    }
}

/// Marker inventory of a text, used to verify converter output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MarkerCensus {
    /// Inline marker counts.
    pub inline: KindCensus,
    /// Display marker counts.
    pub display: KindCensus,
}

impl MarkerCensus {
    /// Malformed start tokens over both kinds.
    pub fn malformed(&self) -> u32 {
        self.inline.malformed() + self.display.malformed()
    }
}

/// Count start tokens and well-formed markers in `text` without rewriting it.
pub fn count_markers(text: &str, grammar: &MarkerGrammar) -> MarkerCensus {
    let mut scanner = Scanner::new(grammar);
    scanner.segment(text);
    let counts = scanner.counts();
    let tokens = |kind| text.matches(grammar.start_token(kind)).count() as u32;
    MarkerCensus {
        inline: KindCensus {
            start_tokens: tokens(EquationKind::Inline),
            well_formed: counts.inline,
        },
        display: KindCensus {
            start_tokens: tokens(EquationKind::Display),
            well_formed: counts.display,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(content: &str) -> Transformed {
        transform(content, MarkerGrammar::standard(), &ElementLayout::default())
    }

    #[test]
    fn converts_inline_and_display_markers() {
        let out = run(r"See MATHSTARTINLINE\(x+1\)MATHENDINLINE and MATHSTARTDISPLAY\[y=2x\]MATHENDDISPLAY.");
        assert_eq!(out.counts, PassCounts { inline: 1, display: 1 });
        assert_eq!(out.counts.total(), 2);
        insta::assert_snapshot!(out.content, @r#"See <span class="inlineMath" data-equation-kind="inline" data-equation-id="inline-1">\(x+1\)</span> and <div class="Math_box" data-equation-kind="display" data-equation-id="display-1">\[y=2x\]</div>."#);
    }

    #[test]
    fn numbers_each_kind_from_one_in_order() {
        let out = run(concat!(
            r"MATHSTARTDISPLAY\[a\]MATHENDDISPLAY ",
            r"MATHSTARTINLINE\(b\)MATHENDINLINE ",
            r"MATHSTARTINLINE\(c\)MATHENDINLINE ",
            r"MATHSTARTDISPLAY\[d\]MATHENDDISPLAY",
        ));
        assert_eq!(out.counts, PassCounts { inline: 2, display: 2 });
        let ids: Vec<_> = ["display-1", "inline-1", "inline-2", "display-2"]
            .iter()
            .map(|id| out.content.find(id).unwrap())
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "{}", out.content);
        assert!(out.content.contains(r#"data-equation-id="inline-2">\(c\)</span>"#));
    }

    #[test]
    fn malformed_prefix_survives_and_is_not_counted() {
        let input = r"MATHSTARTINLINE\(a\) MATHSTARTINLINE\(b\)MATHENDINLINE";
        let out = run(input);
        assert_eq!(out.counts.inline, 1);
        assert!(out.content.starts_with(r"MATHSTARTINLINE\(a\) "));
        assert!(out.content.contains(r#"data-equation-id="inline-1">\(b\)</span>"#));
    }

    #[test]
    fn unterminated_marker_is_left_untouched() {
        let input = r"before MATHSTARTDISPLAY\[x\] after";
        let out = run(input);
        assert_eq!(out.counts, PassCounts::default());
        assert_eq!(out.content, input);
    }

    #[test]
    fn converted_content_is_stable() {
        let first = run(r"MATHSTARTINLINE\(x\)MATHENDINLINE MATHSTARTDISPLAY\[y\]MATHENDDISPLAY");
        let second = run(&first.content);
        assert_eq!(second.counts, PassCounts::default());
        assert_eq!(second.content, first.content);
    }

    #[test]
    fn scanner_numbering_continues_across_texts() {
        let grammar = MarkerGrammar::standard();
        let mut scanner = Scanner::new(grammar);
        assert!(scanner.segment("plain").is_none());
        let first = scanner
            .segment(r"MATHSTARTINLINE\(a\)MATHENDINLINE")
            .unwrap();
        let second = scanner
            .segment(r"x MATHSTARTINLINE\(b\)MATHENDINLINE y")
            .unwrap();
        assert_eq!(
            first,
            vec![Segment::Equation(EquationElement {
                kind: EquationKind::Inline,
                sequence_id: 1,
                content: r"\(a\)",
            })]
        );
        assert_eq!(second.len(), 3);
        assert!(matches!(
            second[1],
            Segment::Equation(EquationElement { sequence_id: 2, .. })
        ));
        assert_eq!(scanner.counts().inline, 2);
    }

    #[test]
    fn restore_rolls_back_numbering() {
        let mut scanner = Scanner::new(MarkerGrammar::standard());
        let before = scanner.counts();
        scanner.segment(r"MATHSTARTINLINE\(a\)MATHENDINLINE");
        scanner.restore(before);
        let again = scanner
            .segment(r"MATHSTARTINLINE\(b\)MATHENDINLINE")
            .unwrap();
        assert!(matches!(
            again[0],
            Segment::Equation(EquationElement { sequence_id: 1, .. })
        ));
    }

    #[test]
    fn census_reports_malformed_markers() {
        let text = r"MATHSTARTINLINE\(a\) MATHSTARTINLINE\(b\)MATHENDINLINE MATHSTARTDISPLAY\[c\]MATHENDDISPLAY";
        let census = count_markers(text, MarkerGrammar::standard());
        assert_eq!(census.inline.start_tokens, 2);
        assert_eq!(census.inline.well_formed, 1);
        assert_eq!(census.display.well_formed, 1);
        assert_eq!(census.malformed(), 1);
    }
}
