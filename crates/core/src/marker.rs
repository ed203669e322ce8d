//! Marker grammar: sentinel tokens and the matching rule.
//!
//! An inline marker looks like `MATHSTARTINLINE\(x+1\)MATHENDINLINE` and a
//! display marker like `MATHSTARTDISPLAY\[y=2x\]MATHENDDISPLAY`. The backslash
//! before each bracket is optional. Matching is non-greedy and never crosses a
//! line break; a start token without a terminator is left alone.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::config::MarkerTokens;
use crate::error::ConfigError;

static DEFAULT_GRAMMAR: Lazy<MarkerGrammar> = Lazy::new(|| {
    MarkerGrammar::new(&MarkerTokens::default()).expect("default marker tokens compile")
});

/// Equation flavour carried by a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EquationKind {
    /// Flows with the surrounding text, `\( ... \)`.
    Inline,
    /// Centered block, `\[ ... \]`.
    Display,
}

impl EquationKind {
    /// Scan order within one pass: inline markers first, then display.
    pub const ALL: [EquationKind; 2] = [EquationKind::Inline, EquationKind::Display];

    /// Lowercase name used in identifiers and attributes.
    pub fn as_str(self) -> &'static str {
        match self {
            EquationKind::Inline => "inline",
            EquationKind::Display => "display",
        }
    }

    fn brackets(self) -> (&'static str, &'static str) {
        match self {
            EquationKind::Inline => ("(", ")"),
            EquationKind::Display => ("[", "]"),
        }
    }
}

impl fmt::Display for EquationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One marker occurrence found in a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerMatch<'a> {
    /// Marker kind.
    pub kind: EquationKind,
    /// Byte offset of the start token.
    pub start: usize,
    /// Byte offset just past the end token.
    pub end: usize,
    /// Equation source between the tokens, delimiters included.
    pub payload: &'a str,
}

#[derive(Debug, Clone)]
struct KindGrammar {
    kind: EquationKind,
    start_token: String,
    pattern: Regex,
}

impl KindGrammar {
    fn new(kind: EquationKind, start_token: &str, end_token: &str) -> Result<Self, ConfigError> {
        let (open, close) = kind.brackets();
        let pattern = Regex::new(&format!(
            r"{}(\\?{}.*?\\?{}){}",
            regex::escape(start_token),
            regex::escape(open),
            regex::escape(close),
            regex::escape(end_token),
        ))?;
        Ok(Self {
            kind,
            start_token: start_token.to_string(),
            pattern,
        })
    }

    /// Finds the first marker at or after `from`.
    ///
    /// When the span between a start token and its terminator contains another
    /// start token of the same kind, the later one opens the marker and the
    /// earlier text is left as it is.
    fn find_at<'a>(&self, text: &'a str, from: usize) -> Option<MarkerMatch<'a>> {
        let outer = self.pattern.captures_at(text, from)?;
        let whole = outer.get(0)?;

        let inner_from = whole.start() + self.start_token.len();
        let mut inner_starts: Vec<usize> = text[inner_from..whole.end()]
            .match_indices(self.start_token.as_str())
            .map(|(offset, _)| inner_from + offset)
            .collect();

        while let Some(candidate) = inner_starts.pop() {
            if let Some(inner) = self.pattern.captures_at(text, candidate)
                && let Some(m) = self.to_match(&inner)
                && m.start == candidate
            {
                return Some(m);
            }
        }

        self.to_match(&outer)
    }

    fn to_match<'a>(&self, captures: &regex::Captures<'a>) -> Option<MarkerMatch<'a>> {
        let whole = captures.get(0)?;
        let payload = captures.get(1)?;
        Some(MarkerMatch {
            kind: self.kind,
            start: whole.start(),
            end: whole.end(),
            payload: payload.as_str(),
        })
    }
}

/// Compiled sentinel grammar for both marker kinds.
#[derive(Debug, Clone)]
pub struct MarkerGrammar {
    inline: KindGrammar,
    display: KindGrammar,
    watch_patterns: Vec<String>,
}

impl MarkerGrammar {
    /// Compile a grammar from validated tokens.
    pub fn new(tokens: &MarkerTokens) -> Result<Self, ConfigError> {
        tokens.validate()?;
        let inline = KindGrammar::new(EquationKind::Inline, &tokens.inline_start, &tokens.inline_end)?;
        let display = KindGrammar::new(
            EquationKind::Display,
            &tokens.display_start,
            &tokens.display_end,
        )?;
        let watch_patterns = watch_patterns(tokens);
        Ok(Self {
            inline,
            display,
            watch_patterns,
        })
    }

    /// Grammar for the default `MATHSTART*`/`MATHEND*` tokens.
    pub fn standard() -> &'static MarkerGrammar {
        &DEFAULT_GRAMMAR
    }

    fn kind(&self, kind: EquationKind) -> &KindGrammar {
        match kind {
            EquationKind::Inline => &self.inline,
            EquationKind::Display => &self.display,
        }
    }

    /// Start token of the given kind.
    pub fn start_token(&self, kind: EquationKind) -> &str {
        &self.kind(kind).start_token
    }

    /// Find the first marker of `kind` at or after byte offset `from`.
    pub fn find_at<'a>(
        &self,
        kind: EquationKind,
        text: &'a str,
        from: usize,
    ) -> Option<MarkerMatch<'a>> {
        if from > text.len() {
            return None;
        }
        self.kind(kind).find_at(text, from)
    }

    /// Iterate all markers of `kind` in `text`, left to right.
    pub fn find_iter<'g, 'a>(
        &'g self,
        kind: EquationKind,
        text: &'a str,
    ) -> impl Iterator<Item = MarkerMatch<'a>> + 'g
    where
        'a: 'g,
    {
        let mut cursor = 0;
        std::iter::from_fn(move || {
            let found = self.find_at(kind, text, cursor)?;
            cursor = found.end;
            Some(found)
        })
    }

    /// Substrings whose presence in new content warrants a rescan.
    pub fn watch_patterns(&self) -> &[String] {
        &self.watch_patterns
    }
}

/// Shared prefixes shorter than this match too much ordinary markup to be
/// worth watching on their own.
const MIN_WATCH_PREFIX: usize = 4;

/// Common prefixes of the start tokens and of the end tokens, or the tokens
/// themselves when the shared prefix is too short.
fn watch_patterns(tokens: &MarkerTokens) -> Vec<String> {
    let mut patterns = Vec::with_capacity(4);
    for (a, b) in [
        (&tokens.inline_start, &tokens.display_start),
        (&tokens.inline_end, &tokens.display_end),
    ] {
        let prefix = common_prefix(a, b);
        if prefix.chars().count() < MIN_WATCH_PREFIX {
            patterns.push(a.clone());
            patterns.push(b.clone());
        } else {
            patterns.push(prefix.to_string());
        }
    }
    patterns.dedup();
    patterns
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map(|((i, c), _)| i + c.len_utf8())
        .unwrap_or(0);
    &a[..len]
}
