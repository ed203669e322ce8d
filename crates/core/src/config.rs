//! Engine configuration.
//!
//! Every field has a default matching the upstream converter's output, so an
//! empty JSON object (or `EngineConfig::default()`) is a working setup.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Identifier of the injected style element.
pub const DEFAULT_STYLE_ID: &str = "equation-processor-styles";
/// Class toggled on the content root while debug mode is on.
pub const DEFAULT_DEBUG_CLASS: &str = "debug-equations";
/// Class carried by inline equation containers.
pub const DEFAULT_INLINE_CLASS: &str = "inlineMath";
/// Class carried by display equation containers.
pub const DEFAULT_DISPLAY_CLASS: &str = "Math_box";
/// Viewport width (px) below which display equations shrink.
pub const DEFAULT_MOBILE_BREAKPOINT_PX: u32 = 768;

/// Literal sentinel tokens wrapping equation payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerTokens {
    /// Opens an inline marker.
    #[serde(alias = "inlineStart", alias = "inline_prefix")]
    pub inline_start: String,
    /// Closes an inline marker.
    #[serde(alias = "inlineEnd", alias = "inline_suffix")]
    pub inline_end: String,
    /// Opens a display marker.
    #[serde(alias = "displayStart", alias = "display_prefix")]
    pub display_start: String,
    /// Closes a display marker.
    #[serde(alias = "displayEnd", alias = "display_suffix")]
    pub display_end: String,
}

impl Default for MarkerTokens {
    fn default() -> Self {
        Self {
            inline_start: "MATHSTARTINLINE".to_string(),
            inline_end: "MATHENDINLINE".to_string(),
            display_start: "MATHSTARTDISPLAY".to_string(),
            display_end: "MATHENDDISPLAY".to_string(),
        }
    }
}

impl MarkerTokens {
    /// Check tokens are usable as unambiguous sentinels.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, token) in [
            ("inline_start", &self.inline_start),
            ("inline_end", &self.inline_end),
            ("display_start", &self.display_start),
            ("display_end", &self.display_end),
        ] {
            if token.is_empty() {
                return Err(ConfigError::EmptyToken { field });
            }
            if token.contains(['\n', '\r']) {
                return Err(ConfigError::MultilineToken { field });
            }
        }
        if self.inline_start == self.inline_end {
            return Err(ConfigError::AmbiguousTokens {
                kind: "inline",
                token: self.inline_start.clone(),
            });
        }
        if self.display_start == self.display_end {
            return Err(ConfigError::AmbiguousTokens {
                kind: "display",
                token: self.display_start.clone(),
            });
        }
        Ok(())
    }
}

/// A delimiter pair handed to delimiter-based typesetting engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiter {
    /// Opening delimiter, e.g. `\(`.
    pub left: String,
    /// Closing delimiter, e.g. `\)`.
    pub right: String,
    /// Whether the pair denotes display math.
    pub display: bool,
}

impl Delimiter {
    /// Create a delimiter pair.
    pub fn new(left: impl Into<String>, right: impl Into<String>, display: bool) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            display,
        }
    }

    /// `\[ ... \]` display and `\( ... \)` inline, in that order.
    pub fn defaults() -> Vec<Delimiter> {
        vec![
            Delimiter::new("\\[", "\\]", true),
            Delimiter::new("\\(", "\\)", false),
        ]
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sentinel tokens recognised by the scanner.
    pub markers: MarkerTokens,
    /// Class of inline equation containers.
    #[serde(alias = "inlineClass")]
    pub inline_class: String,
    /// Class of display equation containers.
    #[serde(alias = "displayClass")]
    pub display_class: String,
    /// Reserved identifier of the injected style element.
    #[serde(alias = "styleId")]
    pub style_id: String,
    /// Class toggled on the content root by debug mode.
    #[serde(alias = "debugClass")]
    pub debug_class: String,
    /// Viewport width below which display equations shrink.
    #[serde(alias = "mobileBreakpointPx")]
    pub mobile_breakpoint_px: u32,
    /// Delimiters passed to delimiter-based typesetting engines.
    pub delimiters: Vec<Delimiter>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            markers: MarkerTokens::default(),
            inline_class: DEFAULT_INLINE_CLASS.to_string(),
            display_class: DEFAULT_DISPLAY_CLASS.to_string(),
            style_id: DEFAULT_STYLE_ID.to_string(),
            debug_class: DEFAULT_DEBUG_CLASS.to_string(),
            mobile_breakpoint_px: DEFAULT_MOBILE_BREAKPOINT_PX,
            delimiters: Delimiter::defaults(),
        }
    }
}

impl EngineConfig {
    /// Decode and validate a JSON configuration object.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate tokens and names.
    ///
    /// Names are restricted to `[A-Za-z0-9_-]` because they are written into
    /// attribute values, CSS selectors and attribute selectors verbatim.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.markers.validate()?;
        for (field, value) in [
            ("inline_class", &self.inline_class),
            ("display_class", &self.display_class),
            ("style_id", &self.style_id),
            ("debug_class", &self.debug_class),
        ] {
            if !is_plain_name(value) {
                return Err(ConfigError::InvalidName {
                    field,
                    value: value.clone(),
                });
            }
        }
        if self.inline_class == self.display_class {
            return Err(ConfigError::InvalidName {
                field: "display_class",
                value: self.display_class.clone(),
            });
        }
        Ok(())
    }
}

fn is_plain_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.markers.inline_start, "MATHSTARTINLINE");
        assert_eq!(config.delimiters.len(), 2);
    }

    #[test]
    fn accepts_camel_case_and_converter_aliases() {
        let json = r#"{
            "inlineClass": "eq-inline",
            "markers": { "inline_prefix": "EQIN", "inlineEnd": "EQOUT" }
        }"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.inline_class, "eq-inline");
        assert_eq!(config.markers.inline_start, "EQIN");
        assert_eq!(config.markers.inline_end, "EQOUT");
        assert_eq!(config.markers.display_start, "MATHSTARTDISPLAY");
    }

    #[test]
    fn rejects_empty_token() {
        let mut config = EngineConfig::default();
        config.markers.display_end.clear();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EmptyToken {
                field: "display_end"
            }
        ));
    }

    #[test]
    fn rejects_identical_start_and_end() {
        let mut config = EngineConfig::default();
        config.markers.inline_end = config.markers.inline_start.clone();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::AmbiguousTokens { kind: "inline", .. })
        ));
    }

    #[test]
    fn rejects_class_names_with_quotes() {
        let mut config = EngineConfig::default();
        config.inline_class = "bad\"class".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("inline_class"));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            EngineConfig::from_json("{ nope"),
            Err(ConfigError::Json(_))
        ));
    }
}
