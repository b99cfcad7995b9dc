//! Image formats and pandoc output targets.
//!
//! The format used for a diagram is picked by [`select_format`], an ordered
//! rule table where the first matching rule wins.

use crate::config::Config;
use std::fmt;
use std::str::FromStr;

/// Image formats mermaid-cli can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Svg,
    Png,
    Pdf,
}

impl ImageFormat {
    /// File extension, also used as the type hint on the emitted image.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            "pdf" => Ok(Self::Pdf),
            other => Err(format!("unknown image format '{other}' (expected svg, png or pdf)")),
        }
    }
}

/// The pandoc output format a filter run is producing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// No target given (pandoc's JSON output, or a manual run)
    Unspecified,
    Web,
    Latex,
    Pdf,
    Other(String),
}

impl OutputTarget {
    pub fn from_token(token: &str) -> Self {
        match token {
            "" => Self::Unspecified,
            "html" | "html4" | "html5" => Self::Web,
            "latex" => Self::Latex,
            "pdf" => Self::Pdf,
            other => Self::Other(other.to_string()),
        }
    }

    /// Targets whose SVG goes through an SVG-to-PDF converter that drops `<foreignObject>`.
    pub fn accepts_pdf_fallback(&self) -> bool {
        matches!(self, Self::Unspecified | Self::Latex | Self::Pdf)
    }
}

/// Where a selected format came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatRule {
    Forced,
    Web,
    HighFidelity,
    Default,
}

const RULES: [FormatRule; 4] = [
    FormatRule::Forced,
    FormatRule::Web,
    FormatRule::HighFidelity,
    FormatRule::Default,
];

impl FormatRule {
    fn resolve(self, config: &Config, target: &OutputTarget) -> Option<ImageFormat> {
        match self {
            Self::Forced => config.force_format,
            Self::Web => matches!(target, OutputTarget::Web).then_some(config.html_format),
            Self::HighFidelity => {
                matches!(target, OutputTarget::Latex | OutputTarget::Pdf).then_some(config.latex_format)
            }
            Self::Default => Some(config.latex_format),
        }
    }
}

/// Pick the image format for `target`, reporting which rule matched.
pub fn select_format_with_rule(config: &Config, target: &OutputTarget) -> (ImageFormat, FormatRule) {
    RULES
        .iter()
        .find_map(|rule| rule.resolve(config, target).map(|format| (format, *rule)))
        // Default always resolves
        .unwrap_or((config.latex_format, FormatRule::Default))
}

pub fn select_format(config: &Config, target: &OutputTarget) -> ImageFormat {
    select_format_with_rule(config, target).0
}
