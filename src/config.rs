//! Filter configuration.
//!
//! Every option comes from an environment variable and is resolved once at
//! startup. The resulting [`Config`] is immutable and passed explicitly to
//! the transformer and the renderer.

use crate::error::FilterError;
use crate::format::ImageFormat;
use std::path::PathBuf;

pub const ENV_MERMAID_BIN: &str = "MERMAID_BIN";
pub const ENV_MERMAID_CONFIG: &str = "MERMAID_CONFIG";
pub const ENV_PUPPETEER_CFG: &str = "PUPPETEER_CFG";
pub const ENV_IMAGE_PREFIX: &str = "MERMAID_IMAGE_PREFIX";
pub const ENV_LATEX_FORMAT: &str = "MERMAID_LATEX_FORMAT";
pub const ENV_HTML_FORMAT: &str = "MERMAID_HTML_FORMAT";
pub const ENV_FORCE_FORMAT: &str = "MERMAID_FORCE_FORMAT";
pub const ENV_AUTO_PDF_FALLBACK: &str = "MERMAID_AUTO_PDF_FALLBACK";
pub const ENV_PDF_FIT: &str = "MERMAID_PDF_FIT";

/// Puppeteer config picked up from the working directory when present.
pub const LOCAL_PUPPETEER_CONFIG: &str = ".puppeteer.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// mermaid-cli executable (default: `mmdc` on PATH)
    pub mermaid_bin: String,

    /// Mermaid config JSON passed with `-c`
    pub mermaid_config: Option<PathBuf>,

    /// Puppeteer config JSON passed with `-p`
    pub puppeteer_config: Option<PathBuf>,

    /// Assets are written to `<image_prefix>-images/`
    pub image_prefix: String,

    /// Format for LaTeX/PDF and unrecognised targets
    pub latex_format: ImageFormat,

    /// Format for HTML targets
    pub html_format: ImageFormat,

    /// Overrides the target-based choice when set
    pub force_format: Option<ImageFormat>,

    /// Re-render as PDF when an SVG would lose `<foreignObject>` labels
    pub auto_pdf_fallback: bool,

    /// Pass `--pdfFit` when rendering PDF
    pub pdf_fit: bool,
}

fn default_mermaid_bin() -> String {
    "mmdc".to_string()
}

fn default_image_prefix() -> String {
    "mermaid".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mermaid_bin: default_mermaid_bin(),
            mermaid_config: None,
            puppeteer_config: None,
            image_prefix: default_image_prefix(),
            latex_format: ImageFormat::Svg,
            html_format: ImageFormat::Svg,
            force_format: None,
            auto_pdf_fallback: true,
            pdf_fit: true,
        }
    }
}

impl Config {
    /// Resolve the configuration from the process environment.
    pub fn from_env() -> Result<Self, FilterError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FilterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let config = Self {
            mermaid_bin: non_empty(ENV_MERMAID_BIN).unwrap_or(defaults.mermaid_bin),
            mermaid_config: non_empty(ENV_MERMAID_CONFIG).map(PathBuf::from),
            puppeteer_config: non_empty(ENV_PUPPETEER_CFG).map(PathBuf::from),
            image_prefix: lookup(ENV_IMAGE_PREFIX).unwrap_or(defaults.image_prefix),
            latex_format: parse_format(ENV_LATEX_FORMAT, non_empty(ENV_LATEX_FORMAT))?
                .unwrap_or(defaults.latex_format),
            html_format: parse_format(ENV_HTML_FORMAT, non_empty(ENV_HTML_FORMAT))?
                .unwrap_or(defaults.html_format),
            force_format: parse_format(ENV_FORCE_FORMAT, non_empty(ENV_FORCE_FORMAT))?,
            auto_pdf_fallback: parse_bool(lookup(ENV_AUTO_PDF_FALLBACK).as_deref(), defaults.auto_pdf_fallback),
            pdf_fit: parse_bool(lookup(ENV_PDF_FIT).as_deref(), defaults.pdf_fit),
        };

        log::debug!("Resolved configuration: {config:?}");
        Ok(config)
    }
}

fn parse_format(name: &'static str, value: Option<String>) -> Result<Option<ImageFormat>, FilterError> {
    value
        .map(|v| v.parse::<ImageFormat>())
        .transpose()
        .map_err(|message| FilterError::Config { name, message })
}

/// `1`, `true`, `yes`, `on` (any case) are true, anything else present is false.
pub fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value {
        None => default,
        Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
    }
}
