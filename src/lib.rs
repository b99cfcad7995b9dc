//! A pandoc filter that renders Mermaid code blocks to images.
//!
//! Pandoc hands the document AST to the filter as JSON. Every `CodeBlock`
//! with the `mermaid` class is written to `<prefix>-images/<hash>.mmd`,
//! rendered by mermaid-cli next to it and replaced by an image paragraph.
//! Rendered images are reused as long as the diagram text is unchanged.

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod fallback;
pub mod format;
pub mod naming;
pub mod pandoc;
pub mod renderer;
pub mod transform;

pub use config::Config;
pub use error::FilterError;
pub use format::{ImageFormat, OutputTarget};
pub use renderer::{MermaidCli, RenderRequest, Renderer};
pub use transform::DiagramTransformer;

use serde_json::Value;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Filter a JSON document read from `input` into `output`.
///
/// Assets are written relative to `work_dir`.
pub fn run_filter<R, W>(
    config: Config,
    work_dir: impl Into<PathBuf>,
    target: &str,
    input: R,
    mut output: W,
) -> Result<(), FilterError>
where
    R: Read,
    W: Write,
{
    let work_dir = work_dir.into();
    let renderer = MermaidCli::new(&config, work_dir.clone());
    let transformer = DiagramTransformer::new(config, renderer, work_dir);

    let doc: Value = serde_json::from_reader(input)?;
    let filtered = pandoc::filter_document(doc, &transformer, target)?;

    serde_json::to_writer(&mut output, &filtered)?;
    output.flush().map_err(|e| FilterError::io("<output>", e))
}
