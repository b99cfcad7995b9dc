use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::exit_codes;

/// Errors that can stop the filter
#[derive(Debug, Error)]
pub enum FilterError {
    /// An environment option holds a value the filter cannot use
    #[error("Invalid value for {name}: {message}")]
    Config { name: &'static str, message: String },

    /// Reading or writing an asset or the document failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    /// The JSON is valid but not shaped like a pandoc document
    #[error("Malformed pandoc document: {0}")]
    Document(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The renderer binary could not be started
    #[error("Could not run '{bin}': {source}. Install mermaid-cli (npm install -g @mermaid-js/mermaid-cli) or set MERMAID_BIN")]
    RendererUnavailable { bin: String, source: io::Error },

    /// The renderer ran and exited with a failure status
    #[error("Failed to render Mermaid diagram with mermaid-cli.")]
    RenderFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl FilterError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code matching this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RenderFailed { exit_code, .. } => exit_code.unwrap_or(exit_codes::RENDER_FAILED),
            _ => exit_codes::TOOL_ERROR,
        }
    }
}
