//! Exit codes for pandoc-mermaid
//!
//! A failing mermaid-cli run propagates its own exit code, so these only
//! cover outcomes the filter decides on by itself.

/// Renderer failed without reporting an exit code (e.g. killed by a signal)
pub const RENDER_FAILED: i32 = 1;

/// Tool error - Configuration error, unreadable document, I/O error or missing renderer
pub const TOOL_ERROR: i32 = 2;

/// Helper functions for consistent exit behavior
pub mod exit {
    use super::TOOL_ERROR;

    /// Exit with tool error code (2)
    pub fn tool_error() -> ! {
        std::process::exit(TOOL_ERROR);
    }

    /// Exit with the code reported by the renderer
    pub fn renderer_status(code: i32) -> ! {
        std::process::exit(code);
    }
}
