//! Detection of SVG output that PDF pipelines cannot render faithfully.
//!
//! mermaid-cli emits flowchart labels as HTML inside `<foreignObject>`,
//! which rsvg-convert (pandoc's SVG-to-PDF path) drops silently.

use std::fs;
use std::path::Path;

const FOREIGN_OBJECT_MARKER: &[u8] = b"<foreignObject";

/// Whether the file at `path` contains a `<foreignObject` element.
///
/// An unreadable file counts as not containing one.
pub fn has_foreign_object(path: &Path) -> bool {
    match fs::read(path) {
        Ok(bytes) => contains_marker(&bytes),
        Err(e) => {
            log::debug!("Could not inspect {} for foreignObject: {e}", path.display());
            false
        }
    }
}

fn contains_marker(haystack: &[u8]) -> bool {
    haystack
        .windows(FOREIGN_OBJECT_MARKER.len())
        .any(|window| window == FOREIGN_OBJECT_MARKER)
}
