//! Content-addressed asset naming
//!
//! Every diagram maps to `<prefix>-images/<hash>` where `<hash>` is the
//! BLAKE3 digest of the diagram text. Identical text under the same prefix
//! always lands on the same files, which is what lets a rendered image be
//! reused on the next run.

use crate::format::ImageFormat;
use std::path::{Path, PathBuf};

/// Relative paths of the files belonging to one diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    dir: PathBuf,
    stem: String,
}

impl AssetPaths {
    pub fn derive(prefix: &str, code: &str) -> Self {
        Self {
            dir: image_dir(prefix),
            stem: hash_content(code),
        }
    }

    /// Directory holding all assets for this prefix
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[cfg(test)]
    pub(crate) fn stem(&self) -> &str {
        &self.stem
    }

    /// Mermaid source written for the renderer (`<hash>.mmd`)
    pub fn source(&self) -> PathBuf {
        self.dir.join(format!("{}.mmd", self.stem))
    }

    /// Rendered image in the given format (`<hash>.<ext>`)
    pub fn image(&self, format: ImageFormat) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, format.extension()))
    }
}

pub fn image_dir(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{prefix}-images"))
}

/// Compute Blake3 hash of content
fn hash_content(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}
