//! Merge session configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ZIP compression used for the output package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Deflate every entry (what Office writes).
    #[default]
    Deflated,
    /// Store entries uncompressed.
    Stored,
}

/// Options for a single merge session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Directory under which the session creates its scratch area.
    /// Defaults to the system temp directory.
    pub scratch_dir: Option<PathBuf>,

    /// Compression method for the output archive.
    pub compression: Compression,

    /// Remove parts that are not reachable from the package relationships
    /// (for example, slides of the skeleton deck that were not requested).
    pub prune_unreferenced: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            compression: Compression::Deflated,
            prune_unreferenced: true,
        }
    }
}

impl MergeOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place scratch directories under `dir`.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Set the output compression method.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Enable or disable pruning of unreferenced parts.
    pub fn with_prune_unreferenced(mut self, prune: bool) -> Self {
        self.prune_unreferenced = prune;
        self
    }
}
