//! Error types for presentation merging.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors that abort a merge session.
///
/// Conditions that only degrade the output (a skipped slide, an unresolvable
/// relationship) are reported as [`crate::MergeWarning`] instead.
#[derive(Error, Debug)]
pub enum Error {
    /// The merge request itself is unusable; raised before any I/O.
    #[error("Invalid merge configuration: {0}")]
    ConfigurationError(String),

    /// A source package could not be opened or extracted.
    #[error("Source package unavailable: {}: {reason}", .path.display())]
    SourceUnavailable { path: PathBuf, reason: String },

    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing or serialization error.
    #[error("XML error: {0}")]
    XmlError(String),

    /// The destination package is missing a part the merge depends on.
    #[error("Invalid package structure: {0}")]
    PackageStructure(String),
}

impl Error {
    /// Shorthand for a [`Error::SourceUnavailable`] with a formatted reason.
    pub fn source_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error was raised before the session touched the filesystem.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ConfigurationError(_))
    }
}
