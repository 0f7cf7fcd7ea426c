//! Outcome of a merge session: warnings and counts.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A non-fatal condition that made the output smaller than requested.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeWarning {
    /// A requested slide index is out of range or its relationship chain is broken.
    #[error("slide {index} of {} skipped: {reason}", .package.display())]
    SlideResolution {
        package: PathBuf,
        index: usize,
        reason: String,
    },

    /// A relationship target does not map to a part inside the package.
    #[error("relationship {rel_id} of {part} in {} skipped: target '{target}' is outside the package", .package.display())]
    PackageIntegrity {
        package: PathBuf,
        part: String,
        rel_id: String,
        target: String,
    },

    /// A referenced part has no bytes in the source package.
    #[error("part {part} is missing from {}; references to it were left unchanged", .package.display())]
    MissingPart { package: PathBuf, part: String },
}

/// Summary of a finished merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    /// Where the package was written.
    pub output: PathBuf,

    /// Number of slide requests received.
    pub slides_requested: usize,

    /// Number of slides in the output slide list.
    pub slides_written: usize,

    /// Number of parts copied out of source packages.
    pub parts_imported: usize,

    /// Number of slide masters newly registered in the output.
    pub masters_registered: usize,

    /// Everything that was skipped along the way.
    pub warnings: Vec<MergeWarning>,
}

impl MergeReport {
    /// Number of requests that did not become an output slide.
    pub fn slides_skipped(&self) -> usize {
        self.slides_requested.saturating_sub(self.slides_written)
    }
}
