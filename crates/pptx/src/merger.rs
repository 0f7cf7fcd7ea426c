//! Public entry point: merge requested slides into a new package.

use crate::extract::SourcePackage;
use crate::package::{finalize_content_types, prune_unreferenced, write_package};
use crate::session::{MergeSession, MergeState};
use deck_core::{MergeOptions, MergeReport, Result, SlideRequest};
use std::path::{Path, PathBuf};

/// Builder for one merge.
///
/// ```no_run
/// use deck_pptx::DeckMerger;
///
/// let report = DeckMerger::new("combined.pptx")
///     .add_slide("intro.pptx", 1)
///     .add_slide("details.pptx", 3)
///     .merge()?;
/// println!("{} slides written", report.slides_written);
/// # Ok::<(), deck_core::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct DeckMerger {
    output: PathBuf,
    requests: Vec<SlideRequest>,
    options: MergeOptions,
}

impl DeckMerger {
    /// Create a merger that writes to `output`.
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            requests: Vec::new(),
            options: MergeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    /// Request slide `index` (1-based) of `source` as the next output slide.
    pub fn add_slide(mut self, source: impl Into<PathBuf>, index: usize) -> Self {
        self.requests.push(SlideRequest::new(source, index));
        self
    }

    pub fn add_request(mut self, request: SlideRequest) -> Self {
        self.requests.push(request);
        self
    }

    pub fn requests(&self) -> &[SlideRequest] {
        &self.requests
    }

    /// Run the merge.
    pub fn merge(&self) -> Result<MergeReport> {
        merge_slides(&self.requests, &self.output, &self.options)
    }
}

/// Merge `requests`, in order, into a new package at `output`.
///
/// Unresolvable slides and relationships are skipped and listed in the
/// report's warnings. Any error aborts the merge without touching `output`.
/// The scratch area is removed whichever way the call ends.
pub fn merge_slides(requests: &[SlideRequest], output: &Path, options: &MergeOptions) -> Result<MergeReport> {
    let mut session = MergeSession::new(requests, output, options)?;

    match session.run() {
        Ok(report) => {
            log::info!(
                "Merged {} of {} slides into {} ({} parts imported, {} warnings)",
                report.slides_written,
                report.slides_requested,
                report.output.display(),
                report.parts_imported,
                report.warnings.len()
            );
            Ok(report)
        }
        Err(e) => {
            let stage = session.state;
            session.transition(MergeState::Failed);
            log::error!("Merge into {} failed while {:?}: {}", output.display(), stage, e);
            Err(e)
        }
    }
}

impl MergeSession {
    fn run(&mut self) -> Result<MergeReport> {
        self.transition(MergeState::Extracting);
        let sources_dir = self.scratch_path().join("sources");
        for (id, path) in self.source_paths.clone().iter().enumerate() {
            let package = SourcePackage::extract(path, &sources_dir.join(id.to_string()))?;
            self.sources.push(package);
        }

        self.transition(MergeState::Assembling);
        let skeleton = self.requests[0].0;
        self.seed_skeleton(skeleton)?;
        let main_part = self.assemble()?;
        log::debug!("Import cache holds {} parts", self.cache.len());

        self.transition(MergeState::Finalizing);
        if self.options.prune_unreferenced {
            prune_unreferenced(&self.work_dir)?;
        }
        finalize_content_types(&self.work_dir, &main_part, &self.content_overrides)?;
        write_package(&self.work_dir, &self.output, self.options.compression)?;

        self.transition(MergeState::Packaged);
        Ok(MergeReport {
            output: self.output.clone(),
            slides_requested: self.requests.len(),
            slides_written: self.slides_written,
            parts_imported: self.parts_imported,
            masters_registered: self.masters_registered,
            warnings: self.warnings.clone(),
        })
    }
}
