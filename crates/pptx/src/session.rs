//! Per-merge state: scratch area, import cache, and ID counters.

use crate::category::PartCategory;
use crate::extract::SourcePackage;
use crate::presentation::{FIRST_MASTER_ID, FIRST_SLIDE_ID};
use deck_core::{Error, MergeOptions, MergeWarning, Result, SlideRequest};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::TempDir;

/// `rId12` → 12.
static REL_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^rId(\d+)$").unwrap());

/// Index of a source package within a session.
pub(crate) type SourceId = usize;

/// Lifecycle of a merge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MergeState {
    Created,
    Extracting,
    Assembling,
    Finalizing,
    Packaged,
    Failed,
}

/// `(source, original part) → destination part`, fixed for the whole session.
#[derive(Debug, Default)]
pub(crate) struct ImportCache {
    parts: HashMap<(SourceId, String), String>,
}

impl ImportCache {
    pub(crate) fn get(&self, source: SourceId, part: &str) -> Option<&str> {
        self.parts
            .get(&(source, part.to_string()))
            .map(String::as_str)
    }

    /// Record a mapping. An existing mapping for the key always wins, so
    /// repeated inserts are harmless.
    pub(crate) fn insert(&mut self, source: SourceId, part: &str, new_part: &str) -> &str {
        self.parts
            .entry((source, part.to_string()))
            .or_insert_with(|| new_part.to_string())
    }

    pub(crate) fn len(&self) -> usize {
        self.parts.len()
    }
}

/// Next free numbers for part names and for the numeric ID spaces.
///
/// Counters only move forward; a number is never handed out twice.
#[derive(Debug, Clone)]
pub(crate) struct IdCounters {
    parts: HashMap<PartCategory, u32>,
    rel_id: u32,
    slide_id: u32,
    // Wider than the ID space so that 2^32 - 1 can be observed.
    master_id: u64,
}

impl Default for IdCounters {
    fn default() -> Self {
        Self {
            parts: HashMap::new(),
            rel_id: 1,
            slide_id: FIRST_SLIDE_ID,
            master_id: u64::from(FIRST_MASTER_ID),
        }
    }
}

impl IdCounters {
    pub(crate) fn next_part(&mut self, category: PartCategory) -> u32 {
        let next = self.parts.entry(category).or_insert(1);
        let issued = *next;
        *next += 1;
        issued
    }

    /// Make sure part number `seen` is never issued for `category`.
    pub(crate) fn observe_part(&mut self, category: PartCategory, seen: u32) {
        let next = self.parts.entry(category).or_insert(1);
        if seen >= *next {
            *next = seen + 1;
        }
    }

    pub(crate) fn next_rel_id(&mut self) -> String {
        let issued = self.rel_id;
        self.rel_id += 1;
        format!("rId{}", issued)
    }

    pub(crate) fn observe_rel_id(&mut self, id: &str) {
        if let Some(n) = REL_ID_REGEX
            .captures(id)
            .and_then(|c| c[1].parse::<u32>().ok())
        {
            if n >= self.rel_id {
                self.rel_id = n + 1;
            }
        }
    }

    /// Next slide ID. Slide IDs stay below the master ID space.
    pub(crate) fn next_slide_id(&mut self) -> Result<u32> {
        if self.slide_id >= FIRST_MASTER_ID {
            return Err(Error::PackageStructure("slide ID space exhausted".into()));
        }
        let issued = self.slide_id;
        self.slide_id += 1;
        Ok(issued)
    }

    pub(crate) fn observe_slide_id(&mut self, id: u32) {
        if id >= self.slide_id {
            self.slide_id = id.saturating_add(1);
        }
    }

    /// Next ID in the space shared by slide masters and slide layouts.
    pub(crate) fn next_master_id(&mut self) -> Result<u32> {
        let issued = u32::try_from(self.master_id)
            .map_err(|_| Error::PackageStructure("slide master ID space exhausted".into()))?;
        self.master_id += 1;
        Ok(issued)
    }

    pub(crate) fn observe_master_id(&mut self, id: u32) {
        let id = u64::from(id);
        if id >= self.master_id {
            self.master_id = id + 1;
        }
    }
}

/// Everything one `merge()` call owns.
///
/// Dropping the session removes its scratch directory, whichever way the
/// merge ended.
pub(crate) struct MergeSession {
    pub(crate) state: MergeState,
    pub(crate) options: MergeOptions,
    pub(crate) output: PathBuf,

    /// Distinct source paths, indexed by [`SourceId`].
    pub(crate) source_paths: Vec<PathBuf>,
    /// Requests in caller order.
    pub(crate) requests: Vec<(SourceId, usize)>,
    /// Extracted sources, filled during the extracting stage.
    pub(crate) sources: Vec<SourcePackage>,

    scratch: TempDir,
    pub(crate) work_dir: PathBuf,

    pub(crate) cache: ImportCache,
    pub(crate) counters: IdCounters,
    pub(crate) registered_masters: BTreeSet<String>,
    /// Destination part → content type declared by its source.
    pub(crate) content_overrides: BTreeMap<String, String>,
    /// The destination's notes master, if it has one.
    pub(crate) notes_master: Option<String>,
    /// Set when the notes master was imported rather than inherited.
    pub(crate) notes_master_imported: bool,
    /// Destination slide parts already in the output slide list.
    pub(crate) placed_slides: HashSet<String>,

    pub(crate) warnings: Vec<MergeWarning>,
    pub(crate) parts_imported: usize,
    pub(crate) masters_registered: usize,
    pub(crate) slides_written: usize,
}

impl MergeSession {
    /// Create a session and its scratch directory. No source is read yet.
    pub(crate) fn new(requests: &[SlideRequest], output: &Path, options: &MergeOptions) -> Result<Self> {
        if requests.is_empty() {
            return Err(Error::ConfigurationError("No slides to merge".into()));
        }

        let mut source_paths: Vec<PathBuf> = Vec::new();
        let mut indexed = Vec::with_capacity(requests.len());
        for request in requests {
            let id = match source_paths.iter().position(|p| *p == request.source) {
                Some(id) => id,
                None => {
                    source_paths.push(request.source.clone());
                    source_paths.len() - 1
                }
            };
            indexed.push((id, request.index));
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("deck-merge-");
        let scratch = match &options.scratch_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)?
            }
            None => builder.tempdir()?,
        };
        let work_dir = scratch.path().join("work");
        fs::create_dir_all(&work_dir)?;
        log::debug!("Scratch area for merge: {}", scratch.path().display());

        Ok(Self {
            state: MergeState::Created,
            options: options.clone(),
            output: output.to_path_buf(),
            source_paths,
            requests: indexed,
            sources: Vec::new(),
            scratch,
            work_dir,
            cache: ImportCache::default(),
            counters: IdCounters::default(),
            registered_masters: BTreeSet::new(),
            content_overrides: BTreeMap::new(),
            notes_master: None,
            notes_master_imported: false,
            placed_slides: HashSet::new(),
            warnings: Vec::new(),
            parts_imported: 0,
            masters_registered: 0,
            slides_written: 0,
        })
    }

    /// Root of the scratch area; sources extract into subdirectories of it.
    pub(crate) fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    pub(crate) fn transition(&mut self, next: MergeState) {
        log::debug!("Merge session {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Record a non-fatal condition and log it.
    pub(crate) fn warn(&mut self, warning: MergeWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub(crate) fn source(&self, id: SourceId) -> &SourcePackage {
        &self.sources[id]
    }

    /// Absolute path of a destination part.
    pub(crate) fn dest_path(&self, part: &str) -> PathBuf {
        self.work_dir.join(part)
    }
}
