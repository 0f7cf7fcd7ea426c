//! Unpacking source packages into the scratch area.

use crate::content_types::ContentTypes;
use crate::partname::{self, resolve_target};
use crate::presentation::PresentationDocument;
use crate::rels::{Relationships, REL_OFFICE_DOCUMENT};
use deck_core::{Error, PresentationFormat, Result};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Conventional location of the main document when the root relationships
/// do not name one.
pub(crate) const DEFAULT_MAIN_PART: &str = "ppt/presentation.xml";

/// A source package unpacked into its own scratch directory.
#[derive(Debug)]
pub(crate) struct SourcePackage {
    /// Path the caller supplied.
    pub(crate) path: PathBuf,
    /// Root of the extracted tree.
    pub(crate) root: PathBuf,
    pub(crate) content_types: ContentTypes,
    /// Main presentation part, if the package has one.
    pub(crate) main_part: Option<String>,
    /// Slide parts in `sldIdLst` order; `None` where the relationship is broken.
    pub(crate) slides: Vec<Option<String>>,
}

impl SourcePackage {
    /// Unzip `path` into `dest` and read its slide list.
    pub(crate) fn extract(path: &Path, dest: &Path) -> Result<Self> {
        unzip(path, dest)?;

        let content_types = ContentTypes::load(dest)?;
        let main_part = find_main_part(dest)?;
        let slides = match &main_part {
            Some(main) => slide_list(dest, main)?,
            None => {
                log::debug!("{} has no presentation document", path.display());
                Vec::new()
            }
        };
        log::debug!(
            "Extracted {} ({} slides) into {}",
            path.display(),
            slides.len(),
            dest.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            root: dest.to_path_buf(),
            content_types,
            main_part,
            slides,
        })
    }

    /// Absolute path of one of this package's parts.
    pub(crate) fn part_path(&self, part: &str) -> PathBuf {
        self.root.join(part)
    }

    pub(crate) fn has_part(&self, part: &str) -> bool {
        self.part_path(part).is_file()
    }
}

/// Check the file signature and unpack the archive.
fn unzip(path: &Path, dest: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(Error::source_unavailable(path, "file does not exist"));
    }

    let mut magic = [0u8; 8];
    let read = File::open(path)
        .and_then(|mut f| f.read(&mut magic))
        .map_err(|e| Error::source_unavailable(path, e.to_string()))?;
    match PresentationFormat::from_magic(&magic[..read]) {
        Some(PresentationFormat::Pptx) => {}
        Some(PresentationFormat::Ppt) => {
            return Err(Error::source_unavailable(
                path,
                "legacy binary .ppt files cannot be merged; save it as .pptx first",
            ));
        }
        None => return Err(Error::source_unavailable(path, "not a ZIP archive")),
    }

    let file = File::open(path).map_err(|e| Error::source_unavailable(path, e.to_string()))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| Error::source_unavailable(path, format!("corrupt ZIP: {}", e)))?;
    fs::create_dir_all(dest)?;
    archive
        .extract(dest)
        .map_err(|e| Error::source_unavailable(path, format!("extraction failed: {}", e)))?;
    Ok(())
}

/// Locate the main document through `_rels/.rels`.
pub(crate) fn find_main_part(root: &Path) -> Result<Option<String>> {
    let from_rels = Relationships::load(&root.join(partname::rels_path("")))?.and_then(|rels| {
        rels.iter()
            .filter(|r| !r.is_external())
            .find(|r| r.rel_type == REL_OFFICE_DOCUMENT || r.kind() == "officeDocument")
            .and_then(|r| resolve_target("", &r.target))
    });

    let candidate = from_rels.unwrap_or_else(|| DEFAULT_MAIN_PART.to_string());
    if root.join(&candidate).is_file() {
        Ok(Some(candidate))
    } else {
        Ok(None)
    }
}

/// Slide parts of a package, in presentation order.
fn slide_list(root: &Path, main_part: &str) -> Result<Vec<Option<String>>> {
    let xml = fs::read_to_string(root.join(main_part))?;
    let document = PresentationDocument::parse(&xml)?;
    let rels = Relationships::load(&root.join(partname::rels_path(main_part)))?.unwrap_or_default();

    Ok(document
        .slides
        .iter()
        .map(|entry| {
            rels.get(&entry.rel_id)
                .filter(|r| !r.is_external())
                .and_then(|r| resolve_target(main_part, &r.target))
        })
        .collect())
}

/// Copy every file under `from` into `to`, keeping relative paths.
pub(crate) fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = match entry.path().strip_prefix(from) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}
