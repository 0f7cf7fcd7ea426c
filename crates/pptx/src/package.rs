//! The destination working tree: pruning, content types, and the output ZIP.

use crate::content_types::{
    guess_content_type, ContentTypes, CONTENT_TYPES_PART, CT_PRESENTATION_MAIN, CT_RELATIONSHIPS, CT_XML,
};
use crate::partname::{self, rels_owner, rels_path, resolve_target};
use crate::rels::Relationships;
use deck_core::{Compression, Error, Result};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Every file under `root` as a package-relative name, sorted.
pub(crate) fn package_files(root: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(name);
        }
    }
    Ok(files)
}

/// Every part reachable from the package relationships, including `""` for
/// the package itself.
fn reachable_parts(root: &Path) -> Result<HashSet<String>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue = VecDeque::from([String::new()]);
    seen.insert(String::new());

    while let Some(part) = queue.pop_front() {
        let rels = match Relationships::load(&root.join(rels_path(&part)))? {
            Some(rels) => rels,
            None => continue,
        };
        for rel in rels.iter().filter(|r| !r.is_external()) {
            if let Some(target) = resolve_target(&part, &rel.target) {
                if seen.insert(target.clone()) {
                    queue.push_back(target);
                }
            }
        }
    }
    Ok(seen)
}

/// Delete files no relationship chain from the package root leads to.
///
/// A `.rels` sidecar survives exactly when its owner does. Returns the
/// number of files removed.
pub(crate) fn prune_unreferenced(root: &Path) -> Result<usize> {
    let reachable = reachable_parts(root)?;
    let mut removed = 0;

    for file in package_files(root)? {
        if file == CONTENT_TYPES_PART || reachable.contains(&file) {
            continue;
        }
        let owner_reachable = partname::extension(&file) == "rels"
            && rels_owner(&file).is_some_and(|owner| reachable.contains(&owner));
        if owner_reachable {
            continue;
        }
        log::debug!("Pruning unreferenced part {}", file);
        fs::remove_file(root.join(&file))?;
        removed += 1;
    }

    remove_empty_dirs(root)?;
    if removed > 0 {
        log::info!("Pruned {} unreferenced parts", removed);
    }
    Ok(removed)
}

fn remove_empty_dirs(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() && fs::read_dir(entry.path())?.next().is_none() {
            fs::remove_dir(entry.path())?;
        }
    }
    Ok(())
}

/// Make `[Content_Types].xml` describe exactly the files in the tree.
///
/// Collected source types are added where the existing declarations do not
/// already yield them; overrides for absent parts are dropped; any file still
/// uncovered gets a guessed override. Returns the number of overrides added.
pub(crate) fn finalize_content_types(
    root: &Path,
    main_part: &str,
    collected: &BTreeMap<String, String>,
) -> Result<usize> {
    let mut types = ContentTypes::load(root)?;
    let files = package_files(root)?;
    let present: HashSet<&str> = files.iter().map(String::as_str).collect();
    let mut added = 0;

    types.ensure_default("rels", CT_RELATIONSHIPS);
    types.ensure_default("xml", CT_XML);

    for (part, content_type) in collected {
        if present.contains(part.as_str()) && !types.covers(part, content_type) {
            types.set_override(part, content_type);
            added += 1;
        }
    }

    if present.contains(main_part) && types.override_for(main_part).is_none() {
        types.set_override(main_part, CT_PRESENTATION_MAIN);
        added += 1;
    }

    let dropped = types.retain_overrides(|part| present.contains(part));
    if dropped > 0 {
        log::debug!("Dropped {} content-type overrides for absent parts", dropped);
    }

    for file in files.iter().filter(|f| f.as_str() != CONTENT_TYPES_PART) {
        if types.lookup(file).is_none() {
            let guessed = guess_content_type(partname::extension(file));
            log::debug!("No declared content type for {}; using {}", file, guessed);
            types.set_override(file, guessed);
            added += 1;
        }
    }

    types.save(root)?;
    Ok(added)
}

/// Zip the tree at `root` into `output`.
///
/// The archive is staged next to `output` and moved into place only once it
/// is complete, so a failed write never leaves a partial package behind.
pub(crate) fn write_package(root: &Path, output: &Path, compression: Compression) -> Result<usize> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut files = package_files(root)?;
    // Consumers sniff the first entries.
    files.sort_by_key(|name| match name.as_str() {
        CONTENT_TYPES_PART => 0,
        "_rels/.rels" => 1,
        _ => 2,
    });

    let method = match compression {
        Compression::Deflated => CompressionMethod::Deflated,
        Compression::Stored => CompressionMethod::Stored,
    };
    let options = FileOptions::default().compression_method(method);

    let mut staged = tempfile::Builder::new()
        .prefix(".deck-merge-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    {
        let mut zip = ZipWriter::new(staged.as_file_mut());
        for name in &files {
            zip.start_file(name.as_str(), options)
                .map_err(|e| Error::ZipError(format!("Failed to add '{}': {}", name, e)))?;
            let mut file = File::open(root.join(name))?;
            io::copy(&mut file, &mut zip)?;
        }
        zip.finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish archive: {}", e)))?;
    }

    staged.persist(output).map_err(|e| Error::IoError(e.error))?;
    log::debug!("Wrote {} entries to {}", files.len(), output.display());
    Ok(files.len())
}
