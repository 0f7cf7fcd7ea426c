//! Copying parts, and everything they reference, into the destination tree.

use crate::category::PartCategory;
use crate::content_types::CT_SLIDE;
use crate::partname::{rels_path, relative_target, resolve_target};
use crate::presentation::renumber_layout_ids;
use crate::rels::Relationships;
use crate::session::{MergeSession, SourceId};
use deck_core::{MergeWarning, Result};
use std::fs;

/// Outcome of reserving a destination name for a source part.
enum Claim {
    /// Already imported (or part of the skeleton).
    Cached(String),
    /// Newly reserved; bytes still need copying.
    Fresh(String),
    /// The source has no bytes for the part.
    Missing,
}

/// A claimed part whose bytes and relationships are still to be written.
struct PendingPart {
    original: String,
    new_part: String,
    category: PartCategory,
}

impl MergeSession {
    /// Import `part` of `source` together with its whole relationship closure.
    ///
    /// Returns the part's destination name. A part already imported from the
    /// same source returns its earlier name without copying anything. A part
    /// whose bytes are missing returns its original name unchanged.
    pub(crate) fn import_part(
        &mut self,
        source: SourceId,
        part: &str,
        category: PartCategory,
    ) -> Result<String> {
        let new_part = match self.claim(source, part, category) {
            Claim::Cached(existing) => return Ok(existing),
            Claim::Missing => return Ok(part.to_string()),
            Claim::Fresh(new_part) => new_part,
        };

        // Depth-first over an explicit stack; the cache is filled at claim
        // time, so a relationship cycle ends in a cache hit.
        let mut stack = vec![PendingPart {
            original: part.to_string(),
            new_part: new_part.clone(),
            category,
        }];
        while let Some(pending) = stack.pop() {
            self.copy_part(source, &pending)?;
            let discovered = self.rewrite_relationships(source, &pending.original, &pending.new_part)?;
            stack.extend(discovered);
        }

        Ok(new_part)
    }

    /// Reserve a destination name for `part`, or find the one it already has.
    fn claim(&mut self, source: SourceId, part: &str, category: PartCategory) -> Claim {
        if let Some(existing) = self.cache.get(source, part) {
            return Claim::Cached(existing.to_string());
        }
        if !self.source(source).has_part(part) {
            let package = self.source(source).path.clone();
            self.warn(MergeWarning::MissingPart {
                package,
                part: part.to_string(),
            });
            return Claim::Missing;
        }

        let new_part = self.allocate(category, part);
        self.cache.insert(source, part, &new_part);
        Claim::Fresh(new_part)
    }

    /// Like [`Self::claim`], but notes masters collapse onto the destination's one.
    fn claim_target(&mut self, source: SourceId, part: &str, category: PartCategory) -> Claim {
        if category != PartCategory::NotesMaster {
            return self.claim(source, part, category);
        }
        if let Some(existing) = self.cache.get(source, part) {
            return Claim::Cached(existing.to_string());
        }
        if let Some(notes_master) = self.notes_master.clone() {
            self.cache.insert(source, part, &notes_master);
            return Claim::Cached(notes_master);
        }

        let claim = self.claim(source, part, category);
        if let Claim::Fresh(new_part) = &claim {
            log::debug!("Adopting {} as the notes master", new_part);
            self.notes_master = Some(new_part.clone());
            self.notes_master_imported = true;
        }
        claim
    }

    /// Next unused name for a part of `category`.
    pub(crate) fn allocate(&mut self, category: PartCategory, original: &str) -> String {
        loop {
            let number = self.counters.next_part(category);
            let candidate = category.part_name(number, original);
            if !self.dest_path(&candidate).exists() {
                return candidate;
            }
        }
    }

    /// Copy the bytes of a claimed part and record its content type.
    fn copy_part(&mut self, source: SourceId, pending: &PendingPart) -> Result<()> {
        let from = self.source(source).part_path(&pending.original);
        let to = self.dest_path(&pending.new_part);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }

        if pending.category == PartCategory::SlideMaster {
            // Layout IDs share the master ID space and must not repeat.
            let xml = fs::read_to_string(&from)?;
            let counters = &mut self.counters;
            let renumbered = renumber_layout_ids(&xml, || counters.next_master_id())?;
            fs::write(&to, renumbered)?;
        } else {
            fs::copy(&from, &to)?;
        }

        let content_type = self
            .source(source)
            .content_types
            .lookup(&pending.original)
            .map(str::to_string);
        if let Some(content_type) = content_type {
            self.content_overrides
                .insert(pending.new_part.clone(), content_type);
        }

        self.parts_imported += 1;
        log::debug!("Imported {} -> {}", pending.original, pending.new_part);
        Ok(())
    }

    /// Point `new_part`'s relationships at the destination names of their
    /// targets, claiming any target not imported yet.
    ///
    /// Returns the freshly claimed targets; their bytes still need copying.
    fn rewrite_relationships(
        &mut self,
        source: SourceId,
        old_part: &str,
        new_part: &str,
    ) -> Result<Vec<PendingPart>> {
        let rels_file = self.source(source).part_path(&rels_path(old_part));
        let mut rels = match Relationships::load(&rels_file)? {
            Some(rels) => rels,
            None => return Ok(Vec::new()),
        };

        let mut discovered = Vec::new();
        for rel in rels.iter_mut() {
            if rel.is_external() {
                continue;
            }
            let target = match resolve_target(old_part, &rel.target) {
                Some(target) => target,
                None => {
                    let package = self.source(source).path.clone();
                    self.warn(MergeWarning::PackageIntegrity {
                        package,
                        part: old_part.to_string(),
                        rel_id: rel.id.clone(),
                        target: rel.target.clone(),
                    });
                    continue;
                }
            };

            let category = PartCategory::classify(&rel.rel_type, &target);
            let new_target = match self.claim_target(source, &target, category) {
                Claim::Cached(existing) => existing,
                Claim::Fresh(claimed) => {
                    discovered.push(PendingPart {
                        original: target,
                        new_part: claimed.clone(),
                        category,
                    });
                    claimed
                }
                Claim::Missing => continue,
            };

            let fragment = rel.target.find('#').map(|pos| rel.target[pos..].to_string());
            rel.target = relative_target(new_part, &new_target);
            if let Some(fragment) = fragment {
                rel.target.push_str(&fragment);
            }
        }

        rels.save(&self.dest_path(&rels_path(new_part)))?;
        Ok(discovered)
    }

    /// Copy a slide that is already in the output list under a new name.
    ///
    /// The copy shares layouts and media with the original but drops its
    /// notes, which belong to exactly one slide.
    pub(crate) fn duplicate_slide(&mut self, existing: &str) -> Result<String> {
        let new_part = self.allocate(PartCategory::Slide, existing);
        let to = self.dest_path(&new_part);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(self.dest_path(existing), &to)?;

        if let Some(mut rels) = Relationships::load(&self.dest_path(&rels_path(existing)))? {
            rels.retain(|r| r.is_external() || r.kind() != "notesSlide");
            for rel in rels.iter_mut().filter(|r| !r.is_external()) {
                if let Some(target) = resolve_target(existing, &rel.target) {
                    rel.target = relative_target(&new_part, &target);
                }
            }
            rels.save(&self.dest_path(&rels_path(&new_part)))?;
        }

        let content_type = self
            .content_overrides
            .get(existing)
            .cloned()
            .unwrap_or_else(|| CT_SLIDE.to_string());
        self.content_overrides.insert(new_part.clone(), content_type);

        log::debug!("Duplicated slide {} as {}", existing, new_part);
        Ok(new_part)
    }
}
