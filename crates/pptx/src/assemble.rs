//! Building the destination presentation: skeleton, slide list, and masters.

use crate::category::PartCategory;
use crate::extract::{copy_tree, find_main_part};
use crate::package::package_files;
use crate::partname::{self, rels_path, relative_target, resolve_target};
use crate::presentation::{layout_ids, PresentationDocument};
use crate::rels::{
    rel_kind, Relationship, Relationships, REL_NOTES_MASTER, REL_SLIDE, REL_SLIDE_LAYOUT, REL_SLIDE_MASTER,
};
use crate::session::{MergeSession, SourceId};
use deck_core::{Error, MergeWarning, Result};
use regex::Regex;
use std::fs;
use std::sync::LazyLock;

/// `slideLayout12.xml` → ("slideLayout", 12); `chart1_3.xml` → ("chart1_", 3).
static NUMBERED_PART_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<stem>.*?)(?P<num>\d+)\.[^.]*$").unwrap());

/// The destination's main document and its relationships while slides are
/// being appended.
struct Destination {
    main_part: String,
    document: PresentationDocument,
    rels: Relationships,
}

impl MergeSession {
    /// Copy `skeleton`'s extracted tree as the destination working tree.
    ///
    /// Every copied file maps to itself in the import cache, and the part
    /// counters move past every numbered name already in use.
    pub(crate) fn seed_skeleton(&mut self, skeleton: SourceId) -> Result<()> {
        let root = self.source(skeleton).root.clone();
        let copied = copy_tree(&root, &self.work_dir)?;

        for part in package_files(&self.work_dir)? {
            self.cache.insert(skeleton, &part, &part);
            if let Some(category) = PartCategory::from_folder(&part) {
                self.observe_numbered_part(category, &part);
            }
        }

        log::debug!(
            "Seeded destination with {} files from {}",
            copied,
            self.source(skeleton).path.display()
        );
        Ok(())
    }

    fn observe_numbered_part(&mut self, category: PartCategory, part: &str) {
        let caps = match NUMBERED_PART_REGEX.captures(partname::file_name(part)) {
            Some(caps) => caps,
            None => return,
        };
        let stem = &caps["stem"];
        let numbered = match category.prefix() {
            Some(prefix) => stem == prefix,
            None => stem.ends_with('_'),
        };
        if let (true, Ok(number)) = (numbered, caps["num"].parse::<u32>()) {
            self.counters.observe_part(category, number);
        }
    }

    /// Rebuild the destination slide list from the requests, in order.
    ///
    /// Returns the name of the destination's main document.
    pub(crate) fn assemble(&mut self) -> Result<String> {
        let mut dest = self.open_destination()?;

        let requests = self.requests.clone();
        for (source, index) in requests {
            if let Some(slide) = self.resolve_source_slide(source, index) {
                self.place_slide(&mut dest, source, &slide)?;
            }
        }

        if self.notes_master_imported {
            if let Some(notes_master) = self.notes_master.clone() {
                let rel_id = self.counters.next_rel_id();
                dest.rels.push(Relationship::new(
                    rel_id.clone(),
                    REL_NOTES_MASTER,
                    relative_target(&dest.main_part, &notes_master),
                ));
                dest.document.set_notes_master(rel_id);
            }
        }

        fs::write(self.dest_path(&dest.main_part), dest.document.render()?)?;
        dest.rels
            .save(&self.dest_path(&rels_path(&dest.main_part)))?;
        log::debug!(
            "Destination has {} slides and {} registered masters",
            dest.document.new_slides().len(),
            self.registered_masters.len()
        );
        Ok(dest.main_part)
    }

    /// Load the skeleton's presentation document and start every counter
    /// past the IDs it already uses.
    fn open_destination(&mut self) -> Result<Destination> {
        let main_part = find_main_part(&self.work_dir)?.ok_or_else(|| {
            Error::PackageStructure("destination skeleton has no presentation document".into())
        })?;
        let xml = fs::read_to_string(self.dest_path(&main_part))?;
        let document = PresentationDocument::parse(&xml)?;
        let mut rels = Relationships::load(&self.dest_path(&rels_path(&main_part)))?.unwrap_or_default();

        // Inherited slides are replaced wholesale.
        rels.retain(|r| r.is_external() || r.kind() != "slide");

        for rel in rels.iter() {
            self.counters.observe_rel_id(&rel.id);
        }
        if let Some(max) = document.max_slide_id() {
            self.counters.observe_slide_id(max);
        }
        if let Some(max) = document.max_master_id() {
            self.counters.observe_master_id(max);
        }

        for rel in rels.iter().filter(|r| !r.is_external() && r.kind() == "slideMaster") {
            if let Some(target) = resolve_target(&main_part, &rel.target) {
                self.registered_masters.insert(target);
            }
        }
        self.notes_master = document
            .notes_masters
            .first()
            .and_then(|rel_id| rels.get(rel_id))
            .or_else(|| rels.first_of_kind("notesMaster"))
            .and_then(|rel| resolve_target(&main_part, &rel.target));

        // Layout IDs share the master ID space.
        let masters: Vec<String> = package_files(&self.work_dir)?
            .into_iter()
            .filter(|part| {
                self.registered_masters.contains(part)
                    || (PartCategory::from_folder(part) == Some(PartCategory::SlideMaster)
                        && partname::extension(part).eq_ignore_ascii_case("xml"))
            })
            .collect();
        for master in masters {
            let xml = fs::read_to_string(self.dest_path(&master))?;
            for id in layout_ids(&xml)? {
                self.counters.observe_master_id(id);
            }
        }

        Ok(Destination {
            main_part,
            document,
            rels,
        })
    }

    /// Find the part behind slide `index` (1-based) of `source`.
    ///
    /// Unresolvable requests are reported and yield `None`.
    fn resolve_source_slide(&mut self, source: SourceId, index: usize) -> Option<String> {
        let package = self.source(source);
        let count = package.slides.len();
        let resolved = if index == 0 {
            Err("slide numbers start at 1".to_string())
        } else if package.main_part.is_none() {
            Err("the package has no presentation document".to_string())
        } else if index > count {
            Err(format!("the presentation has {} slides", count))
        } else {
            match &package.slides[index - 1] {
                Some(part) if package.has_part(part) => Ok(part.clone()),
                Some(part) => Err(format!("slide part {} is missing", part)),
                None => Err("its relationship has no target inside the package".to_string()),
            }
        };

        match resolved {
            Ok(part) => Some(part),
            Err(reason) => {
                let package = package.path.clone();
                self.warn(MergeWarning::SlideResolution {
                    package,
                    index,
                    reason,
                });
                None
            }
        }
    }

    /// Import a slide, register its master, and append it to the slide list.
    fn place_slide(&mut self, dest: &mut Destination, source: SourceId, slide: &str) -> Result<()> {
        let mut new_slide = self.import_part(source, slide, PartCategory::Slide)?;
        if self.placed_slides.contains(&new_slide) {
            new_slide = self.duplicate_slide(&new_slide)?;
        }

        self.ensure_master_registered(dest, &new_slide)?;

        let rel_id = self.counters.next_rel_id();
        dest.rels.push(Relationship::new(
            rel_id.clone(),
            REL_SLIDE,
            relative_target(&dest.main_part, &new_slide),
        ));
        let slide_id = self.counters.next_slide_id()?;
        dest.document.push_slide(slide_id, rel_id);

        log::debug!("Placed {} as slide ID {}", new_slide, slide_id);
        self.placed_slides.insert(new_slide);
        self.slides_written += 1;
        Ok(())
    }

    /// Follow slide → layout → master and add the master to the master list
    /// unless it is already there.
    fn ensure_master_registered(&mut self, dest: &mut Destination, slide: &str) -> Result<()> {
        let layout = match self.linked_part(slide, rel_kind(REL_SLIDE_LAYOUT))? {
            Some(layout) => layout,
            None => {
                log::warn!("{} has no slide layout; no master registered for it", slide);
                return Ok(());
            }
        };
        let master = match self.linked_part(&layout, rel_kind(REL_SLIDE_MASTER))? {
            Some(master) => master,
            None => {
                log::warn!("{} has no slide master", layout);
                return Ok(());
            }
        };
        if self.registered_masters.contains(&master) {
            return Ok(());
        }

        let rel_id = self.counters.next_rel_id();
        dest.rels.push(Relationship::new(
            rel_id.clone(),
            REL_SLIDE_MASTER,
            relative_target(&dest.main_part, &master),
        ));
        let master_id = self.counters.next_master_id()?;
        dest.document.push_master(master_id, rel_id);

        log::debug!("Registered master {} with ID {}", master, master_id);
        self.registered_masters.insert(master);
        self.masters_registered += 1;
        Ok(())
    }

    /// Destination part that `part` points to through its first relationship
    /// of `kind`.
    fn linked_part(&self, part: &str, kind: &str) -> Result<Option<String>> {
        let rels = Relationships::load(&self.dest_path(&rels_path(part)))?;
        Ok(rels
            .as_ref()
            .and_then(|rels| rels.first_of_kind(kind))
            .and_then(|rel| resolve_target(part, &rel.target)))
    }
}
