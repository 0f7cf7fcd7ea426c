//! Reading and rewriting `presentation.xml` and slide-master ID lists.
//!
//! Rewrites stream the original document through quick-xml and only touch
//! the lists being replaced, so every other element, namespace declaration
//! and prefix reaches the output byte-for-byte.

use crate::xml::{
    attribute, local_name, prefix, qualify, relationship_ref, xml_error, NS_OFFICE_RELATIONSHIPS,
    NS_OFFICE_RELATIONSHIPS_STRICT,
};
use deck_core::Result;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

/// Slide IDs start here; lower values are reserved.
pub const FIRST_SLIDE_ID: u32 = 256;

/// Slide-master and slide-layout IDs live at and above 2^31.
pub const FIRST_MASTER_ID: u32 = 0x8000_0000;

/// A numbered entry of `sldIdLst` / `sldMasterIdLst`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdEntry {
    pub id: u32,
    pub rel_id: String,
}

/// Position of a direct child of `<p:presentation>` in schema order, for the
/// lists this module may have to insert.
fn child_rank(local: &[u8]) -> usize {
    match local {
        b"sldMasterIdLst" => 0,
        b"notesMasterIdLst" => 1,
        b"handoutMasterIdLst" => 2,
        b"sldIdLst" => 3,
        _ => 4,
    }
}

/// `presentation.xml` plus the edits to apply when it is written back.
#[derive(Debug, Clone, Default)]
pub struct PresentationDocument {
    xml: String,

    /// Masters listed in the original document.
    pub masters: Vec<IdEntry>,
    /// Slides listed in the original document.
    pub slides: Vec<IdEntry>,
    /// Relationship IDs of notes masters in the original document.
    pub notes_masters: Vec<String>,

    has_master_list: bool,
    has_notes_master_list: bool,
    has_slide_list: bool,

    added_masters: Vec<IdEntry>,
    new_slides: Vec<IdEntry>,
    added_notes_master: Option<String>,
}

#[derive(Default)]
struct Inserted {
    masters: bool,
    notes_master: bool,
    slides: bool,
}

/// Qualified names to use for new elements, following the root element.
struct Names {
    presentation_prefix: Option<String>,
    relationships_prefix: String,
}

impl Names {
    fn element(&self, local: &str) -> String {
        qualify(self.presentation_prefix.as_deref(), local)
    }

    fn rel_id(&self) -> String {
        format!("{}:id", self.relationships_prefix)
    }
}

impl PresentationDocument {
    /// Parse `presentation.xml`, recording its master, notes-master and slide lists.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut doc = Self {
            xml: xml.to_string(),
            ..Self::default()
        };
        let mut reader = Reader::from_str(xml);
        let mut depth = 0usize;
        let mut list: Option<Vec<u8>> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    doc.observe(e, depth, &mut list)?;
                    depth += 1;
                }
                Ok(Event::Empty(ref e)) => doc.observe(e, depth, &mut list)?,
                Ok(Event::End(_)) => {
                    depth = depth.saturating_sub(1);
                    if depth <= 1 {
                        list = None;
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error("Error parsing presentation.xml", e)),
                _ => {}
            }
        }

        Ok(doc)
    }

    fn observe(
        &mut self,
        e: &BytesStart<'_>,
        depth: usize,
        list: &mut Option<Vec<u8>>,
    ) -> Result<()> {
        let name = e.name();
        let local = local_name(name.as_ref());
        match depth {
            1 => {
                match local {
                    b"sldMasterIdLst" => self.has_master_list = true,
                    b"notesMasterIdLst" => self.has_notes_master_list = true,
                    b"sldIdLst" => self.has_slide_list = true,
                    _ => {}
                }
                *list = Some(local.to_vec());
            }
            2 => match (list.as_deref(), local) {
                (Some(b"sldMasterIdLst"), b"sldMasterId") => {
                    if let Some(entry) = id_entry(e)? {
                        self.masters.push(entry);
                    }
                }
                (Some(b"sldIdLst"), b"sldId") => {
                    if let Some(entry) = id_entry(e)? {
                        self.slides.push(entry);
                    }
                }
                (Some(b"notesMasterIdLst"), b"notesMasterId") => {
                    if let Some(rel_id) = relationship_ref(e)? {
                        self.notes_masters.push(rel_id);
                    }
                }
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    /// Append a slide to the rewritten slide list. The original list is
    /// never carried over.
    pub fn push_slide(&mut self, id: u32, rel_id: impl Into<String>) {
        self.new_slides.push(IdEntry {
            id,
            rel_id: rel_id.into(),
        });
    }

    /// Append a master to the master list.
    pub fn push_master(&mut self, id: u32, rel_id: impl Into<String>) {
        self.added_masters.push(IdEntry {
            id,
            rel_id: rel_id.into(),
        });
    }

    /// Register a notes master. Only honoured when the document has none.
    pub fn set_notes_master(&mut self, rel_id: impl Into<String>) {
        if !self.has_notes_master_list {
            self.added_notes_master = Some(rel_id.into());
        }
    }

    /// Slides that will be written.
    pub fn new_slides(&self) -> &[IdEntry] {
        &self.new_slides
    }

    /// Largest master ID already present.
    pub fn max_master_id(&self) -> Option<u32> {
        self.masters.iter().map(|e| e.id).max()
    }

    /// Largest slide ID already present.
    pub fn max_slide_id(&self) -> Option<u32> {
        self.slides.iter().map(|e| e.id).max()
    }

    /// Write the document back with the new slide list and added masters.
    ///
    /// The original slide list, custom shows and top-level extension list are
    /// dropped: all of them refer to slides by ID and would dangle.
    pub fn render(&self) -> Result<String> {
        let mut reader = Reader::from_str(&self.xml);
        let mut writer = Writer::new(Vec::with_capacity(self.xml.len() + 512));
        let write_err = |e| xml_error("Failed to write presentation.xml", e);

        let mut names = Names {
            presentation_prefix: None,
            relationships_prefix: "r".to_string(),
        };
        let mut inserted = Inserted::default();
        let mut depth = 0usize;
        let mut skip_until: Option<usize> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| xml_error("Error parsing presentation.xml", e))?;

            if let Some(skip_depth) = skip_until {
                match event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => {
                        depth -= 1;
                        if depth == skip_depth {
                            skip_until = None;
                        }
                    }
                    Event::Eof => break,
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(e) if depth == 0 => {
                    let root = self.prepare_root(&e, &mut names)?;
                    writer.write_event(Event::Start(root)).map_err(write_err)?;
                    depth = 1;
                }
                Event::Start(e) if depth == 1 => {
                    let name = e.name();
                    let local = local_name(name.as_ref());
                    self.insert_missing(child_rank(local), &mut writer, &names, &mut inserted)?;
                    match local {
                        b"sldIdLst" => {
                            self.write_slide_list(&mut writer, &names)?;
                            skip_until = Some(1);
                        }
                        b"extLst" | b"custShowLst" => skip_until = Some(1),
                        _ => writer.write_event(Event::Start(e.clone())).map_err(write_err)?,
                    }
                    depth += 1;
                }
                Event::Empty(e) if depth == 1 => {
                    let name = e.name();
                    let local = local_name(name.as_ref());
                    self.insert_missing(child_rank(local), &mut writer, &names, &mut inserted)?;
                    match local {
                        b"sldIdLst" => self.write_slide_list(&mut writer, &names)?,
                        b"extLst" | b"custShowLst" => {}
                        b"sldMasterIdLst" if !self.added_masters.is_empty() => {
                            let tag = String::from_utf8_lossy(name.as_ref()).into_owned();
                            writer.write_event(Event::Start(e.clone())).map_err(write_err)?;
                            self.write_entries(&mut writer, &names, "sldMasterId", &self.added_masters)?;
                            writer
                                .write_event(Event::End(BytesEnd::new(tag)))
                                .map_err(write_err)?;
                        }
                        _ => writer.write_event(Event::Empty(e.clone())).map_err(write_err)?,
                    }
                }
                Event::End(e) if depth == 2 => {
                    if local_name(e.name().as_ref()) == b"sldMasterIdLst" {
                        self.write_entries(&mut writer, &names, "sldMasterId", &self.added_masters)?;
                    }
                    writer.write_event(Event::End(e)).map_err(write_err)?;
                    depth = 1;
                }
                Event::End(e) if depth == 1 => {
                    self.insert_missing(usize::MAX, &mut writer, &names, &mut inserted)?;
                    writer.write_event(Event::End(e)).map_err(write_err)?;
                    depth = 0;
                }
                Event::Start(e) => {
                    writer.write_event(Event::Start(e)).map_err(write_err)?;
                    depth += 1;
                }
                Event::End(e) => {
                    writer.write_event(Event::End(e)).map_err(write_err)?;
                    depth -= 1;
                }
                Event::Eof => break,
                other => writer.write_event(other).map_err(write_err)?,
            }
        }

        String::from_utf8(writer.into_inner())
            .map_err(|e| xml_error("presentation.xml is not UTF-8", e))
    }

    /// Work out element prefixes from the root and declare the relationships
    /// namespace on it if new `r:id` attributes would otherwise be unbound.
    fn prepare_root(&self, root: &BytesStart<'_>, names: &mut Names) -> Result<BytesStart<'static>> {
        let name = root.name();
        names.presentation_prefix =
            prefix(name.as_ref()).map(|p| String::from_utf8_lossy(p).into_owned());

        let mut taken = Vec::new();
        for attr in root.attributes() {
            let attr = attr.map_err(|e| xml_error("bad attribute", e))?;
            let key = attr.key.as_ref();
            if let Some(declared) = key.strip_prefix(b"xmlns:") {
                let value = attr
                    .unescape_value()
                    .map_err(|e| xml_error("bad attribute value", e))?;
                if value == NS_OFFICE_RELATIONSHIPS || value == NS_OFFICE_RELATIONSHIPS_STRICT {
                    names.relationships_prefix = String::from_utf8_lossy(declared).into_owned();
                    return Ok(root.to_owned());
                }
                taken.push(String::from_utf8_lossy(declared).into_owned());
            }
        }

        let mut candidate = "r".to_string();
        let mut n = 1;
        while taken.contains(&candidate) {
            candidate = format!("r{}", n);
            n += 1;
        }
        let mut root = root.to_owned();
        root.push_attribute((format!("xmlns:{}", candidate).as_str(), NS_OFFICE_RELATIONSHIPS));
        names.relationships_prefix = candidate;
        Ok(root)
    }

    /// Emit lists the original lacks once the writer reaches a sibling that
    /// must come after them.
    fn insert_missing(
        &self,
        rank: usize,
        writer: &mut Writer<Vec<u8>>,
        names: &Names,
        inserted: &mut Inserted,
    ) -> Result<()> {
        let write_err = |e| xml_error("Failed to write presentation.xml", e);

        if rank > 0 && !self.has_master_list && !inserted.masters && !self.added_masters.is_empty() {
            let tag = names.element("sldMasterIdLst");
            writer
                .write_event(Event::Start(BytesStart::new(tag.as_str())))
                .map_err(write_err)?;
            self.write_entries(writer, names, "sldMasterId", &self.added_masters)?;
            writer
                .write_event(Event::End(BytesEnd::new(tag)))
                .map_err(write_err)?;
            inserted.masters = true;
        }

        if rank > 1 && !self.has_notes_master_list && !inserted.notes_master {
            if let Some(rel_id) = &self.added_notes_master {
                let tag = names.element("notesMasterIdLst");
                writer
                    .write_event(Event::Start(BytesStart::new(tag.as_str())))
                    .map_err(write_err)?;
                let mut entry = BytesStart::new(names.element("notesMasterId"));
                entry.push_attribute((names.rel_id().as_str(), rel_id.as_str()));
                writer.write_event(Event::Empty(entry)).map_err(write_err)?;
                writer
                    .write_event(Event::End(BytesEnd::new(tag)))
                    .map_err(write_err)?;
                inserted.notes_master = true;
            }
        }

        if rank > 3 && !self.has_slide_list && !inserted.slides {
            self.write_slide_list(writer, names)?;
            inserted.slides = true;
        }

        Ok(())
    }

    fn write_slide_list(&self, writer: &mut Writer<Vec<u8>>, names: &Names) -> Result<()> {
        if self.new_slides.is_empty() {
            return Ok(());
        }
        let write_err = |e| xml_error("Failed to write presentation.xml", e);
        let tag = names.element("sldIdLst");
        writer
            .write_event(Event::Start(BytesStart::new(tag.as_str())))
            .map_err(write_err)?;
        self.write_entries(writer, names, "sldId", &self.new_slides)?;
        writer
            .write_event(Event::End(BytesEnd::new(tag)))
            .map_err(write_err)?;
        Ok(())
    }

    fn write_entries(
        &self,
        writer: &mut Writer<Vec<u8>>,
        names: &Names,
        local: &str,
        entries: &[IdEntry],
    ) -> Result<()> {
        let tag = names.element(local);
        let rel_key = names.rel_id();
        for entry in entries {
            let mut elem = BytesStart::new(tag.as_str());
            elem.push_attribute(("id", entry.id.to_string().as_str()));
            elem.push_attribute((rel_key.as_str(), entry.rel_id.as_str()));
            writer
                .write_event(Event::Empty(elem))
                .map_err(|e| xml_error("Failed to write presentation.xml", e))?;
        }
        Ok(())
    }
}

fn id_entry(e: &BytesStart<'_>) -> Result<Option<IdEntry>> {
    let id = attribute(e, b"id")?.and_then(|v| v.trim().parse::<u32>().ok());
    let rel_id = relationship_ref(e)?;
    Ok(match (id, rel_id) {
        (Some(id), Some(rel_id)) => Some(IdEntry { id, rel_id }),
        _ => None,
    })
}

/// IDs of the `sldLayoutId` entries of a slide master.
pub fn layout_ids(master_xml: &str) -> Result<Vec<u32>> {
    let mut ids = Vec::new();
    let mut reader = Reader::from_str(master_xml);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldLayoutId" =>
            {
                if let Some(id) = attribute(e, b"id")?.and_then(|v| v.trim().parse().ok()) {
                    ids.push(id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("Error parsing slide master", e)),
            _ => {}
        }
    }
    Ok(ids)
}

/// Reissue every `sldLayoutId` ID of a slide master from `next_id`.
pub fn renumber_layout_ids(master_xml: &str, mut next_id: impl FnMut() -> Result<u32>) -> Result<String> {
    let mut reader = Reader::from_str(master_xml);
    let mut writer = Writer::new(Vec::with_capacity(master_xml.len()));
    let write_err = |e| xml_error("Failed to write slide master", e);

    loop {
        let event = reader
            .read_event()
            .map_err(|e| xml_error("Error parsing slide master", e))?;
        match event {
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"sldLayoutId" => {
                let patched = with_new_id(e, next_id()?)?;
                writer.write_event(Event::Empty(patched)).map_err(write_err)?;
            }
            Event::Start(ref e) if local_name(e.name().as_ref()) == b"sldLayoutId" => {
                let patched = with_new_id(e, next_id()?)?;
                writer.write_event(Event::Start(patched)).map_err(write_err)?;
            }
            Event::Eof => break,
            other => writer.write_event(other).map_err(write_err)?,
        }
    }

    String::from_utf8(writer.into_inner()).map_err(|e| xml_error("Slide master is not UTF-8", e))
}

fn with_new_id(e: &BytesStart<'_>, id: u32) -> Result<BytesStart<'static>> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut patched = BytesStart::new(tag);
    let id = id.to_string();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error("bad attribute", err))?;
        if attr.key.as_ref() == b"id" {
            patched.push_attribute(("id", id.as_str()));
        } else {
            patched.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
    }
    Ok(patched.into_owned())
}
