//! Relationship sidecars (`_rels/*.rels`).

use crate::xml::{attribute, local_name, xml_error};
use deck_core::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::fs;
use std::path::Path;

/// Namespace of the `<Relationships>` document.
pub const NS_PACKAGE_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
pub const REL_SLIDE_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
pub const REL_NOTES_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesMaster";

/// Last segment of a relationship type URI (`slideLayout`, `image`, ...).
///
/// Comparing on this makes transitional and strict URIs interchangeable.
pub fn rel_kind(rel_type: &str) -> &str {
    rel_type.rsplit('/').next().unwrap_or(rel_type)
}

/// A single `<Relationship>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl Relationship {
    /// Create an internal relationship.
    pub fn new(id: impl Into<String>, rel_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rel_type: rel_type.into(),
            target: target.into(),
            target_mode: None,
        }
    }

    /// Whether the target lives outside the package (hyperlinks, linked media).
    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("External"))
    }

    /// See [`rel_kind`].
    pub fn kind(&self) -> &str {
        rel_kind(&self.rel_type)
    }
}

/// The relationships of one part, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    entries: Vec<Relationship>,
}

impl Relationships {
    /// Create an empty relationship list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `.rels` document.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut entries = Vec::new();
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if local_name(e.name().as_ref()) == b"Relationship" =>
                {
                    let id = attribute(e, b"Id")?.unwrap_or_default();
                    let rel_type = attribute(e, b"Type")?.unwrap_or_default();
                    let target = attribute(e, b"Target")?.unwrap_or_default();
                    let target_mode = attribute(e, b"TargetMode")?;
                    entries.push(Relationship {
                        id,
                        rel_type,
                        target,
                        target_mode,
                    });
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error("Error parsing relationships", e)),
                _ => {}
            }
        }

        Ok(Self { entries })
    }

    /// Load the `.rels` file at `path`; `None` if it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let xml = fs::read_to_string(path)?;
        Self::parse(&xml).map(Some)
    }

    /// Serialize as a standalone `.rels` document.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        let write_err = |e| xml_error("Failed to write relationships", e);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(write_err)?;

        let mut root = BytesStart::new("Relationships");
        root.push_attribute(("xmlns", NS_PACKAGE_RELATIONSHIPS));
        writer.write_event(Event::Start(root)).map_err(write_err)?;

        for rel in &self.entries {
            let mut elem = BytesStart::new("Relationship");
            elem.push_attribute(("Id", rel.id.as_str()));
            elem.push_attribute(("Type", rel.rel_type.as_str()));
            elem.push_attribute(("Target", rel.target.as_str()));
            if let Some(mode) = &rel.target_mode {
                elem.push_attribute(("TargetMode", mode.as_str()));
            }
            writer.write_event(Event::Empty(elem)).map_err(write_err)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("Relationships")))
            .map_err(write_err)?;

        String::from_utf8(writer.into_inner()).map_err(|e| xml_error("Relationships are not UTF-8", e))
    }

    /// Write to `path`, creating the `_rels` directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_xml()?)?;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Relationship> {
        self.entries.iter_mut()
    }

    pub fn push(&mut self, rel: Relationship) {
        self.entries.push(rel);
    }

    pub fn retain(&mut self, f: impl FnMut(&Relationship) -> bool) {
        self.entries.retain(f);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a relationship by its `Id`.
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.id == id)
    }

    /// First internal relationship of the given kind (see [`rel_kind`]).
    pub fn first_of_kind(&self, kind: &str) -> Option<&Relationship> {
        self.entries
            .iter()
            .find(|r| !r.is_external() && r.kind() == kind)
    }
}
