//! The package-wide content-type declarations (`[Content_Types].xml`).

use crate::partname::{self, part_uri};
use crate::xml::{attribute, local_name, xml_error};
use deck_core::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::fs;
use std::path::Path;

/// ZIP member name of the content-types document.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Namespace of the `<Types>` document.
pub const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

pub const CT_PRESENTATION_MAIN: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
pub const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
pub const CT_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
pub const CT_XML: &str = "application/xml";

/// Parsed `Default` (by extension) and `Override` (by part name) entries.
///
/// Entries keep their document order so a rewritten file diffs cleanly
/// against the original.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    /// Create an empty declaration set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `[Content_Types].xml` document.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut types = Self::new();
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    match local_name(e.name().as_ref()) {
                        b"Default" => {
                            if let (Some(ext), Some(ct)) =
                                (attribute(e, b"Extension")?, attribute(e, b"ContentType")?)
                            {
                                types.defaults.push((ext.to_ascii_lowercase(), ct));
                            }
                        }
                        b"Override" => {
                            if let (Some(part), Some(ct)) =
                                (attribute(e, b"PartName")?, attribute(e, b"ContentType")?)
                            {
                                types.overrides.push((part, ct));
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error("Error parsing content types", e)),
                _ => {}
            }
        }

        Ok(types)
    }

    /// Load the content types of an extracted package rooted at `root`.
    ///
    /// A package without the document yields an empty set.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONTENT_TYPES_PART);
        if !path.is_file() {
            log::debug!("No {} under {}", CONTENT_TYPES_PART, root.display());
            return Ok(Self::new());
        }
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Content type declared for an extension (case-insensitive).
    pub fn default_for(&self, ext: &str) -> Option<&str> {
        self.defaults
            .iter()
            .find(|(e, _)| e.eq_ignore_ascii_case(ext))
            .map(|(_, ct)| ct.as_str())
    }

    /// Content type explicitly declared for `part` (a package-relative name).
    ///
    /// Part names compare case-insensitively, as OPC requires.
    pub fn override_for(&self, part: &str) -> Option<&str> {
        let uri = part_uri(part);
        self.overrides
            .iter()
            .find(|(p, _)| p.eq_ignore_ascii_case(&uri))
            .map(|(_, ct)| ct.as_str())
    }

    /// Effective content type of `part`: its override, else its extension default.
    pub fn lookup(&self, part: &str) -> Option<&str> {
        self.override_for(part)
            .or_else(|| self.default_for(partname::extension(part)))
    }

    /// Whether `part` already resolves to `content_type`.
    pub fn covers(&self, part: &str, content_type: &str) -> bool {
        self.lookup(part) == Some(content_type)
    }

    /// Add a `Default` unless the extension already has one.
    pub fn ensure_default(&mut self, ext: &str, content_type: &str) -> bool {
        if self.default_for(ext).is_some() {
            return false;
        }
        self.defaults
            .push((ext.to_ascii_lowercase(), content_type.to_string()));
        true
    }

    /// Insert or replace the `Override` for `part`.
    pub fn set_override(&mut self, part: &str, content_type: &str) {
        let uri = part_uri(part);
        match self
            .overrides
            .iter_mut()
            .find(|(p, _)| p.eq_ignore_ascii_case(&uri))
        {
            Some(entry) => entry.1 = content_type.to_string(),
            None => self.overrides.push((uri, content_type.to_string())),
        }
    }

    /// Keep only overrides whose package-relative part name passes `keep`.
    ///
    /// Returns how many were dropped.
    pub fn retain_overrides(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.overrides.len();
        self.overrides
            .retain(|(uri, _)| keep(uri.trim_start_matches('/')));
        before - self.overrides.len()
    }

    /// Serialize as a `[Content_Types].xml` document.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        let write_err = |e| xml_error("Failed to write content types", e);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(write_err)?;

        let mut root = BytesStart::new("Types");
        root.push_attribute(("xmlns", NS_CONTENT_TYPES));
        writer.write_event(Event::Start(root)).map_err(write_err)?;

        for (ext, ct) in &self.defaults {
            let mut elem = BytesStart::new("Default");
            elem.push_attribute(("Extension", ext.as_str()));
            elem.push_attribute(("ContentType", ct.as_str()));
            writer.write_event(Event::Empty(elem)).map_err(write_err)?;
        }
        for (part, ct) in &self.overrides {
            let mut elem = BytesStart::new("Override");
            elem.push_attribute(("PartName", part.as_str()));
            elem.push_attribute(("ContentType", ct.as_str()));
            writer.write_event(Event::Empty(elem)).map_err(write_err)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("Types")))
            .map_err(write_err)?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| xml_error("Content types are not UTF-8", e))
    }

    /// Write the document into the package rooted at `root`.
    pub fn save(&self, root: &Path) -> Result<()> {
        fs::write(root.join(CONTENT_TYPES_PART), self.to_xml()?)?;
        Ok(())
    }
}

/// Best-effort content type for a part whose source declared none.
pub fn guess_content_type(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "xml" => CT_XML,
        "rels" => CT_RELATIONSHIPS,
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        "wdp" => "image/vnd.ms-photo",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "wmv" => "video/x-ms-wmv",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "wma" => "audio/x-ms-wma",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "bin" => "application/vnd.openxmlformats-officedocument.oleObject",
        _ => "application/octet-stream",
    }
}
