//! Read-only PPTX inspection: slide order, titles, and text.

use crate::extract::DEFAULT_MAIN_PART;
use crate::partname::{rels_path, resolve_target};
use crate::presentation::PresentationDocument;
use crate::rels::{Relationships, REL_OFFICE_DOCUMENT};
use crate::xml::{attribute, local_name};
use deck_core::{DeckSummary, Error, Result, SlideSummary};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// Parser for PPTX (Office Open XML) files.
pub struct PptxParser;

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a PPTX file from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R, filename: &str) -> Result<DeckSummary> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut summary = DeckSummary::new(filename);
        for (idx, slide_path) in self.slide_order(&mut archive)?.iter().enumerate() {
            let slide = self.parse_slide(&mut archive, slide_path, idx + 1)?;
            summary.add_slide(slide);
        }

        Ok(summary)
    }

    /// Parse the PPTX file at `path`.
    pub fn parse_file(&self, path: &Path) -> Result<DeckSummary> {
        let file = File::open(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");
        self.parse(BufReader::new(file), filename)
    }

    /// Slide parts in `sldIdLst` order.
    fn slide_order<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
        let main_part = self.main_part(archive)?;
        let document = PresentationDocument::parse(&self.read_file_from_archive(archive, &main_part)?)?;
        let rels = match self.read_file_from_archive(archive, &rels_path(&main_part)) {
            Ok(xml) => Relationships::parse(&xml)?,
            Err(_) => Relationships::new(),
        };

        let mut slides = Vec::with_capacity(document.slides.len());
        for entry in &document.slides {
            match rels
                .get(&entry.rel_id)
                .filter(|r| !r.is_external())
                .and_then(|r| resolve_target(&main_part, &r.target))
            {
                Some(part) => slides.push(part),
                None => log::warn!("Slide ID {} has no resolvable relationship {}", entry.id, entry.rel_id),
            }
        }
        Ok(slides)
    }

    /// The main document named by `_rels/.rels`, else the conventional one.
    fn main_part<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<String> {
        let root_rels = match self.read_file_from_archive(archive, &rels_path("")) {
            Ok(xml) => Relationships::parse(&xml)?,
            Err(_) => return Ok(DEFAULT_MAIN_PART.to_string()),
        };
        let main_part = root_rels
            .iter()
            .filter(|r| !r.is_external())
            .find(|r| r.rel_type == REL_OFFICE_DOCUMENT || r.kind() == "officeDocument")
            .and_then(|r| resolve_target("", &r.target))
            .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string());
        Ok(main_part)
    }

    /// Parse a single slide from the archive.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        slide_number: usize,
    ) -> Result<SlideSummary> {
        let content = self.read_file_from_archive(archive, slide_path)?;
        let mut slide = SlideSummary::new(slide_number, slide_path);

        for shape in self.extract_shapes_from_xml(&content)? {
            if shape.is_title && slide.title.is_none() {
                slide.title = Some(shape.text.clone());
            }
            slide.add_line(shape.text);
        }

        Ok(slide)
    }

    /// Text of every shape, in document order.
    fn extract_shapes_from_xml(&self, xml_content: &str) -> Result<Vec<ShapeInfo>> {
        let mut shapes = Vec::new();
        let mut reader = Reader::from_str(xml_content);

        let mut current_shape: Option<ShapeInfo> = None;
        let mut in_text_body = false;
        let mut in_text = false;
        let mut current_text = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                    b"sp" => current_shape = Some(ShapeInfo::default()),
                    b"ph" => mark_placeholder(&mut current_shape, e)?,
                    b"txBody" => in_text_body = true,
                    b"p" if in_text_body => {
                        if !current_text.is_empty() {
                            current_text.push('\n');
                        }
                    }
                    b"t" if in_text_body => in_text = true,
                    _ => {}
                },
                Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                    b"ph" => mark_placeholder(&mut current_shape, e)?,
                    b"br" if in_text_body => current_text.push('\n'),
                    _ => {}
                },
                Ok(Event::Text(ref e)) => {
                    if in_text {
                        let text = e.unescape().unwrap_or_default();
                        current_text.push_str(&text);
                    }
                }
                Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                    b"sp" => {
                        if let Some(mut shape) = current_shape.take() {
                            shape.text = current_text.trim().to_string();
                            if !shape.text.is_empty() {
                                shapes.push(shape);
                            }
                        }
                        current_text.clear();
                        in_text_body = false;
                        in_text = false;
                    }
                    b"txBody" => in_text_body = false,
                    b"t" => in_text = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    log::warn!("XML parsing error, keeping text read so far: {}", e);
                    break;
                }
                _ => {}
            }
        }

        Ok(shapes)
    }

    /// Read a file from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Text gathered from one `p:sp` shape.
#[derive(Debug, Default)]
struct ShapeInfo {
    text: String,
    is_title: bool,
}

/// Flag the current shape if `ph` marks it as a title placeholder.
fn mark_placeholder(shape: &mut Option<ShapeInfo>, ph: &quick_xml::events::BytesStart<'_>) -> Result<()> {
    if let Some(shape) = shape.as_mut() {
        let kind = attribute(ph, b"type")?;
        shape.is_title = matches!(kind.as_deref(), Some("title") | Some("ctrTitle"));
    }
    Ok(())
}
