//! Domain types for merge requests and inspected presentations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// One requested slide: a local source package and a 1-based slide index.
///
/// The order of requests handed to a merge is the order of slides in the
/// output deck.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlideRequest {
    /// Path to a locally available `.pptx` file.
    pub source: PathBuf,

    /// 1-based position in the source's slide list.
    #[serde(rename = "slide")]
    pub index: usize,
}

impl SlideRequest {
    /// Create a new request for slide `index` of `source`.
    pub fn new(source: impl Into<PathBuf>, index: usize) -> Self {
        Self {
            source: source.into(),
            index,
        }
    }
}

impl fmt::Display for SlideRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source.display(), self.index)
    }
}

/// Error returned when a `PATH:INDEX` string cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected PATH:INDEX, got '{0}'")]
pub struct ParseSlideRequestError(String);

impl FromStr for SlideRequest {
    type Err = ParseSlideRequestError;

    /// Parse `PATH:INDEX`. The index is taken after the last colon so Windows
    /// drive letters survive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, index) = s
            .rsplit_once(':')
            .ok_or_else(|| ParseSlideRequestError(s.to_string()))?;
        if path.is_empty() {
            return Err(ParseSlideRequestError(s.to_string()));
        }
        let index = index
            .trim()
            .parse::<usize>()
            .map_err(|_| ParseSlideRequestError(s.to_string()))?;
        Ok(Self::new(path, index))
    }
}

/// The format of a presentation file, as detected from its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationFormat {
    /// Modern PPTX (Office Open XML).
    Pptx,
    /// Legacy PPT (OLE/CFB binary). Cannot be merged.
    Ppt,
}

impl PresentationFormat {
    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PPTX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Pptx);
        }

        // PPT is an OLE/CFB file (D0 CF 11 E0 A1 B1 1A E1)
        if bytes.len() >= 8
            && bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1])
        {
            return Some(Self::Ppt);
        }

        None
    }
}

/// Summary of a presentation read back from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckSummary {
    /// Original filename (without path).
    pub filename: String,

    /// Slides in presentation order.
    pub slides: Vec<SlideSummary>,
}

impl DeckSummary {
    /// Create an empty summary for `filename`.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            slides: Vec::new(),
        }
    }

    /// Add a slide to the summary.
    pub fn add_slide(&mut self, slide: SlideSummary) {
        self.slides.push(slide);
    }
}

/// A single slide of an inspected presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideSummary {
    /// 1-based slide number.
    pub number: usize,

    /// Package part holding the slide, e.g. `ppt/slides/slide3.xml`.
    pub part: String,

    /// Text of the title (or centered title) placeholder, if any.
    pub title: Option<String>,

    /// Text of every shape on the slide, in document order.
    pub lines: Vec<String>,
}

impl SlideSummary {
    /// Create a new slide with the given number and part name.
    pub fn new(number: usize, part: impl Into<String>) -> Self {
        Self {
            number,
            part: part.into(),
            title: None,
            lines: Vec::new(),
        }
    }

    /// Add a text line to this slide.
    pub fn add_line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }
}
