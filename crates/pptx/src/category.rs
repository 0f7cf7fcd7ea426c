//! Classification of package parts into naming buckets.

use crate::partname;

/// The bucket a part is renamed into when it is imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartCategory {
    Slide,
    SlideLayout,
    SlideMaster,
    Theme,
    Media,
    NotesSlide,
    NotesMaster,
    /// Anything else (charts, diagrams, embeddings, tags, ...).
    Other,
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "svg", "tif", "tiff", "ico", "emf", "wmf", "wdp",
];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "wmv", "m4v", "mpg", "mpeg"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "wma", "m4a", "aac", "mid"];

impl PartCategory {
    pub const ALL: [PartCategory; 8] = [
        PartCategory::Slide,
        PartCategory::SlideLayout,
        PartCategory::SlideMaster,
        PartCategory::Theme,
        PartCategory::Media,
        PartCategory::NotesSlide,
        PartCategory::NotesMaster,
        PartCategory::Other,
    ];

    /// Classify a relationship target.
    ///
    /// The relationship `Type` decides first (its last URI segment, so both
    /// transitional and strict spellings match); the target's extension is
    /// only consulted for media when the type says nothing useful.
    pub fn classify(rel_type: &str, target_part: &str) -> Self {
        let kind = rel_type.rsplit('/').next().unwrap_or(rel_type);
        match kind {
            "slide" => Self::Slide,
            "slideLayout" => Self::SlideLayout,
            "slideMaster" => Self::SlideMaster,
            "theme" => Self::Theme,
            "image" | "video" | "audio" | "media" | "hdphoto" => Self::Media,
            "notesSlide" => Self::NotesSlide,
            "notesMaster" => Self::NotesMaster,
            _ => Self::from_extension(partname::extension(target_part)),
        }
    }

    fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        let ext = ext.as_str();
        if IMAGE_EXTENSIONS.contains(&ext)
            || VIDEO_EXTENSIONS.contains(&ext)
            || AUDIO_EXTENSIONS.contains(&ext)
        {
            Self::Media
        } else {
            Self::Other
        }
    }

    /// Category of an existing part, judged by the folder it lives in.
    pub fn from_folder(part: &str) -> Option<Self> {
        let dir = partname::directory(part);
        Self::ALL.into_iter().find(|c| c.folder() == dir)
    }

    /// Destination folder for parts of this category.
    pub fn folder(self) -> &'static str {
        match self {
            Self::Slide => "ppt/slides",
            Self::SlideLayout => "ppt/slideLayouts",
            Self::SlideMaster => "ppt/slideMasters",
            Self::Theme => "ppt/theme",
            Self::Media => "ppt/media",
            Self::NotesSlide => "ppt/notesSlides",
            Self::NotesMaster => "ppt/notesMasters",
            Self::Other => "ppt/other",
        }
    }

    /// File-name prefix for numbered parts of this category.
    ///
    /// `Other` has none; those parts keep their original stem plus a suffix.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            Self::Slide => Some("slide"),
            Self::SlideLayout => Some("slideLayout"),
            Self::SlideMaster => Some("slideMaster"),
            Self::Theme => Some("theme"),
            Self::Media => Some("image"),
            Self::NotesSlide => Some("notesSlide"),
            Self::NotesMaster => Some("notesMaster"),
            Self::Other => None,
        }
    }

    /// New part name for the `number`th part of this category.
    pub fn part_name(self, number: u32, original: &str) -> String {
        let ext = partname::extension(original);
        let base = match self.prefix() {
            Some(prefix) => format!("{}{}", prefix, number),
            None => format!("{}_{}", partname::stem(original), number),
        };
        if ext.is_empty() {
            format!("{}/{}", self.folder(), base)
        } else {
            format!("{}/{}.{}", self.folder(), base, ext)
        }
    }
}
