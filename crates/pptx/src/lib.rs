//! PPTX (Office Open XML) slide merger.
//!
//! Builds a new `.pptx` from individual slides of other presentations. Each
//! slide arrives with its layout, master, theme and media; parts shared by
//! several requested slides of one source are copied once, and every
//! relationship, ID list and content type is rewritten so the result is a
//! self-consistent package.
//!
//! [`PptxParser`] reads a package back for inspection.

pub mod content_types;
pub mod parser;
pub mod partname;
pub mod rels;

mod assemble;
mod category;
mod extract;
mod import;
mod merger;
mod package;
mod presentation;
mod session;
mod xml;

pub use category::PartCategory;
pub use merger::{merge_slides, DeckMerger};
pub use parser::PptxParser;
