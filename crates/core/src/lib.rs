//! Core domain types, options, and error taxonomy for assembling
//! PowerPoint decks out of slides taken from other decks.

pub mod error;
pub mod options;
pub mod report;
pub mod types;

pub use error::{Error, Result};
pub use options::{Compression, MergeOptions};
pub use report::{MergeReport, MergeWarning};
pub use types::{DeckSummary, ParseSlideRequestError, PresentationFormat, SlideRequest, SlideSummary};
