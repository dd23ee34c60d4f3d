//! Annotation documents: symbol boxes plus a provenance log.
//!
//! The persisted format is XML. The root holds an ordered list of symbol
//! nodes, each with exactly one `bbox` child carrying integer attributes
//! `x`, `y`, `w`, `h`:
//!
//! ```text
//! <museScore>
//!   <Symbol shape="noteheadBlack">
//!     <bbox x="120" y="48" w="11" h="9"/>
//!   </Symbol>
//!   <deterioration>
//!     <rotation angle="2"/>
//!     <saltAndPepperNoise saltVsPepperRatio="0.5" amount="0.01"/>
//!   </deterioration>
//! </museScore>
//! ```
//!
//! The `deterioration` node records every applied distortion, newest first.
//! Numbers are parsed on load and only turned back into text on save.

mod model;

use std::path::PathBuf;

use thiserror::Error;

pub use model::{AnnotationDocument, ProvenanceEntry, Symbol, BBOX_TAG, PROVENANCE_TAG};

/// Errors that can occur while loading or saving a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The annotation file does not exist.
    #[error("Annotation file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The document is not well-formed or lacks the expected structure.
    #[error("Malformed annotation document: {0}")]
    Parse(String),

    /// The tree could not be serialised.
    #[error("Cannot serialise annotation document: {0}")]
    Serialize(String),

    /// Reading or writing the file failed.
    #[error("I/O error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}
