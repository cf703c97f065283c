//! The annotation data model: provenance kinds, options, and tagged
//! intervals. Closed over a fixed kind set, with a flat metadata record per
//! interval rather than a generic string payload.

use serde::{Deserialize, Serialize};

use crate::position::Range;

/// The closed set of provenance kinds. Serialises to the exact wire strings
/// the persisted-record format expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvenanceKind {
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "USER_EDIT")]
    UserEdit,
    #[serde(rename = "AI_GENERATED")]
    AiGenerated,
    #[serde(rename = "UNDO_REDO")]
    UndoRedo,
    #[serde(rename = "PASTE")]
    Paste,
    #[serde(rename = "IDE_PASTE")]
    IdePaste,
}

/// Optional provenance metadata. Every field defaults to empty string when
/// absent and is omitted from serialised output when empty so that a
/// load/save round trip with no new edits reproduces the same JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceOptions {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub paste_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub paste_title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ai_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ai_model: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ai_explanation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ai_type: String,
}

impl ProvenanceOptions {
    pub fn is_empty(&self) -> bool {
        self == &ProvenanceOptions::default()
    }
}

/// A range of text annotated with who or what produced it.
///
/// Equality requires equality on every field, including `creation_ts`: two
/// intervals covering the same text but created at different times are
/// distinct values.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedInterval {
    pub range: Range,
    pub kind: ProvenanceKind,
    /// Milliseconds since epoch. Assigned once at creation and never
    /// rewritten afterwards.
    pub creation_ts: i64,
    pub author: String,
    pub options: ProvenanceOptions,
}

impl TaggedInterval {
    pub fn new(range: Range, kind: ProvenanceKind, creation_ts: i64) -> Self {
        TaggedInterval { range, kind, creation_ts, author: String::new(), options: ProvenanceOptions::default() }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_options(mut self, options: ProvenanceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}
