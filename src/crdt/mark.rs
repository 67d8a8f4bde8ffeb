//! Formatting marks anchored to sequence positions
//!
//! Rich-text formatting is stored as content-anchored ranges rather than
//! index ranges, so both the range and the author's intent survive concurrent
//! edits. An anchor is an (operation id, side) pair: `before` binds to the
//! gap left of a character, `after` to the gap right of it.

use super::rga::id::OpId;
use crate::{AuthorId, MarkId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which side of a character an anchor binds to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AnchorSide {
    Before,
    After,
}

/// A stable position reference: (character id, side)
///
/// Anchors keep mark boundaries valid across surrounding edits where raw
/// indices would drift.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Anchor {
    pub op_id: OpId,
    pub side: AnchorSide,
}

impl Anchor {
    pub fn new(op_id: OpId, side: AnchorSide) -> Self {
        Self { op_id, side }
    }

    /// Anchor binding before the given character
    pub fn before(op_id: OpId) -> Self {
        Self::new(op_id, AnchorSide::Before)
    }

    /// Anchor binding after the given character
    pub fn after(op_id: OpId) -> Self {
        Self::new(op_id, AnchorSide::After)
    }
}

/// Kind of formatting a mark applies
///
/// Serialized as a plain string on the wire ("bold", "comment", ...), with
/// unknown strings preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MarkType {
    Bold,
    Italic,
    Underline,
    Color,
    BackgroundColor,
    Comment,
    Other(String),
}

impl From<String> for MarkType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "bold" => MarkType::Bold,
            "italic" => MarkType::Italic,
            "underline" => MarkType::Underline,
            "color" => MarkType::Color,
            "backgroundColor" => MarkType::BackgroundColor,
            "comment" => MarkType::Comment,
            _ => MarkType::Other(s),
        }
    }
}

impl From<MarkType> for String {
    fn from(t: MarkType) -> Self {
        match t {
            MarkType::Bold => "bold".to_string(),
            MarkType::Italic => "italic".to_string(),
            MarkType::Underline => "underline".to_string(),
            MarkType::Color => "color".to_string(),
            MarkType::BackgroundColor => "backgroundColor".to_string(),
            MarkType::Comment => "comment".to_string(),
            MarkType::Other(s) => s,
        }
    }
}

/// Per-mark behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkConfig {
    /// Whether this mark tolerates overlapping with other marks
    pub can_overlap: bool,
    /// Whether boundary anchors grow to cover characters inserted at them
    pub expand: bool,
}

impl Default for MarkConfig {
    fn default() -> Self {
        Self {
            can_overlap: true,
            expand: true,
        }
    }
}

/// A formatting range over the character sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub mark_id: MarkId,
    pub start: Anchor,
    pub end: Anchor,
    pub mark_type: MarkType,
    pub attributes: serde_json::Map<String, Value>,
    pub can_overlap: bool,
    pub expand: bool,
    pub deleted: bool,
    pub timestamp: Timestamp,
    pub author: AuthorId,
    pub counter: u64,
}

impl Mark {
    /// Mark this mark as removed (tombstone); physically dropped only by
    /// garbage collection
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }
}

/// Overlap policy table
///
/// Same-type boolean attributes (bold/italic/underline) do not coexist
/// meaningfully; same-type color-like attributes conflict and need external
/// resolution; comments always overlap; everything else defers to the marks'
/// own overlap flags.
pub fn can_marks_overlap(a: &Mark, b: &Mark) -> bool {
    if a.mark_type == b.mark_type {
        return match a.mark_type {
            MarkType::Bold | MarkType::Italic | MarkType::Underline => false,
            MarkType::Color | MarkType::BackgroundColor => false,
            MarkType::Comment => true,
            MarkType::Other(_) => a.can_overlap && b.can_overlap,
        };
    }
    a.can_overlap && b.can_overlap
}
