//! Operations and the deduplication ledger
//!
//! An [`Operation`] is an immutable, serializable description of one causal
//! event - insert, delete, addMark or removeMark - carrying enough data for
//! any replica to replay it. The [`Ledger`] records a deterministic
//! fingerprint of every applied operation so re-delivery over an at-least-once
//! channel is idempotent.

use crate::crdt::mark::{Anchor, MarkType};
use crate::crdt::rga::id::OpId;
use crate::{AuthorId, MarkId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One causal edit event, as exchanged between replicas
///
/// Wire format uses an `action` tag and camelCase fields. Author id,
/// operation id and timestamp must survive every hop bit-exact: ordering
/// correctness depends on comparing them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Operation {
    #[serde(rename_all = "camelCase")]
    Insert {
        op_id: OpId,
        #[serde(rename = "char")]
        ch: char,
        left_id: OpId,
        timestamp: Timestamp,
    },
    #[serde(rename_all = "camelCase")]
    Delete {
        target_id: OpId,
        timestamp: Timestamp,
        author: AuthorId,
    },
    #[serde(rename_all = "camelCase")]
    AddMark {
        mark_id: MarkId,
        start: Anchor,
        end: Anchor,
        mark_type: MarkType,
        #[serde(default)]
        attributes: serde_json::Map<String, Value>,
        can_overlap: bool,
        expand: bool,
        timestamp: Timestamp,
        author: AuthorId,
        counter: u64,
    },
    #[serde(rename_all = "camelCase")]
    RemoveMark {
        mark_id: MarkId,
        timestamp: Timestamp,
        author: AuthorId,
    },
}

impl Operation {
    /// Deterministic fingerprint of this operation's causal content
    ///
    /// Inserts and addMarks are identified by their id alone; deletes and
    /// removeMarks fold in target, timestamp and author so independent
    /// deletions of the same target stay distinguishable.
    pub fn fingerprint(&self) -> String {
        match self {
            Operation::Insert { op_id, .. } => format!("insert-{op_id}"),
            Operation::Delete {
                target_id,
                timestamp,
                author,
            } => format!("delete-{target_id}-{timestamp}-{author}"),
            Operation::AddMark { mark_id, .. } => format!("addMark-{mark_id}"),
            Operation::RemoveMark {
                mark_id,
                timestamp,
                author,
            } => format!("removeMark-{mark_id}-{timestamp}-{author}"),
        }
    }

    /// Timestamp carried by the operation
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Operation::Insert { timestamp, .. }
            | Operation::Delete { timestamp, .. }
            | Operation::AddMark { timestamp, .. }
            | Operation::RemoveMark { timestamp, .. } => *timestamp,
        }
    }

    /// Author that issued the operation
    pub fn author(&self) -> &str {
        match self {
            Operation::Insert { op_id, .. } => &op_id.author,
            Operation::Delete { author, .. }
            | Operation::AddMark { author, .. }
            | Operation::RemoveMark { author, .. } => author,
        }
    }

    /// Id of the inserted character, for insert operations
    pub fn op_id(&self) -> Option<&OpId> {
        match self {
            Operation::Insert { op_id, .. } => Some(op_id),
            _ => None,
        }
    }

    /// Id of the mark, for mark operations
    pub fn mark_id(&self) -> Option<&str> {
        match self {
            Operation::AddMark { mark_id, .. } | Operation::RemoveMark { mark_id, .. } => {
                Some(mark_id)
            }
            _ => None,
        }
    }
}

/// Result of [`crate::Document::apply_operation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The operation mutated the document
    Applied,
    /// The operation was already applied; nothing changed
    Duplicate,
    /// The operation is not yet applicable (missing causal predecessor,
    /// unknown action); it may be re-delivered later
    Ignored,
}

impl ApplyOutcome {
    /// Whether the document changed
    pub fn was_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

/// Set of fingerprints of applied operations
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    applied: HashSet<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an operation with this fingerprint was already applied
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.applied.contains(fingerprint)
    }

    /// Record a fingerprint; returns false if it was already present
    pub fn record(&mut self, fingerprint: String) -> bool {
        self.applied.insert(fingerprint)
    }

    /// Forget a fingerprint so a failed operation can be retried
    pub fn forget(&mut self, fingerprint: &str) {
        self.applied.remove(fingerprint);
    }

    /// Number of recorded fingerprints
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    /// Export for snapshot serialization
    pub fn snapshot_entries(&self) -> Vec<String> {
        self.applied.iter().cloned().collect()
    }

    /// Rebuild from snapshot entries
    pub fn from_entries(entries: Vec<String>) -> Self {
        Self {
            applied: entries.into_iter().collect(),
        }
    }
}
