//! SeqNode: one character in the replicated sequence
//!
//! Nodes form a doubly-linked list through `left`/`right` neighbor ids rather
//! than direct references, so the store stays an arena and serialization is
//! trivial. Deleted nodes remain in the list as tombstones to keep neighbor
//! references valid for every replica.

use super::id::OpId;
use crate::{AuthorId, Timestamp};
use serde::{Deserialize, Serialize};

/// A single node in the RGA sequence
///
/// The synthetic root carries no character (`ch == None`), is never deleted,
/// and is never removed. Every other node holds exactly one character and is
/// mutated only to toggle its tombstone flag or to relink neighbors when a
/// later insertion splices next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeqNode {
    /// Unique identifier of the insertion that created this node
    pub id: OpId,

    /// The character (None only for the root)
    pub ch: Option<char>,

    /// Left neighbor id (None only for the root)
    pub left: Option<OpId>,

    /// Right neighbor id (None at the end of the sequence)
    pub right: Option<OpId>,

    /// Tombstone flag - deleted nodes are marked, not removed
    pub deleted: bool,

    /// Timestamp of the creating operation
    pub timestamp: Timestamp,

    /// Author that inserted the character (same as `id.author`, kept for
    /// direct access in the ordering comparator)
    pub author: AuthorId,

    /// Author-local counter (same as `id.counter`)
    pub counter: u64,
}

impl SeqNode {
    /// Create a new character node
    pub fn new(id: OpId, ch: char, left: Option<OpId>, timestamp: Timestamp) -> Self {
        Self {
            author: id.author.clone(),
            counter: id.counter,
            id,
            ch: Some(ch),
            left,
            right: None,
            deleted: false,
            timestamp,
        }
    }

    /// Create the synthetic root node (`0@root`, no character, timestamp 0)
    pub fn root() -> Self {
        let id = OpId::root();
        Self {
            author: id.author.clone(),
            counter: 0,
            id,
            ch: None,
            left: None,
            right: None,
            deleted: false,
            timestamp: 0,
        }
    }

    /// Whether this node contributes a character to the visible text
    pub fn is_visible(&self) -> bool {
        !self.deleted && self.ch.is_some()
    }

    /// Mark this node as deleted (tombstone)
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }
}
