//! OpId: Unique identifier for sequence nodes
//!
//! Each character in the sequence is keyed by the id of the operation that
//! inserted it: an author-local counter paired with the author id. Ids are
//! unique per author, immutable once assigned, and never reused.

use crate::AuthorId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Author id of the synthetic root node
pub const ROOT_AUTHOR: &str = "root";

/// Unique identifier for a sequence node
///
/// Combines an author-local counter with the author id for global uniqueness.
/// Displayed as `"counter@author"`; the synthetic root is `0@root`.
///
/// The derived ordering (counter, then author) is only used for deterministic
/// iteration in tests and debugging output. Concurrent-insert ordering is
/// decided by the RGA comparator in
/// [`NodeStore`](crate::crdt::rga::sequence::NodeStore), which compares
/// timestamps first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId {
    /// Author-local operation counter (1-based; 0 is reserved for the root)
    pub counter: u64,

    /// Author that issued the operation
    pub author: AuthorId,
}

impl OpId {
    /// Create a new OpId
    pub fn new(counter: u64, author: impl Into<AuthorId>) -> Self {
        Self {
            counter,
            author: author.into(),
        }
    }

    /// The id of the synthetic root node (`0@root`)
    pub fn root() -> Self {
        Self::new(0, ROOT_AUTHOR)
    }

    /// Check whether this is the root id
    pub fn is_root(&self) -> bool {
        self.counter == 0 && self.author == ROOT_AUTHOR
    }
}

impl PartialOrd for OpId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpId {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.counter.cmp(&other.counter) {
            Ordering::Equal => self.author.cmp(&other.author),
            other => other,
        }
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.counter, self.author)
    }
}
