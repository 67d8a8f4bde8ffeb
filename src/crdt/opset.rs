//! Anchor op-sets: formatting operations recorded at anchor positions
//!
//! Every addMark/removeMark (and every boundary expansion) records an entry
//! at the anchors it touches. The op-set at an anchor is what resolves which
//! formatting is in effect there when overlapping marks disagree.
//!
//! Looking up the nearest preceding op-set is a linear backward scan over the
//! sequence. That is acceptable for small-to-medium documents; a position
//! index over anchors would make it sub-linear if it ever shows up in
//! profiles.

use super::mark::{Anchor, AnchorSide, Mark, MarkType};
use super::rga::sequence::NodeStore;
use crate::{AuthorId, MarkId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// What a recorded formatting operation did
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum AnchorOpKind {
    AddMark,
    RemoveMark,
}

/// One formatting operation recorded at an anchor
///
/// Field order matters: the derived `Ord` sorts by timestamp, then author,
/// then counter, which keeps op-set iteration deterministic across replicas.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AnchorOp {
    pub timestamp: Timestamp,
    pub author: AuthorId,
    pub counter: u64,
    pub kind: AnchorOpKind,
    pub mark_id: MarkId,
    pub mark_type: Option<MarkType>,
}

impl AnchorOp {
    /// Entry for an addMark (or boundary expansion) touching an anchor
    pub fn added(mark: &Mark) -> Self {
        Self {
            timestamp: mark.timestamp,
            author: mark.author.clone(),
            counter: mark.counter,
            kind: AnchorOpKind::AddMark,
            mark_id: mark.mark_id.clone(),
            mark_type: Some(mark.mark_type.clone()),
        }
    }

    /// Entry for a removeMark touching an anchor
    pub fn removed(mark: &Mark, timestamp: Timestamp, author: AuthorId) -> Self {
        Self {
            timestamp,
            author,
            counter: mark.counter,
            kind: AnchorOpKind::RemoveMark,
            mark_id: mark.mark_id.clone(),
            mark_type: None,
        }
    }
}

/// Mapping from anchor position to the formatting operations recorded there
#[derive(Debug, Clone, Default)]
pub struct AnchorOpSets {
    sets: HashMap<Anchor, BTreeSet<AnchorOp>>,
}

impl AnchorOpSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an operation at an anchor
    ///
    /// A brand-new anchor position inherits a copy of the nearest preceding
    /// op-set before the new entry lands, so formatting state at the anchor
    /// reflects everything already in effect there.
    pub fn record(&mut self, anchor: &Anchor, op: AnchorOp, store: &NodeStore) {
        if !self.sets.contains_key(anchor) {
            let seed = self.find_previous(anchor, store);
            self.sets.insert(anchor.clone(), seed);
        }
        self.sets
            .get_mut(anchor)
            .expect("op-set was just inserted")
            .insert(op);
    }

    /// Operations recorded exactly at this anchor
    pub fn ops_at(&self, anchor: &Anchor) -> Option<&BTreeSet<AnchorOp>> {
        self.sets.get(anchor)
    }

    /// Nearest preceding op-set: walk backwards through the sequence from the
    /// anchor's character, checking the after side then the before side of
    /// each earlier node. Linear in document length.
    pub fn find_previous(&self, anchor: &Anchor, store: &NodeStore) -> BTreeSet<AnchorOp> {
        let ordered = store.ordered_ids();
        let Some(char_index) = ordered.iter().position(|id| *id == anchor.op_id) else {
            return BTreeSet::new();
        };

        for id in ordered[..char_index].iter().rev() {
            let after = Anchor::new(id.clone(), AnchorSide::After);
            if let Some(set) = self.sets.get(&after) {
                return set.clone();
            }
            let before = Anchor::new(id.clone(), AnchorSide::Before);
            if let Some(set) = self.sets.get(&before) {
                return set.clone();
            }
        }
        BTreeSet::new()
    }

    /// Drop op-sets whose anchor character no longer exists
    pub fn retain_existing(&mut self, store: &NodeStore) {
        self.sets.retain(|anchor, _| store.contains(&anchor.op_id));
    }

    /// Number of anchors with recorded operations
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Export as plain pairs for snapshot serialization
    pub fn snapshot_entries(&self) -> Vec<(Anchor, Vec<AnchorOp>)> {
        self.sets
            .iter()
            .map(|(anchor, ops)| (anchor.clone(), ops.iter().cloned().collect()))
            .collect()
    }

    /// Rebuild from snapshot pairs
    pub fn from_entries(entries: Vec<(Anchor, Vec<AnchorOp>)>) -> Self {
        Self {
            sets: entries
                .into_iter()
                .map(|(anchor, ops)| (anchor, ops.into_iter().collect()))
                .collect(),
        }
    }
}
