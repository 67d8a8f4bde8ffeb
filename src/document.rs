//! Document facade: the public surface of the CRDT core
//!
//! Composes the sequence store, the mark store, the anchor op-set index and
//! the deduplication ledger. Local edits go through the direct-splice fast
//! path, get recorded in the ledger and are returned as [`Operation`] values
//! for the caller to broadcast. Remote edits enter through
//! [`Document::apply_operation`], which deduplicates, dispatches and rolls
//! back the fingerprint when a handler cannot run yet.
//!
//! The document is single-threaded and cooperative: every public call
//! completes fully before returning. A host exposing one document to
//! concurrent callers must serialize access externally.

use crate::crdt::clock::LamportClock;
use crate::crdt::mark::{Anchor, AnchorSide, Mark, MarkConfig, MarkType};
use crate::crdt::opset::{AnchorOp, AnchorOpSets};
use crate::crdt::rga::id::OpId;
use crate::crdt::rga::node::SeqNode;
use crate::crdt::rga::sequence::NodeStore;
use crate::error::{DocError, Result};
use crate::op::{ApplyOutcome, Ledger, Operation};
use crate::{AuthorId, MarkId};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// A collaborative rich-text document replica
///
/// # Example
///
/// ```rust
/// use peritext_core::Document;
///
/// let mut alice = Document::new("alice".to_string());
/// let mut bob = Document::new("bob".to_string());
///
/// let op = alice.insert('x', None).unwrap();
/// bob.apply_operation(&op);
///
/// assert_eq!(alice.get_text(), bob.get_text());
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    author: AuthorId,
    counter: u64,
    mark_counter: u64,
    clock: LamportClock,
    store: NodeStore,
    marks: HashMap<MarkId, Mark>,
    op_sets: AnchorOpSets,
    ledger: Ledger,
}

/// Serialized document state: plain, order-independent, non-cyclic
///
/// Neighbor links are stored as ids, so the snapshot carries no
/// replica-specific identity beyond the author's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub author: AuthorId,
    pub counter: u64,
    pub mark_counter: u64,
    pub clock: u64,
    pub root_id: OpId,
    pub nodes: Vec<SeqNode>,
    pub marks: Vec<Mark>,
    pub op_sets: Vec<(Anchor, Vec<AnchorOp>)>,
    pub applied: Vec<String>,
}

impl Document {
    /// Create an empty document for the given author
    pub fn new(author: AuthorId) -> Self {
        Self {
            author,
            counter: 0,
            mark_counter: 0,
            clock: LamportClock::new(),
            store: NodeStore::new(),
            marks: HashMap::new(),
            op_sets: AnchorOpSets::new(),
            ledger: Ledger::new(),
        }
    }

    /// Build a document by replaying a plain-text string as local inserts
    ///
    /// Legacy import path for callers whose persisted snapshot is unreadable.
    pub fn from_plain_text(text: &str, author: AuthorId) -> Result<Self> {
        let mut doc = Self::new(author);
        let mut left: Option<OpId> = None;
        for ch in text.chars() {
            let op = doc.insert(ch, left.take())?;
            left = op.op_id().cloned();
        }
        Ok(doc)
    }

    /// Author id of this replica
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Current Lamport clock value
    pub fn clock_value(&self) -> u64 {
        self.clock.value()
    }

    /// Visible text of the document
    pub fn get_text(&self) -> String {
        self.store.text()
    }

    /// All sequence nodes in document order, tombstones included, root
    /// excluded
    pub fn ordered_sequence(&self) -> Vec<&SeqNode> {
        self.store.ordered_nodes()
    }

    /// Look up a sequence node by id (tombstones included)
    pub fn node(&self, id: &OpId) -> Option<&SeqNode> {
        self.store.get(id)
    }

    /// Number of sequence nodes excluding the root, tombstones included
    pub fn node_count(&self) -> usize {
        self.store.node_count()
    }

    /// Number of recorded operation fingerprints
    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    /// Id of the visible character at a text index
    pub fn op_id_at_index(&self, index: usize) -> Option<OpId> {
        self.store.op_id_at_index(index)
    }

    /// Visible text index of a character, None if unknown or deleted
    pub fn index_of(&self, id: &OpId) -> Option<usize> {
        self.store.index_of(id)
    }

    /// Left neighbor id for inserting at a cursor position
    pub fn left_id_for_cursor(&self, cursor: usize) -> OpId {
        self.store.left_id_for_cursor(cursor)
    }

    /// Look up a mark by id (tombstones included)
    pub fn mark(&self, mark_id: &str) -> Option<&Mark> {
        self.marks.get(mark_id)
    }

    /// All non-deleted marks, ordered by mark id
    pub fn active_marks(&self) -> Vec<&Mark> {
        let mut active: Vec<&Mark> = self.marks.values().filter(|m| !m.deleted).collect();
        active.sort_by(|a, b| a.mark_id.cmp(&b.mark_id));
        active
    }

    /// Formatting operations recorded at an anchor
    pub fn ops_at_anchor(&self, anchor: &Anchor) -> Option<&std::collections::BTreeSet<AnchorOp>> {
        self.op_sets.ops_at(anchor)
    }

    // ------------------------------------------------------------------
    // Local edits
    // ------------------------------------------------------------------

    /// Insert a character after the given left neighbor (None = beginning)
    ///
    /// Local fast path: the new id cannot be contended, so the node is
    /// spliced directly after its left neighbor with no comparator scan.
    /// Returns the operation to broadcast.
    pub fn insert(&mut self, ch: char, left: Option<OpId>) -> Result<Operation> {
        let left_id = left.unwrap_or_else(|| self.store.root_id().clone());
        if !self.store.contains(&left_id) {
            return Err(DocError::UnknownNode(left_id.to_string()));
        }

        self.counter += 1;
        let timestamp = self.clock.tick();
        let op_id = OpId::new(self.counter, self.author.clone());
        let node = SeqNode::new(op_id.clone(), ch, None, timestamp);
        if !self.store.insert_after(node, &left_id) {
            return Err(DocError::DuplicateId(op_id.to_string()));
        }

        self.expand_marks_on_insert(&op_id);

        let op = Operation::Insert {
            op_id,
            ch,
            left_id,
            timestamp,
        };
        self.ledger.record(op.fingerprint());
        Ok(op)
    }

    /// Insert a character at a cursor position (0 = before first character)
    pub fn insert_at_cursor(&mut self, ch: char, cursor: usize) -> Result<Operation> {
        let left_id = self.store.left_id_for_cursor(cursor);
        self.insert(ch, Some(left_id))
    }

    /// Tombstone a character; returns the operation to broadcast
    pub fn delete(&mut self, target: &OpId) -> Result<Operation> {
        if target.is_root() || !self.store.contains(target) {
            return Err(DocError::UnknownNode(target.to_string()));
        }
        self.store.tombstone(target);

        let timestamp = self.clock.tick();
        let op = Operation::Delete {
            target_id: target.clone(),
            timestamp,
            author: self.author.clone(),
        };
        self.ledger.record(op.fingerprint());
        Ok(op)
    }

    /// Tombstone the visible character at a text index
    pub fn delete_at_index(&mut self, index: usize) -> Result<Operation> {
        let target = self
            .store
            .op_id_at_index(index)
            .ok_or_else(|| DocError::UnknownNode(format!("index {index}")))?;
        self.delete(&target)
    }

    /// Add a formatting mark between two anchors
    ///
    /// Both anchors must reference existing sequence nodes; anything else is
    /// caller misuse and surfaces as [`DocError::InvalidAnchor`].
    pub fn add_mark(
        &mut self,
        start: Anchor,
        end: Anchor,
        mark_type: MarkType,
        attributes: serde_json::Map<String, Value>,
        config: MarkConfig,
    ) -> Result<Operation> {
        for anchor in [&start, &end] {
            if !self.store.contains(&anchor.op_id) {
                return Err(DocError::InvalidAnchor(anchor.op_id.to_string()));
            }
        }

        self.mark_counter += 1;
        let timestamp = self.clock.tick();
        let mark_id = format!("mark-{}@{}", self.mark_counter, self.author);
        let mark = Mark {
            mark_id: mark_id.clone(),
            start: start.clone(),
            end: end.clone(),
            mark_type: mark_type.clone(),
            attributes: attributes.clone(),
            can_overlap: config.can_overlap,
            expand: config.expand,
            deleted: false,
            timestamp,
            author: self.author.clone(),
            counter: self.mark_counter,
        };

        let entry = AnchorOp::added(&mark);
        self.op_sets.record(&start, entry.clone(), &self.store);
        self.op_sets.record(&end, entry, &self.store);
        self.marks.insert(mark_id.clone(), mark);

        let op = Operation::AddMark {
            mark_id,
            start,
            end,
            mark_type,
            attributes,
            can_overlap: config.can_overlap,
            expand: config.expand,
            timestamp,
            author: self.author.clone(),
            counter: self.mark_counter,
        };
        self.ledger.record(op.fingerprint());
        Ok(op)
    }

    /// Tombstone a mark; returns the operation to broadcast
    pub fn remove_mark(&mut self, mark_id: &str) -> Result<Operation> {
        if !self.marks.contains_key(mark_id) {
            return Err(DocError::UnknownMark(mark_id.to_string()));
        }
        let timestamp = self.clock.tick();
        let (start, end, entry) = {
            let mark = self
                .marks
                .get_mut(mark_id)
                .ok_or_else(|| DocError::UnknownMark(mark_id.to_string()))?;
            mark.mark_deleted();
            (
                mark.start.clone(),
                mark.end.clone(),
                AnchorOp::removed(mark, timestamp, self.author.clone()),
            )
        };
        self.op_sets.record(&start, entry.clone(), &self.store);
        self.op_sets.record(&end, entry, &self.store);

        let op = Operation::RemoveMark {
            mark_id: mark_id.to_string(),
            timestamp,
            author: self.author.clone(),
        };
        self.ledger.record(op.fingerprint());
        Ok(op)
    }

    // ------------------------------------------------------------------
    // Remote operations
    // ------------------------------------------------------------------

    /// Apply a remotely delivered operation
    ///
    /// Deduplicates by fingerprint, dispatches to the matching handler, and
    /// removes the fingerprint again when the handler could not run (missing
    /// causal predecessor) so a later re-delivery can succeed. Never fails:
    /// a peer cannot treat another peer's message as fatal.
    pub fn apply_operation(&mut self, op: &Operation) -> ApplyOutcome {
        let fingerprint = op.fingerprint();
        if self.ledger.contains(&fingerprint) {
            return ApplyOutcome::Duplicate;
        }
        self.ledger.record(fingerprint.clone());

        let applied = match op {
            Operation::Insert {
                op_id,
                ch,
                left_id,
                timestamp,
            } => self.apply_remote_insert(op_id, *ch, left_id, *timestamp),
            Operation::Delete { target_id, .. } => self.apply_remote_delete(target_id),
            Operation::AddMark { .. } => self.apply_remote_add_mark(op),
            Operation::RemoveMark {
                mark_id,
                timestamp,
                author,
            } => self.apply_remote_remove_mark(mark_id, *timestamp, author),
        };

        if applied {
            self.clock.update(op.timestamp());
            ApplyOutcome::Applied
        } else {
            self.ledger.forget(&fingerprint);
            ApplyOutcome::Ignored
        }
    }

    fn apply_remote_insert(
        &mut self,
        op_id: &OpId,
        ch: char,
        left_id: &OpId,
        timestamp: u64,
    ) -> bool {
        if self.store.contains(op_id) {
            return true;
        }
        if !self.store.contains(left_id) {
            warn!("missing left node {left_id} for insert {op_id}; dropping until re-delivery");
            return false;
        }

        let node = SeqNode::new(op_id.clone(), ch, None, timestamp);
        // Remote inserts always go through the RGA comparator; only locally
        // originated edits may bypass it.
        let integrated = self.store.integrate(node, left_id);
        if integrated {
            self.expand_marks_on_insert(op_id);
        }
        integrated
    }

    fn apply_remote_delete(&mut self, target_id: &OpId) -> bool {
        if !self.store.contains(target_id) {
            warn!("missing target {target_id} for delete; dropping until re-delivery");
            return false;
        }
        self.store.tombstone(target_id)
    }

    fn apply_remote_add_mark(&mut self, op: &Operation) -> bool {
        let Operation::AddMark {
            mark_id,
            start,
            end,
            mark_type,
            attributes,
            can_overlap,
            expand,
            timestamp,
            author,
            counter,
        } = op
        else {
            return false;
        };

        if self.marks.contains_key(mark_id) {
            return true;
        }
        for anchor in [start, end] {
            if !self.store.contains(&anchor.op_id) {
                warn!(
                    "missing anchor {} for mark {mark_id}; dropping until re-delivery",
                    anchor.op_id
                );
                return false;
            }
        }

        let mark = Mark {
            mark_id: mark_id.clone(),
            start: start.clone(),
            end: end.clone(),
            mark_type: mark_type.clone(),
            attributes: attributes.clone(),
            can_overlap: *can_overlap,
            expand: *expand,
            deleted: false,
            timestamp: *timestamp,
            author: author.clone(),
            counter: *counter,
        };
        let entry = AnchorOp::added(&mark);
        self.op_sets.record(start, entry.clone(), &self.store);
        self.op_sets.record(end, entry, &self.store);
        self.marks.insert(mark_id.clone(), mark);
        true
    }

    fn apply_remote_remove_mark(&mut self, mark_id: &str, timestamp: u64, author: &str) -> bool {
        let Some(mark) = self.marks.get_mut(mark_id) else {
            warn!("unknown mark {mark_id} for removal; dropping until re-delivery");
            return false;
        };
        if mark.deleted {
            return true;
        }
        mark.mark_deleted();
        let (start, end, entry) = (
            mark.start.clone(),
            mark.end.clone(),
            AnchorOp::removed(mark, timestamp, author.to_string()),
        );
        self.op_sets.record(&start, entry.clone(), &self.store);
        self.op_sets.record(&end, entry, &self.store);
        true
    }

    // ------------------------------------------------------------------
    // Mark resolution
    // ------------------------------------------------------------------

    /// Marks whose effective span covers the given character
    ///
    /// The span is computed over the full sequence (tombstones included) from
    /// the anchors and their sides. Results are ordered by mark id.
    pub fn marks_for_character(&self, op_id: &OpId) -> Vec<&Mark> {
        let ordered = self.store.ordered_ids();
        let Some(index) = ordered.iter().position(|id| id == op_id) else {
            return Vec::new();
        };
        let index = index as i64;

        let mut active: Vec<&Mark> = self
            .marks
            .values()
            .filter(|mark| !mark.deleted)
            .filter(|mark| {
                let Some((start, end)) = Self::mark_span(&ordered, mark) else {
                    return false;
                };
                index >= start && index <= end
            })
            .collect();
        active.sort_by(|a, b| a.mark_id.cmp(&b.mark_id));
        active
    }

    /// Effective [start, end] span of a mark in full-sequence indices, taking
    /// anchor sides into account; None when an anchor is unresolvable
    fn mark_span(ordered: &[OpId], mark: &Mark) -> Option<(i64, i64)> {
        let start = ordered.iter().position(|id| *id == mark.start.op_id)? as i64;
        let end = ordered.iter().position(|id| *id == mark.end.op_id)? as i64;
        let actual_start = start + i64::from(mark.start.side == AnchorSide::After);
        let actual_end = end - i64::from(mark.end.side == AnchorSide::Before);
        Some((actual_start, actual_end))
    }

    /// Boundary-expansion rule, evaluated on every insertion
    ///
    /// A character strictly inside an expand-enabled mark's span inherits the
    /// formatting with no mutation. A character landing exactly at a growth
    /// boundary - immediately before a `before` start anchor, or immediately
    /// after an `after` end anchor - moves that anchor onto the new node.
    /// Marks without the expand flag never move.
    fn expand_marks_on_insert(&mut self, new_id: &OpId) {
        if self.marks.is_empty() {
            return;
        }
        let ordered = self.store.ordered_ids();
        let Some(new_index) = ordered.iter().position(|id| id == new_id) else {
            return;
        };
        let new_index = new_index as i64;

        let mut grown: Vec<(MarkId, Anchor, bool)> = Vec::new();
        for mark in self.marks.values() {
            if mark.deleted || !mark.expand {
                continue;
            }
            let Some(start) = ordered.iter().position(|id| *id == mark.start.op_id) else {
                continue;
            };
            let Some(end) = ordered.iter().position(|id| *id == mark.end.op_id) else {
                continue;
            };
            let (start, end) = (start as i64, end as i64);
            let actual_start = start + i64::from(mark.start.side == AnchorSide::After);
            let actual_end = end - i64::from(mark.end.side == AnchorSide::Before);

            if new_index >= actual_start && new_index <= actual_end {
                // Inside the span: the mark already covers the character
                continue;
            }
            if mark.start.side == AnchorSide::Before && new_index == start - 1 {
                grown.push((mark.mark_id.clone(), Anchor::before(new_id.clone()), true));
            } else if mark.end.side == AnchorSide::After && new_index == end + 1 {
                grown.push((mark.mark_id.clone(), Anchor::after(new_id.clone()), false));
            }
        }

        for (mark_id, anchor, is_start) in grown {
            let Some(mark) = self.marks.get_mut(&mark_id) else {
                continue;
            };
            if is_start {
                mark.start = anchor;
            } else {
                mark.end = anchor;
            }
            let entry = AnchorOp::added(mark);
            let (start, end) = (mark.start.clone(), mark.end.clone());
            self.op_sets.record(&start, entry.clone(), &self.store);
            self.op_sets.record(&end, entry, &self.store);
        }
    }

    // ------------------------------------------------------------------
    // Serialization & garbage collection
    // ------------------------------------------------------------------

    /// Export the full document state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            author: self.author.clone(),
            counter: self.counter,
            mark_counter: self.mark_counter,
            clock: self.clock.value(),
            root_id: self.store.root_id().clone(),
            nodes: self.store.snapshot_nodes(),
            marks: self.marks.values().cloned().collect(),
            op_sets: self.op_sets.snapshot_entries(),
            applied: self.ledger.snapshot_entries(),
        }
    }

    /// Rebuild a document from a snapshot, ready for further edits under the
    /// given author id
    ///
    /// A snapshot saved by a collaborator still carries this author's nodes
    /// and marks; the counters resume past them so the restored replica
    /// never re-mints an id that already exists.
    pub fn from_snapshot(snapshot: Snapshot, author: AuthorId) -> Result<Self> {
        let mut counter = if author == snapshot.author {
            snapshot.counter
        } else {
            0
        };
        for node in &snapshot.nodes {
            if node.author == author {
                counter = counter.max(node.counter);
            }
        }
        let mut mark_counter = if author == snapshot.author {
            snapshot.mark_counter
        } else {
            0
        };
        for mark in &snapshot.marks {
            if mark.author == author {
                mark_counter = mark_counter.max(mark.counter);
            }
        }

        let store = NodeStore::from_nodes(snapshot.nodes, snapshot.root_id)
            .ok_or_else(|| DocError::Snapshot("root node missing".to_string()))?;
        let marks = snapshot
            .marks
            .into_iter()
            .map(|m| (m.mark_id.clone(), m))
            .collect();
        let mut clock = LamportClock::new();
        clock.update(snapshot.clock);

        Ok(Self {
            author,
            counter,
            mark_counter,
            clock,
            store,
            marks,
            op_sets: AnchorOpSets::from_entries(snapshot.op_sets),
            ledger: Ledger::from_entries(snapshot.applied),
        })
    }

    /// Drop tombstoned marks and unreferenced tombstoned characters
    ///
    /// Returns the number of items removed. Conservative: characters still
    /// linked by neighbors or referenced by a live mark anchor are kept.
    pub fn collect_garbage(&mut self) -> usize {
        let mut removed = 0;

        let deleted_marks: Vec<MarkId> = self
            .marks
            .values()
            .filter(|m| m.deleted)
            .map(|m| m.mark_id.clone())
            .collect();
        for mark_id in &deleted_marks {
            self.marks.remove(mark_id);
            removed += 1;
        }

        let mut anchored: HashSet<OpId> = HashSet::new();
        for mark in self.marks.values() {
            anchored.insert(mark.start.op_id.clone());
            anchored.insert(mark.end.op_id.clone());
        }
        removed += self.store.collect_garbage(&anchored);
        self.op_sets.retain_existing(&self.store);

        removed
    }
}
