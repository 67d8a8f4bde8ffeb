//! NodeStore: the RGA sequence backbone
//!
//! An arena of sequence nodes keyed by operation id, linked into a
//! doubly-linked list anchored at the synthetic root. The store guarantees a
//! single order over all characters ever inserted - tombstones included -
//! that is identical on every replica which has applied the same operations,
//! regardless of arrival order.
//!
//! Two insertion paths exist on purpose:
//!
//! - [`NodeStore::insert_after`] splices directly after the given left
//!   neighbor. Reserved for locally originated edits: a local edit is the
//!   author's own serialized intent and cannot be contended at creation time,
//!   because no other author can reference an id that does not yet exist.
//! - [`NodeStore::integrate`] places a remote node with the RGA comparator:
//!   scan right from the left neighbor while an existing node outranks the
//!   new one, then splice. The comparator (later timestamp first, ties by
//!   ascending author id, then descending counter) is the sole convergence
//!   guarantee and is applied identically on every replica. Later-first
//!   ordering is what makes the two paths agree: a remote replica places the
//!   node exactly where the origin's direct splice put it, ahead of older
//!   siblings sharing the same left neighbor.

use super::id::OpId;
use super::node::SeqNode;
use std::collections::{HashMap, HashSet};

/// Arena of sequence nodes with id-based neighbor links
#[derive(Debug, Clone)]
pub struct NodeStore {
    nodes: HashMap<OpId, SeqNode>,
    root: OpId,
}

impl NodeStore {
    /// Create a store holding only the synthetic root
    pub fn new() -> Self {
        let root = SeqNode::root();
        let root_id = root.id.clone();
        let mut nodes = HashMap::new();
        nodes.insert(root_id.clone(), root);
        Self {
            nodes,
            root: root_id,
        }
    }

    /// Rebuild a store from snapshot nodes
    ///
    /// Returns None if the root node is missing from the snapshot.
    pub fn from_nodes(nodes: Vec<SeqNode>, root_id: OpId) -> Option<Self> {
        let nodes: HashMap<OpId, SeqNode> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        if !nodes.contains_key(&root_id) {
            return None;
        }
        Some(Self {
            nodes,
            root: root_id,
        })
    }

    /// Id of the synthetic root
    pub fn root_id(&self) -> &OpId {
        &self.root
    }

    /// Look up a node by id
    pub fn get(&self, id: &OpId) -> Option<&SeqNode> {
        self.nodes.get(id)
    }

    /// Whether a node with this id exists (tombstones included)
    pub fn contains(&self, id: &OpId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes excluding the root (tombstones included)
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Splice a node directly after its left neighbor (local fast path)
    ///
    /// Returns false without mutating if the left neighbor is unknown or the
    /// id already exists.
    pub fn insert_after(&mut self, node: SeqNode, left_id: &OpId) -> bool {
        if !self.nodes.contains_key(left_id) || self.nodes.contains_key(&node.id) {
            return false;
        }
        self.splice(node, left_id);
        true
    }

    /// Place a remote node using the RGA comparator
    ///
    /// Returns false without mutating if the left neighbor is missing (the
    /// causal predecessor has not arrived yet). A node whose id already
    /// exists is a no-op reported as applied.
    pub fn integrate(&mut self, node: SeqNode, left_id: &OpId) -> bool {
        if !self.nodes.contains_key(left_id) {
            return false;
        }
        if self.nodes.contains_key(&node.id) {
            return true;
        }

        // Scan right from the left neighbor until we hit a node that must
        // follow the new one, then splice immediately before it.
        let mut anchor = left_id.clone();
        while let Some(right_id) = self.nodes[&anchor].right.clone() {
            let right = &self.nodes[&right_id];
            if Self::orders_before(&node, right) {
                break;
            }
            anchor = right_id;
        }

        self.splice(node, &anchor);
        true
    }

    /// RGA ordering rule for two nodes contending for the same left neighbor
    ///
    /// `new` precedes `existing` if it carries the later timestamp: a
    /// causally later insert at the same spot lands closer to its anchor,
    /// the way typing at a cursor does. Ties break by lexicographically
    /// smaller author id, then by larger counter.
    fn orders_before(new: &SeqNode, existing: &SeqNode) -> bool {
        if new.timestamp != existing.timestamp {
            return new.timestamp > existing.timestamp;
        }
        if new.author != existing.author {
            return new.author < existing.author;
        }
        new.counter > existing.counter
    }

    fn splice(&mut self, mut node: SeqNode, left_id: &OpId) {
        let old_right = self.nodes[left_id].right.clone();

        node.left = Some(left_id.clone());
        node.right = old_right.clone();
        let new_id = node.id.clone();

        if let Some(right_id) = &old_right {
            if let Some(right) = self.nodes.get_mut(right_id) {
                right.left = Some(new_id.clone());
            }
        }
        if let Some(left) = self.nodes.get_mut(left_id) {
            left.right = Some(new_id);
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// Tombstone a node; idempotent
    ///
    /// Returns false if the node is unknown.
    pub fn tombstone(&mut self, id: &OpId) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) if !node.id.is_root() => {
                node.mark_deleted();
                true
            }
            _ => false,
        }
    }

    /// Ids of all nodes in document order, excluding the root, tombstones
    /// included
    pub fn ordered_ids(&self) -> Vec<OpId> {
        let mut order = Vec::with_capacity(self.nodes.len() - 1);
        let mut current = self.nodes[&self.root].right.clone();
        // Step cap guards against a corrupted snapshot introducing a cycle
        let mut steps = self.nodes.len();
        while let Some(id) = current {
            if steps == 0 {
                break;
            }
            steps -= 1;
            current = self.nodes.get(&id).and_then(|n| n.right.clone());
            order.push(id);
        }
        order
    }

    /// Nodes in document order, excluding the root, tombstones included
    pub fn ordered_nodes(&self) -> Vec<&SeqNode> {
        self.ordered_ids()
            .into_iter()
            .filter_map(|id| self.nodes.get(&id))
            .collect()
    }

    /// Visible text: non-deleted, character-bearing nodes in document order
    pub fn text(&self) -> String {
        self.ordered_nodes()
            .into_iter()
            .filter(|n| n.is_visible())
            .filter_map(|n| n.ch)
            .collect()
    }

    /// (id, index) pairs for every visible character, for cursor mapping
    pub fn visible_positions(&self) -> Vec<(OpId, usize)> {
        self.ordered_nodes()
            .into_iter()
            .filter(|n| n.is_visible())
            .enumerate()
            .map(|(index, n)| (n.id.clone(), index))
            .collect()
    }

    /// Id of the visible character at a text index
    pub fn op_id_at_index(&self, index: usize) -> Option<OpId> {
        self.visible_positions()
            .into_iter()
            .nth(index)
            .map(|(id, _)| id)
    }

    /// Visible text index of a node, None if unknown or deleted
    pub fn index_of(&self, id: &OpId) -> Option<usize> {
        self.visible_positions()
            .into_iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, index)| index)
    }

    /// Left neighbor id for an insertion at a cursor position
    ///
    /// Cursor positions sit between characters: 0 inserts at the beginning
    /// (after the root), N inserts after the (N-1)th visible character. A
    /// cursor past the end resolves to the last visible character.
    pub fn left_id_for_cursor(&self, cursor: usize) -> OpId {
        if cursor == 0 {
            return self.root.clone();
        }
        let positions = self.visible_positions();
        positions
            .get(cursor - 1)
            .or_else(|| positions.last())
            .map(|(id, _)| id.clone())
            .unwrap_or_else(|| self.root.clone())
    }

    /// Remove tombstones that nothing references anymore
    ///
    /// A tombstone is removable only when no node's neighbor link and none of
    /// the `extra_referenced` ids (mark anchors) point at it. Nodes still
    /// linked into the chain keep their neighbors' references, so this pass
    /// is conservative by design.
    pub fn collect_garbage(&mut self, extra_referenced: &HashSet<OpId>) -> usize {
        let mut referenced: HashSet<OpId> = extra_referenced.clone();
        for node in self.nodes.values() {
            if let Some(left) = &node.left {
                referenced.insert(left.clone());
            }
            if let Some(right) = &node.right {
                referenced.insert(right.clone());
            }
        }

        let root = self.root.clone();
        let before = self.nodes.len();
        self.nodes
            .retain(|id, node| !node.deleted || referenced.contains(id) || *id == root);
        before - self.nodes.len()
    }

    /// All nodes including the root, for snapshot export
    pub fn snapshot_nodes(&self) -> Vec<SeqNode> {
        self.nodes.values().cloned().collect()
    }
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(counter: u64, author: &str, ch: char, ts: u64) -> SeqNode {
        SeqNode::new(OpId::new(counter, author), ch, None, ts)
    }

    #[test]
    fn test_sequential_local_inserts() {
        let mut store = NodeStore::new();
        let root = store.root_id().clone();

        assert!(store.insert_after(node(1, "alice", 'a', 1), &root));
        assert!(store.insert_after(node(2, "alice", 'b', 2), &OpId::new(1, "alice")));
        assert!(store.insert_after(node(3, "alice", 'c', 3), &OpId::new(2, "alice")));

        assert_eq!(store.text(), "abc");
        assert_eq!(store.node_count(), 3);
    }

    #[test]
    fn test_insert_in_middle() {
        let mut store = NodeStore::new();
        let root = store.root_id().clone();
        store.insert_after(node(1, "alice", 'a', 1), &root);
        store.insert_after(node(2, "alice", 'c', 2), &OpId::new(1, "alice"));

        store.insert_after(node(3, "alice", 'b', 3), &OpId::new(1, "alice"));
        assert_eq!(store.text(), "abc");
    }

    #[test]
    fn test_insert_after_unknown_left_fails() {
        let mut store = NodeStore::new();
        assert!(!store.insert_after(node(1, "alice", 'a', 1), &OpId::new(9, "ghost")));
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn test_integrate_missing_left_is_soft_failure() {
        let mut store = NodeStore::new();
        assert!(!store.integrate(node(2, "bob", 'b', 5), &OpId::new(1, "bob")));
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn test_integrate_duplicate_is_noop() {
        let mut store = NodeStore::new();
        let root = store.root_id().clone();
        store.insert_after(node(1, "alice", 'a', 1), &root);

        assert!(store.integrate(node(1, "alice", 'a', 1), &root));
        assert_eq!(store.text(), "a");
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_equal_timestamp_tie_breaks_by_author() {
        // Both orders of arrival must yield "AB" (alice < bob)
        for flipped in [false, true] {
            let mut store = NodeStore::new();
            let root = store.root_id().clone();
            let a = node(1, "alice", 'A', 7);
            let b = node(1, "bob", 'B', 7);
            if flipped {
                assert!(store.integrate(b.clone(), &root));
                assert!(store.integrate(a.clone(), &root));
            } else {
                assert!(store.integrate(a, &root));
                assert!(store.integrate(b, &root));
            }
            assert_eq!(store.text(), "AB");
        }
    }

    #[test]
    fn test_later_timestamp_orders_first() {
        // The later insert at the same spot lands closer to the anchor, in
        // either arrival order
        let mut store = NodeStore::new();
        let root = store.root_id().clone();
        store.integrate(node(1, "bob", 'Y', 9), &root);
        store.integrate(node(1, "alice", 'X', 3), &root);
        assert_eq!(store.text(), "YX");

        let mut store = NodeStore::new();
        let root = store.root_id().clone();
        store.integrate(node(1, "alice", 'X', 3), &root);
        store.integrate(node(1, "bob", 'Y', 9), &root);
        assert_eq!(store.text(), "YX");
    }

    #[test]
    fn test_same_author_ties_prefer_later_counter() {
        let mut store = NodeStore::new();
        let root = store.root_id().clone();
        store.integrate(node(1, "alice", 'a', 4), &root);
        store.integrate(node(2, "alice", 'b', 4), &root);
        assert_eq!(store.text(), "ba");
    }

    #[test]
    fn test_local_splice_and_remote_integrate_agree() {
        // Origin splices into the middle of "ab"; a replica integrating the
        // same operation with the comparator lands it in the same place
        let mut origin = NodeStore::new();
        let root = origin.root_id().clone();
        origin.insert_after(node(1, "alice", 'a', 1), &root);
        origin.insert_after(node(2, "alice", 'b', 2), &OpId::new(1, "alice"));
        origin.insert_after(node(3, "alice", 'x', 3), &OpId::new(1, "alice"));
        assert_eq!(origin.text(), "axb");

        let mut replica = NodeStore::new();
        let root = replica.root_id().clone();
        replica.integrate(node(1, "alice", 'a', 1), &root);
        replica.integrate(node(2, "alice", 'b', 2), &OpId::new(1, "alice"));
        replica.integrate(node(3, "alice", 'x', 3), &OpId::new(1, "alice"));
        assert_eq!(replica.text(), origin.text());
    }

    #[test]
    fn test_tombstone_keeps_node_count() {
        let mut store = NodeStore::new();
        let root = store.root_id().clone();
        store.insert_after(node(1, "alice", 'a', 1), &root);
        store.insert_after(node(2, "alice", 'b', 2), &OpId::new(1, "alice"));

        assert!(store.tombstone(&OpId::new(1, "alice")));
        assert_eq!(store.text(), "b");
        assert_eq!(store.node_count(), 2);
        assert!(store.get(&OpId::new(1, "alice")).unwrap().deleted);

        // Re-deleting is a no-op
        assert!(store.tombstone(&OpId::new(1, "alice")));
        assert_eq!(store.node_count(), 2);
    }

    #[test]
    fn test_tombstone_unknown_or_root() {
        let mut store = NodeStore::new();
        assert!(!store.tombstone(&OpId::new(1, "ghost")));
        let root = store.root_id().clone();
        assert!(!store.tombstone(&root));
    }

    #[test]
    fn test_ordered_sequence_excludes_root_includes_tombstones() {
        let mut store = NodeStore::new();
        let root = store.root_id().clone();
        store.insert_after(node(1, "alice", 'a', 1), &root);
        store.tombstone(&OpId::new(1, "alice"));

        let ordered = store.ordered_nodes();
        assert_eq!(ordered.len(), 1);
        assert!(ordered[0].deleted);
        assert!(!ordered.iter().any(|n| n.id.is_root()));
    }

    #[test]
    fn test_cursor_helpers() {
        let mut store = NodeStore::new();
        let root = store.root_id().clone();
        store.insert_after(node(1, "alice", 'a', 1), &root);
        store.insert_after(node(2, "alice", 'b', 2), &OpId::new(1, "alice"));

        assert_eq!(store.op_id_at_index(0), Some(OpId::new(1, "alice")));
        assert_eq!(store.op_id_at_index(5), None);
        assert_eq!(store.index_of(&OpId::new(2, "alice")), Some(1));

        assert_eq!(store.left_id_for_cursor(0), root);
        assert_eq!(store.left_id_for_cursor(1), OpId::new(1, "alice"));
        // Past-the-end cursor falls back to the last visible character
        assert_eq!(store.left_id_for_cursor(99), OpId::new(2, "alice"));

        store.tombstone(&OpId::new(1, "alice"));
        assert_eq!(store.index_of(&OpId::new(1, "alice")), None);
        assert_eq!(store.op_id_at_index(0), Some(OpId::new(2, "alice")));
    }

    #[test]
    fn test_collect_garbage_keeps_chained_tombstones() {
        let mut store = NodeStore::new();
        let root = store.root_id().clone();
        store.insert_after(node(1, "alice", 'a', 1), &root);
        store.insert_after(node(2, "alice", 'b', 2), &OpId::new(1, "alice"));
        store.tombstone(&OpId::new(1, "alice"));

        // The tombstone is still referenced by its neighbors' links
        let removed = store.collect_garbage(&HashSet::new());
        assert_eq!(removed, 0);
        assert_eq!(store.node_count(), 2);
    }

    #[test]
    fn test_collect_garbage_removes_orphans() {
        let mut store = NodeStore::new();
        let root = store.root_id().clone();
        store.insert_after(node(1, "alice", 'a', 1), &root);

        // An orphaned tombstone with no links pointing at it
        let mut orphan = node(9, "bob", 'z', 9);
        orphan.mark_deleted();
        let nodes = {
            let mut all = store.snapshot_nodes();
            all.push(orphan);
            all
        };
        let mut store = NodeStore::from_nodes(nodes, root).unwrap();
        assert_eq!(store.node_count(), 2);

        let removed = store.collect_garbage(&HashSet::new());
        assert_eq!(removed, 1);
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.text(), "a");
    }

    #[test]
    fn test_from_nodes_requires_root() {
        let store = NodeStore::new();
        let mut nodes = store.snapshot_nodes();
        nodes.retain(|n| !n.id.is_root());
        assert!(NodeStore::from_nodes(nodes, OpId::root()).is_none());
    }
}
