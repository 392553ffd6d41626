//! Query result collection
//!
//! An ordered, duplicate-free list of node ids. Order is whatever the
//! evaluation produced (first-seen); document order is applied only on
//! explicit request, since arena ids stop reflecting document position as
//! soon as the tree is mutated.

use crate::dom::document::Document;
use crate::dom::node::NodeId;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet {
    nodes: Vec<NodeId>,
}

impl NodeSet {
    pub fn new() -> Self {
        NodeSet::default()
    }

    pub(crate) fn from_vec(nodes: Vec<NodeId>) -> Self {
        NodeSet { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    pub fn last(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.nodes.get(index).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Keep only nodes the predicate accepts, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(NodeId) -> bool) {
        self.nodes.retain(|&id| keep(id));
    }

    /// Append an id unless already present.
    pub(crate) fn push_unique(&mut self, id: NodeId, seen: &mut HashSet<NodeId>) {
        if seen.insert(id) {
            self.nodes.push(id);
        }
    }

    /// Stable sort into document order.
    ///
    /// Keys are each node's path of raw child indices from its tree root,
    /// memoized across the sort so ancestor prefixes are computed once. A
    /// parent's key is a strict prefix of its descendants' keys, so the
    /// resulting order is total for any set of nodes in one tree.
    pub fn sort_document_order(&mut self, doc: &Document) {
        let mut keys: HashMap<NodeId, Vec<u32>> = HashMap::new();
        for &id in &self.nodes {
            let key = key_for(doc, id, &mut keys);
            keys.insert(id, key);
        }
        self.nodes
            .sort_by(|a, b| keys[a].cmp(&keys[b]).then(a.cmp(b)));
    }
}

fn key_for(doc: &Document, id: NodeId, memo: &mut HashMap<NodeId, Vec<u32>>) -> Vec<u32> {
    if let Some(key) = memo.get(&id) {
        return key.clone();
    }
    let key = match doc.parent(id) {
        Some(parent) => {
            let mut key = key_for(doc, parent, memo);
            key.push(doc.raw_index(id));
            key
        }
        None => Vec::new(),
    };
    memo.insert(id, key.clone());
    key
}

impl IntoIterator for NodeSet {
    type Item = NodeId;
    type IntoIter = std::vec::IntoIter<NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}
