//! Mutable arena-based document
//!
//! Nodes live in a `Vec` arena and reference each other by `NodeId`, so
//! detach/reattach and cloning stay cheap and the tree is acyclic by
//! construction. Slot 0 is the document sentinel: an internal container that
//! lets navigation reach a synthetic root above the document root tag and
//! any leading/trailing comments or processing instructions.
//!
//! Navigation primitives are lazy iterators, one per query axis, and all of
//! them honor the active default filter set (see `filter`).

use super::filter::{self, NodeFilter};
use super::node::{Attribute, Node, NodeData, NodeId, NodeKind, SENTINEL};
use super::qname::{self, QName};
use crate::error::{Error, Result};

/// A mutable markup document.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only the sentinel.
    pub fn new() -> Self {
        Document {
            nodes: vec![Node::new(NodeData::Document)],
        }
    }

    // ------------------------------------------------------------------
    // Node creation
    // ------------------------------------------------------------------

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node::new(data));
        id
    }

    /// Create an unattached tag node.
    pub fn new_tag(&mut self, name: QName) -> NodeId {
        self.push_node(NodeData::Tag {
            name,
            attributes: Vec::new(),
        })
    }

    /// Create an unattached text node; the content must be valid character data.
    pub fn new_text(&mut self, text: &str) -> Result<NodeId> {
        qname::validate_char_data(text)?;
        Ok(self.push_node(NodeData::Text(text.to_string())))
    }

    /// Create an unattached comment node.
    pub fn new_comment(&mut self, text: &str) -> Result<NodeId> {
        qname::validate_comment(text)?;
        Ok(self.push_node(NodeData::Comment(text.to_string())))
    }

    /// Create an unattached processing-instruction node.
    pub fn new_processing_instruction(&mut self, target: &str, data: &str) -> Result<NodeId> {
        qname::validate_processing_instruction(target, data)?;
        Ok(self.push_node(NodeData::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        }))
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    /// The sentinel id. Valid as a navigation/query start point only.
    pub fn sentinel(&self) -> NodeId {
        SENTINEL
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    /// The document root: the single tag child of the sentinel, if any.
    pub fn root(&self) -> Option<NodeId> {
        let mut next = self.node(SENTINEL)?.first_child;
        while let Some(id) = next {
            let node = self.node(id)?;
            if node.is_tag() {
                return Some(id);
            }
            next = node.next_sibling;
        }
        None
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(Node::kind)
    }

    /// Tag name, for tag nodes.
    pub fn name(&self, id: NodeId) -> Option<&QName> {
        match self.node(id)?.data() {
            NodeData::Tag { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Character data, for text nodes.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.node(id)?.data() {
            NodeData::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Comment content, for comment nodes.
    pub fn comment_text(&self, id: NodeId) -> Option<&str> {
        match self.node(id)?.data() {
            NodeData::Comment(s) => Some(s),
            _ => None,
        }
    }

    /// Processing-instruction target, for PI nodes.
    pub fn pi_target(&self, id: NodeId) -> Option<&str> {
        match self.node(id)?.data() {
            NodeData::ProcessingInstruction { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Processing-instruction content, for PI nodes.
    pub fn pi_data(&self, id: NodeId) -> Option<&str> {
        match self.node(id)?.data() {
            NodeData::ProcessingInstruction { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Parent id; `None` for the sentinel and for detached nodes.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.next_sibling
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.prev_sibling
    }

    /// Depth of a node: 0 for the sentinel or for a detached subtree root.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Number of nodes ever created in this document's arena.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Attributes of a tag node (empty for any other variant).
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match self.node(id).map(Node::data) {
            Some(NodeData::Tag { attributes, .. }) => attributes,
            _ => &[],
        }
    }

    /// Look up an attribute value by qualified name.
    pub fn attribute(&self, id: NodeId, name: &QName) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| &a.name == name)
            .map(|a| a.value.as_str())
    }

    fn tag_attributes_mut(&mut self, id: NodeId) -> Result<&mut Vec<Attribute>> {
        match self.nodes.get_mut(id as usize).map(|n| &mut n.data) {
            Some(NodeData::Tag { attributes, .. }) => Ok(attributes),
            _ => Err(Error::StructuralConflict(format!(
                "node {} is not a tag and cannot carry attributes",
                id
            ))),
        }
    }

    /// Set (upserting) an attribute; the value must be valid character data.
    pub fn set_attribute(&mut self, id: NodeId, name: QName, value: &str) -> Result<()> {
        qname::validate_char_data(value)?;
        let attrs = self.tag_attributes_mut(id)?;
        if let Some(attr) = attrs.iter_mut().find(|a| a.name == name) {
            attr.value = value.to_string();
        } else {
            attrs.push(Attribute {
                name,
                value: value.to_string(),
            });
        }
        Ok(())
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, id: NodeId, name: &QName) -> Option<String> {
        let attrs = self.tag_attributes_mut(id).ok()?;
        let pos = attrs.iter().position(|a| &a.name == name)?;
        Some(attrs.remove(pos).value)
    }

    /// Re-key an attribute under a new qualified name, keeping its position.
    pub fn rename_attribute(&mut self, id: NodeId, old: &QName, new: QName) -> Result<()> {
        let attrs = self.tag_attributes_mut(id)?;
        if old != &new && attrs.iter().any(|a| a.name == new) {
            return Err(Error::StructuralConflict(format!(
                "attribute '{}' already exists on node {}",
                new, id
            )));
        }
        let attr = attrs.iter_mut().find(|a| &a.name == old).ok_or_else(|| {
            Error::StructuralConflict(format!("no attribute '{}' on node {}", old, id))
        })?;
        attr.name = new;
        Ok(())
    }

    /// Set an identifier attribute, enforcing that no other node in the
    /// subtree of the current top-level ancestor carries the same value.
    pub fn set_id_attribute(&mut self, id: NodeId, name: QName, value: &str) -> Result<()> {
        let top = self.top_level_ancestor(id);
        let duplicate = std::iter::once(top)
            .chain(RawDescendants::new(self, top))
            .any(|n| n != id && self.attribute(n, &name) == Some(value));
        if duplicate {
            return Err(Error::InvalidContent(format!(
                "identifier attribute '{}' value '{}' is already used in this tree",
                name, value
            )));
        }
        self.set_attribute(id, name, value)
    }

    /// Highest non-sentinel ancestor, or the node itself when detached.
    fn top_level_ancestor(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if parent == SENTINEL {
                break;
            }
            current = parent;
        }
        current
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    fn check_attachable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        if child == SENTINEL {
            return Err(Error::StructuralConflict(
                "the document sentinel cannot be attached".to_string(),
            ));
        }
        let parent_node = self.node(parent).ok_or_else(|| {
            Error::StructuralConflict(format!("unknown parent node {}", parent))
        })?;
        let child_node = self
            .node(child)
            .ok_or_else(|| Error::StructuralConflict(format!("unknown node {}", child)))?;
        if !parent_node.data().is_container() {
            return Err(Error::StructuralConflict(format!(
                "node {} ({:?}) cannot hold children",
                parent,
                parent_node.kind()
            )));
        }
        if child_node.parent.is_some() {
            return Err(Error::StructuralConflict(format!(
                "node {} is already attached; detach or clone it first",
                child
            )));
        }
        // An attach that would put a node inside its own subtree.
        let mut cursor = Some(parent);
        while let Some(n) = cursor {
            if n == child {
                return Err(Error::StructuralConflict(format!(
                    "node {} is an ancestor of {} and cannot become its child",
                    child, parent
                )));
            }
            cursor = self.parent(n);
        }
        if parent == SENTINEL && child_node.is_tag() && self.root().is_some() {
            return Err(Error::StructuralConflict(
                "the document already has a root tag".to_string(),
            ));
        }
        Ok(())
    }

    /// Insert `child` as the `index`-th raw child of `parent`.
    ///
    /// Rejects an already-attached child, a leaf parent, and a second tag
    /// node under the sentinel. `index` past the end appends.
    pub fn attach(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.check_attachable(parent, child)?;
        let before = self.raw_children(parent).nth(index);
        match before {
            Some(anchor) => self.link_before(parent, anchor, child),
            None => self.link_last(parent, child),
        }
        Ok(())
    }

    /// Append `child` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_attachable(parent, child)?;
        self.link_last(parent, child);
        Ok(())
    }

    fn link_last(&mut self, parent: NodeId, child: NodeId) {
        let last = self.nodes[parent as usize].last_child;
        if let Some(last_id) = last {
            self.nodes[child as usize].prev_sibling = Some(last_id);
            self.nodes[last_id as usize].next_sibling = Some(child);
        } else {
            self.nodes[parent as usize].first_child = Some(child);
        }
        self.nodes[parent as usize].last_child = Some(child);
        self.nodes[child as usize].parent = Some(parent);
    }

    fn link_before(&mut self, parent: NodeId, anchor: NodeId, child: NodeId) {
        let prev = self.nodes[anchor as usize].prev_sibling;
        self.nodes[child as usize].prev_sibling = prev;
        self.nodes[child as usize].next_sibling = Some(anchor);
        self.nodes[anchor as usize].prev_sibling = Some(child);
        match prev {
            Some(prev_id) => self.nodes[prev_id as usize].next_sibling = Some(child),
            None => self.nodes[parent as usize].first_child = Some(child),
        }
        self.nodes[child as usize].parent = Some(parent);
    }

    fn unlink(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let node = &self.nodes[id as usize];
            (node.parent, node.prev_sibling, node.next_sibling)
        };
        if let Some(parent_id) = parent {
            match prev {
                Some(prev_id) => self.nodes[prev_id as usize].next_sibling = next,
                None => self.nodes[parent_id as usize].first_child = next,
            }
            match next {
                Some(next_id) => self.nodes[next_id as usize].prev_sibling = prev,
                None => self.nodes[parent_id as usize].last_child = prev,
            }
        }
        let node = &mut self.nodes[id as usize];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    fn check_detachable(&self, id: NodeId) -> Result<NodeId> {
        if id == SENTINEL {
            return Err(Error::StructuralConflict(
                "the document sentinel cannot be detached".to_string(),
            ));
        }
        let node = self
            .node(id)
            .ok_or_else(|| Error::StructuralConflict(format!("unknown node {}", id)))?;
        let parent = node.parent.ok_or_else(|| {
            Error::StructuralConflict(format!("node {} is not attached", id))
        })?;
        if parent == SENTINEL && node.is_tag() {
            return Err(Error::StructuralConflict(
                "the document root cannot be detached or replaced".to_string(),
            ));
        }
        Ok(parent)
    }

    /// Remove a node from its parent's child collection. The caller keeps
    /// ownership of the detached subtree via its id.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        self.check_detachable(id)?;
        self.unlink(id);
        Ok(())
    }

    /// Swap `new` into `old`'s position and detach `old`, atomically from
    /// the caller's perspective: all checks run before any link changes.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        let parent = self.check_detachable(old)?;
        self.check_attachable(parent, new)?;
        let next = self.nodes[old as usize].next_sibling;
        self.unlink(old);
        match next {
            Some(anchor) => self.link_before(parent, anchor, new),
            None => self.link_last(parent, new),
        }
        Ok(())
    }

    /// Produce an unattached copy of a node. A shallow clone copies only the
    /// node's own data; a deep clone recursively clones descendants.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> Result<NodeId> {
        if id == SENTINEL {
            return Err(Error::StructuralConflict(
                "the document sentinel cannot be cloned".to_string(),
            ));
        }
        let data = self
            .node(id)
            .ok_or_else(|| Error::StructuralConflict(format!("unknown node {}", id)))?
            .data()
            .clone();
        let copy = self.push_node(data);
        if deep {
            let children: Vec<NodeId> = self.raw_children(id).collect();
            for child in children {
                let child_copy = self.clone_node(child, true)?;
                self.link_last(copy, child_copy);
            }
        }
        Ok(copy)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Children, honoring the active default filter set.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).and_then(|n| n.first_child),
            filters: filter::active(),
        }
    }

    /// Raw (unfiltered) children; used internally and by the serializer walk.
    pub(crate) fn raw_children(&self, id: NodeId) -> RawChildren<'_> {
        RawChildren {
            doc: self,
            next: self.node(id).and_then(|n| n.first_child),
        }
    }

    /// Descendants in document (pre-order) order, excluding the start node.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            inner: RawDescendants::new(self, id),
            filters: filter::active(),
        }
    }

    /// Ancestors from the parent upwards, excluding the sentinel.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
            filters: filter::active(),
        }
    }

    /// The node itself, then its ancestors.
    pub fn ancestors_or_self(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.node(id).map(|_| id),
            filters: filter::active(),
        }
    }

    /// Siblings after the node, in document order.
    pub fn following_siblings(&self, id: NodeId) -> Siblings<'_> {
        Siblings {
            doc: self,
            next: self.next_sibling(id),
            forward: true,
            filters: filter::active(),
        }
    }

    /// Siblings before the node, nearest first.
    pub fn preceding_siblings(&self, id: NodeId) -> Siblings<'_> {
        Siblings {
            doc: self,
            next: self.prev_sibling(id),
            forward: false,
            filters: filter::active(),
        }
    }

    /// All nodes strictly after `id` in document order. With
    /// `include_descendants`, the node's own subtree comes first.
    pub fn following(&self, id: NodeId, include_descendants: bool) -> Following<'_> {
        let mut stack = Vec::new();
        if include_descendants {
            let mut child = self.node(id).and_then(|n| n.last_child);
            while let Some(c) = child {
                stack.push(c);
                child = self.prev_sibling(c);
            }
        }
        Following {
            doc: self,
            stack,
            climb: self.node(id).map(|_| id),
            filters: filter::active(),
        }
    }

    /// All nodes strictly before `id`, in reverse document order, excluding
    /// ancestors.
    pub fn preceding(&self, id: NodeId) -> Preceding<'_> {
        Preceding {
            doc: self,
            stack: Vec::new(),
            climb: self.node(id).map(|_| id),
            filters: filter::active(),
        }
    }

    /// Position of a node among its filter-visible siblings.
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).position(|c| c == id)
    }

    /// Number of filter-visible children.
    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    pub(crate) fn visible_with(&self, filters: &[NodeFilter], id: NodeId) -> bool {
        filters.iter().all(|f| f(self, id))
    }

    // ------------------------------------------------------------------
    // Order and equality
    // ------------------------------------------------------------------

    /// Raw (unfiltered) position among siblings.
    pub(crate) fn raw_index(&self, id: NodeId) -> u32 {
        let mut index = 0;
        let mut cursor = self.prev_sibling(id);
        while let Some(prev) = cursor {
            index += 1;
            cursor = self.prev_sibling(prev);
        }
        index
    }

    /// Document-order key: the path of raw child indices from the root of
    /// the node's tree. A parent's key is a strict prefix of its children's.
    pub fn order_key(&self, id: NodeId) -> Vec<u32> {
        let mut key = Vec::new();
        let mut current = id;
        loop {
            match self.parent(current) {
                Some(parent) => {
                    key.push(self.raw_index(current));
                    current = parent;
                }
                None => break,
            }
        }
        key.reverse();
        key
    }

    /// Structural equality of two subtrees: kind, names, attributes (as an
    /// unordered mapping), content, and child sequence.
    pub fn subtree_equal(&self, a: NodeId, other: &Document, b: NodeId) -> bool {
        let (node_a, node_b) = match (self.node(a), other.node(b)) {
            (Some(x), Some(y)) => (x, y),
            _ => return false,
        };
        match (node_a.data(), node_b.data()) {
            (NodeData::Document, NodeData::Document) => {}
            (
                NodeData::Tag {
                    name: name_a,
                    attributes: attrs_a,
                },
                NodeData::Tag {
                    name: name_b,
                    attributes: attrs_b,
                },
            ) => {
                if name_a != name_b || attrs_a.len() != attrs_b.len() {
                    return false;
                }
                let matches = attrs_a.iter().all(|attr| {
                    attrs_b
                        .iter()
                        .any(|o| o.name == attr.name && o.value == attr.value)
                });
                if !matches {
                    return false;
                }
            }
            (NodeData::Text(x), NodeData::Text(y)) if x == y => {}
            (NodeData::Comment(x), NodeData::Comment(y)) if x == y => {}
            (
                NodeData::ProcessingInstruction {
                    target: ta,
                    data: da,
                },
                NodeData::ProcessingInstruction {
                    target: tb,
                    data: db,
                },
            ) if ta == tb && da == db => {}
            _ => return false,
        }
        let mut children_a = self.raw_children(a);
        let mut children_b = other.raw_children(b);
        loop {
            match (children_a.next(), children_b.next()) {
                (Some(ca), Some(cb)) => {
                    if !self.subtree_equal(ca, other, cb) {
                        return false;
                    }
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

// ----------------------------------------------------------------------
// Iterators
// ----------------------------------------------------------------------

/// Filter-aware iterator over child nodes.
pub struct Children<'d> {
    doc: &'d Document,
    next: Option<NodeId>,
    filters: Vec<NodeFilter>,
}

impl<'d> Iterator for Children<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.next {
            self.next = self.doc.next_sibling(current);
            if self.doc.visible_with(&self.filters, current) {
                return Some(current);
            }
        }
        None
    }
}

/// Unfiltered child iterator.
pub(crate) struct RawChildren<'d> {
    doc: &'d Document,
    next: Option<NodeId>,
}

impl<'d> Iterator for RawChildren<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.next_sibling(current);
        Some(current)
    }
}

/// Unfiltered pre-order descendant walk (start node excluded).
pub(crate) struct RawDescendants<'d> {
    doc: &'d Document,
    stack: Vec<NodeId>,
}

impl<'d> RawDescendants<'d> {
    pub(crate) fn new(doc: &'d Document, id: NodeId) -> Self {
        let mut stack = Vec::new();
        let mut child = doc.node(id).and_then(|n| n.last_child);
        while let Some(c) = child {
            stack.push(c);
            child = doc.prev_sibling(c);
        }
        RawDescendants { doc, stack }
    }
}

impl<'d> Iterator for RawDescendants<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        let mut child = self.doc.node(current).and_then(|n| n.last_child);
        while let Some(c) = child {
            self.stack.push(c);
            child = self.doc.prev_sibling(c);
        }
        Some(current)
    }
}

/// Filter-aware descendant iterator.
pub struct Descendants<'d> {
    inner: RawDescendants<'d>,
    filters: Vec<NodeFilter>,
}

impl<'d> Iterator for Descendants<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let doc = self.inner.doc;
        for id in self.inner.by_ref() {
            if doc.visible_with(&self.filters, id) {
                return Some(id);
            }
        }
        None
    }
}

/// Parent-chain iterator; never yields the sentinel.
pub struct Ancestors<'d> {
    doc: &'d Document,
    next: Option<NodeId>,
    filters: Vec<NodeFilter>,
}

impl<'d> Iterator for Ancestors<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.next {
            self.next = self.doc.parent(current);
            if current == SENTINEL {
                return None;
            }
            if self.doc.visible_with(&self.filters, current) {
                return Some(current);
            }
        }
        None
    }
}

/// Sibling iterator, forward or backward.
pub struct Siblings<'d> {
    doc: &'d Document,
    next: Option<NodeId>,
    forward: bool,
    filters: Vec<NodeFilter>,
}

impl<'d> Iterator for Siblings<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.next {
            self.next = if self.forward {
                self.doc.next_sibling(current)
            } else {
                self.doc.prev_sibling(current)
            };
            if self.doc.visible_with(&self.filters, current) {
                return Some(current);
            }
        }
        None
    }
}

/// Nodes strictly after the start node in document order: optionally its own
/// descendants, then each following sibling with its subtree, then climbing
/// to the first ancestor that has a following sibling, and so on. Ancestors
/// themselves are never yielded.
pub struct Following<'d> {
    doc: &'d Document,
    stack: Vec<NodeId>,
    climb: Option<NodeId>,
    filters: Vec<NodeFilter>,
}

impl<'d> Iterator for Following<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = self.stack.pop() {
                let mut child = self.doc.node(current).and_then(|n| n.last_child);
                while let Some(c) = child {
                    self.stack.push(c);
                    child = self.doc.prev_sibling(c);
                }
                if self.doc.visible_with(&self.filters, current) {
                    return Some(current);
                }
                continue;
            }
            let at = self.climb?;
            if let Some(sibling) = self.doc.next_sibling(at) {
                self.climb = Some(sibling);
                self.stack.push(sibling);
            } else {
                self.climb = self.doc.parent(at);
            }
        }
    }
}

/// Mirror of `Following`: earlier siblings' subtrees in reverse document
/// order, then the same for each ancestor, without yielding ancestors.
pub struct Preceding<'d> {
    doc: &'d Document,
    // (node, expanded): a node is yielded only after its children.
    stack: Vec<(NodeId, bool)>,
    climb: Option<NodeId>,
    filters: Vec<NodeFilter>,
}

impl<'d> Iterator for Preceding<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((current, expanded)) = self.stack.pop() {
                if expanded {
                    if self.doc.visible_with(&self.filters, current) {
                        return Some(current);
                    }
                    continue;
                }
                self.stack.push((current, true));
                let mut child = self.doc.node(current).and_then(|n| n.first_child);
                while let Some(c) = child {
                    self.stack.push((c, false));
                    child = self.doc.next_sibling(c);
                }
                continue;
            }
            let at = self.climb?;
            if let Some(sibling) = self.doc.prev_sibling(at) {
                self.climb = Some(sibling);
                self.stack.push((sibling, false));
            } else {
                self.climb = self.doc.parent(at);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::filter::with_filters;

    /// `<root><a><b/><c/></a><d/></root>` plus ids for each node.
    fn sample() -> (Document, NodeId, NodeId, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.new_tag(QName::local("root").unwrap());
        doc.append(SENTINEL, root).unwrap();
        let a = doc.new_tag(QName::local("a").unwrap());
        let b = doc.new_tag(QName::local("b").unwrap());
        let c = doc.new_tag(QName::local("c").unwrap());
        let d = doc.new_tag(QName::local("d").unwrap());
        doc.append(root, a).unwrap();
        doc.append(a, b).unwrap();
        doc.append(a, c).unwrap();
        doc.append(root, d).unwrap();
        (doc, root, a, b, c, d)
    }

    #[test]
    fn test_attach_rejects_attached_node() {
        let (mut doc, root, a, ..) = sample();
        let err = doc.append(root, a).unwrap_err();
        assert!(matches!(err, Error::StructuralConflict(_)));
    }

    #[test]
    fn test_attach_rejects_leaf_parent() {
        let mut doc = Document::new();
        let text = doc.new_text("leaf").unwrap();
        let tag = doc.new_tag(QName::local("t").unwrap());
        assert!(doc.append(text, tag).is_err());
    }

    #[test]
    fn test_single_root_invariant() {
        let (mut doc, ..) = sample();
        let second = doc.new_tag(QName::local("other").unwrap());
        assert!(doc.append(SENTINEL, second).is_err());
        // Comments and PIs may still flank the root.
        let comment = doc.new_comment("prologue").unwrap();
        doc.attach(SENTINEL, 0, comment).unwrap();
        assert_eq!(doc.raw_children(SENTINEL).count(), 2);
    }

    #[test]
    fn test_attach_at_index() {
        let (mut doc, _, a, b, c, _) = sample();
        let x = doc.new_tag(QName::local("x").unwrap());
        doc.attach(a, 1, x).unwrap();
        let kids: Vec<_> = doc.raw_children(a).collect();
        assert_eq!(kids, vec![b, x, c]);
        assert_eq!(doc.index_of(x), Some(1));
    }

    #[test]
    fn test_detach_and_reattach() {
        let (mut doc, root, a, b, ..) = sample();
        doc.detach(b).unwrap();
        assert!(doc.parent(b).is_none());
        assert_eq!(doc.child_count(a), 1);
        doc.append(root, b).unwrap();
        assert_eq!(doc.parent(b), Some(root));
    }

    #[test]
    fn test_detach_root_rejected() {
        let (mut doc, root, ..) = sample();
        assert!(doc.detach(root).is_err());
        assert!(doc.detach(SENTINEL).is_err());
    }

    #[test]
    fn test_replace_keeps_position() {
        let (mut doc, _, a, b, c, _) = sample();
        let x = doc.new_tag(QName::local("x").unwrap());
        doc.replace(b, x).unwrap();
        let kids: Vec<_> = doc.raw_children(a).collect();
        assert_eq!(kids, vec![x, c]);
        assert!(doc.parent(b).is_none());
    }

    #[test]
    fn test_replace_root_rejected() {
        let (mut doc, root, ..) = sample();
        let x = doc.new_tag(QName::local("x").unwrap());
        assert!(doc.replace(root, x).is_err());
    }

    #[test]
    fn test_cycle_rejected() {
        let (mut doc, _, a, b, ..) = sample();
        doc.detach(a).unwrap();
        // `a` is detached but still owns `b`; attaching `a` under `b`
        // would close a cycle.
        let err = doc.append(b, a).unwrap_err();
        assert!(matches!(err, Error::StructuralConflict(_)));
    }

    #[test]
    fn test_clone_shallow_and_deep() {
        let (mut doc, _, a, ..) = sample();
        doc.set_attribute(a, QName::local("k").unwrap(), "v").unwrap();
        let shallow = doc.clone_node(a, false).unwrap();
        assert!(doc.parent(shallow).is_none());
        assert_eq!(doc.attribute(shallow, &QName::local("k").unwrap()), Some("v"));
        assert_eq!(doc.raw_children(shallow).count(), 0);

        let deep = doc.clone_node(a, true).unwrap();
        assert_eq!(doc.raw_children(deep).count(), 2);
        assert!(doc.subtree_equal(a, &doc, deep));
    }

    #[test]
    fn test_descendants_preorder() {
        let (doc, root, a, b, c, d) = sample();
        let walk: Vec<_> = doc.descendants(root).collect();
        assert_eq!(walk, vec![a, b, c, d]);
    }

    #[test]
    fn test_descendants_early_termination() {
        let (doc, root, a, ..) = sample();
        assert_eq!(doc.descendants(root).next(), Some(a));
    }

    #[test]
    fn test_following_axis() {
        let (doc, _, _, b, c, d) = sample();
        let after_b: Vec<_> = doc.following(b, false).collect();
        assert_eq!(after_b, vec![c, d]);
        let with_subtree: Vec<_> = doc.following(b, true).collect();
        assert_eq!(with_subtree, vec![c, d]);
    }

    #[test]
    fn test_preceding_axis() {
        let (doc, _, a, b, c, d) = sample();
        // Reverse document order, ancestors excluded.
        let before_d: Vec<_> = doc.preceding(d).collect();
        assert_eq!(before_d, vec![c, b, a]);
        let before_c: Vec<_> = doc.preceding(c).collect();
        assert_eq!(before_c, vec![b]);
    }

    #[test]
    fn test_ancestors_exclude_sentinel() {
        let (doc, root, a, b, ..) = sample();
        let up: Vec<_> = doc.ancestors(b).collect();
        assert_eq!(up, vec![a, root]);
        let up_or_self: Vec<_> = doc.ancestors_or_self(b).collect();
        assert_eq!(up_or_self, vec![b, a, root]);
    }

    #[test]
    fn test_sibling_axes() {
        let (doc, _, a, _, _, d) = sample();
        assert_eq!(doc.following_siblings(a).collect::<Vec<_>>(), vec![d]);
        assert_eq!(doc.preceding_siblings(d).collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_filtered_children_and_index() {
        let mut doc = Document::new();
        let root = doc.new_tag(QName::local("root").unwrap());
        doc.append(SENTINEL, root).unwrap();
        let t1 = doc.new_text("one").unwrap();
        let tag = doc.new_tag(QName::local("mid").unwrap());
        let t2 = doc.new_text("two").unwrap();
        doc.append(root, t1).unwrap();
        doc.append(root, tag).unwrap();
        doc.append(root, t2).unwrap();

        fn tags_only(doc: &Document, id: NodeId) -> bool {
            doc.kind(id) == Some(NodeKind::Tag)
        }

        with_filters(&[tags_only], false, || {
            assert_eq!(doc.children(root).collect::<Vec<_>>(), vec![tag]);
            assert_eq!(doc.child_count(root), 1);
            assert_eq!(doc.index_of(tag), Some(0));
        });
        assert_eq!(doc.child_count(root), 3);
        assert_eq!(doc.index_of(tag), Some(1));
    }

    #[test]
    fn test_order_key_total_order() {
        let (doc, root, a, b, c, d) = sample();
        let ids = [root, a, b, c, d];
        let keys: Vec<_> = ids.iter().map(|&id| doc.order_key(id)).collect();
        // Parent precedes children, which precede following siblings.
        assert!(keys[0] < keys[1]);
        assert!(keys[1] < keys[2]);
        assert!(keys[2] < keys[3]);
        assert!(keys[3] < keys[4]);
    }

    #[test]
    fn test_rename_attribute_rekeys() {
        let (mut doc, _, a, ..) = sample();
        let old = QName::local("k").unwrap();
        let new = QName::new("urn:x", "k").unwrap();
        doc.set_attribute(a, old.clone(), "v").unwrap();
        doc.rename_attribute(a, &old, new.clone()).unwrap();
        assert_eq!(doc.attribute(a, &old), None);
        assert_eq!(doc.attribute(a, &new), Some("v"));
    }

    #[test]
    fn test_rename_attribute_collision_rejected() {
        let (mut doc, _, a, ..) = sample();
        let k1 = QName::local("k1").unwrap();
        let k2 = QName::local("k2").unwrap();
        doc.set_attribute(a, k1.clone(), "v1").unwrap();
        doc.set_attribute(a, k2.clone(), "v2").unwrap();
        assert!(doc.rename_attribute(a, &k1, k2).is_err());
    }

    #[test]
    fn test_id_attribute_uniqueness() {
        let (mut doc, _, _, b, c, _) = sample();
        let id_name = QName::local("id").unwrap();
        doc.set_id_attribute(b, id_name.clone(), "n1").unwrap();
        assert!(doc.set_id_attribute(c, id_name.clone(), "n1").is_err());
        assert!(doc.set_id_attribute(c, id_name, "n2").is_ok());
    }

    #[test]
    fn test_depth() {
        let (doc, root, a, b, ..) = sample();
        assert_eq!(doc.depth(SENTINEL), 0);
        assert_eq!(doc.depth(root), 1);
        assert_eq!(doc.depth(a), 2);
        assert_eq!(doc.depth(b), 3);
    }
}
