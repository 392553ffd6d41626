//! Node representation
//!
//! Uses NodeId (u32) for compact, cache-friendly node references. Sibling
//! and child links live on the node; the payload is a tagged union so the
//! container/leaf capability split is carried by the variant itself.

use super::qname::QName;

/// Compact node identifier (index into the document arena).
pub type NodeId = u32;

/// The document sentinel always occupies arena slot 0.
pub const SENTINEL: NodeId = 0;

/// Concrete node variant kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Internal synthetic root above the document root tag. Never handed out
    /// as a query result and never serialized.
    Document,
    Tag,
    Text,
    Comment,
    ProcessingInstruction,
}

/// A namespace-qualified attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Tag {
        name: QName,
        attributes: Vec<Attribute>,
    },
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Document => NodeKind::Document,
            NodeData::Tag { .. } => NodeKind::Tag,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::ProcessingInstruction { .. } => NodeKind::ProcessingInstruction,
        }
    }

    /// Whether this variant can own children.
    pub fn is_container(&self) -> bool {
        matches!(self, NodeData::Document | NodeData::Tag { .. })
    }
}

/// A node in the arena: tree links plus the variant payload.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) prev_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Node {
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            data,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    #[inline]
    pub fn is_tag(&self) -> bool {
        matches!(self.data, NodeData::Tag { .. })
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }
}
