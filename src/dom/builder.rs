//! Event-driven tree construction and the mirror read-only walk
//!
//! `TreeBuilder` consumes a stream of structural events (what a streaming
//! reader produces) and assembles a `Document`, coalescing consecutive text
//! runs and validating nesting. `emit_events` walks a subtree and produces
//! the same event stream back, so a rebuild from emitted events yields a
//! structurally equal tree.

use super::document::Document;
use super::node::{Attribute, NodeData, NodeId, SENTINEL};
use super::qname::QName;
use crate::error::{Error, Result};

/// One structural event of a document stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralEvent {
    Comment(String),
    ProcessingInstruction { target: String, data: String },
    TagStart {
        namespace: String,
        local: String,
        attributes: Vec<Attribute>,
    },
    TagEnd,
    Text(String),
}

/// Incremental document assembler.
pub struct TreeBuilder {
    doc: Document,
    open: Vec<NodeId>,
    pending_text: String,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder {
            doc: Document::new(),
            open: vec![SENTINEL],
            pending_text: String::new(),
        }
    }

    fn top(&self) -> NodeId {
        // The sentinel entry is never popped, so the stack is non-empty.
        *self.open.last().unwrap_or(&SENTINEL)
    }

    fn flush_text(&mut self) -> Result<()> {
        if self.pending_text.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.pending_text);
        let parent = self.top();
        let node = self.doc.new_text(&text)?;
        self.doc.append(parent, node)
    }

    /// Feed one event into the tree under construction.
    pub fn handle(&mut self, event: StructuralEvent) -> Result<()> {
        match event {
            StructuralEvent::Text(text) => {
                // Consecutive text runs coalesce into one node.
                self.pending_text.push_str(&text);
                Ok(())
            }
            StructuralEvent::Comment(text) => {
                self.flush_text()?;
                let parent = self.top();
                let node = self.doc.new_comment(&text)?;
                self.doc.append(parent, node)
            }
            StructuralEvent::ProcessingInstruction { target, data } => {
                self.flush_text()?;
                let parent = self.top();
                let node = self.doc.new_processing_instruction(&target, &data)?;
                self.doc.append(parent, node)
            }
            StructuralEvent::TagStart {
                namespace,
                local,
                attributes,
            } => {
                self.flush_text()?;
                let parent = self.top();
                let node = self.doc.new_tag(QName::new(&namespace, &local)?);
                for attr in attributes {
                    self.doc.set_attribute(node, attr.name, &attr.value)?;
                }
                self.doc.append(parent, node)?;
                self.open.push(node);
                Ok(())
            }
            StructuralEvent::TagEnd => {
                self.flush_text()?;
                if self.open.len() <= 1 {
                    return Err(Error::StructuralConflict(
                        "tag-end event without a matching open tag".to_string(),
                    ));
                }
                self.open.pop();
                Ok(())
            }
        }
    }

    /// Finish building; all opened tags must have been closed.
    pub fn finish(mut self) -> Result<Document> {
        self.flush_text()?;
        if self.open.len() > 1 {
            return Err(Error::StructuralConflict(format!(
                "{} tag(s) left unclosed",
                self.open.len() - 1
            )));
        }
        Ok(self.doc)
    }
}

impl Document {
    /// Build a document from a complete event stream.
    pub fn from_events<I>(events: I) -> Result<Document>
    where
        I: IntoIterator<Item = StructuralEvent>,
    {
        let mut builder = TreeBuilder::new();
        for event in events {
            builder.handle(event)?;
        }
        builder.finish()
    }
}

/// Emit the event stream for a subtree, the mirror of `TreeBuilder`.
///
/// Starting at the sentinel emits the whole document without synthetic
/// start/end events for the sentinel itself.
pub fn emit_events(doc: &Document, node: NodeId) -> Vec<StructuralEvent> {
    let mut events = Vec::new();
    emit_into(doc, node, &mut events);
    events
}

fn emit_into(doc: &Document, node: NodeId, events: &mut Vec<StructuralEvent>) {
    let data = match doc.node(node) {
        Some(n) => n.data(),
        None => return,
    };
    match data {
        NodeData::Document => {
            for child in doc.raw_children(node) {
                emit_into(doc, child, events);
            }
        }
        NodeData::Tag { name, attributes } => {
            events.push(StructuralEvent::TagStart {
                namespace: name.namespace().to_string(),
                local: name.local_name().to_string(),
                attributes: attributes.clone(),
            });
            for child in doc.raw_children(node) {
                emit_into(doc, child, events);
            }
            events.push(StructuralEvent::TagEnd);
        }
        NodeData::Text(text) => events.push(StructuralEvent::Text(text.clone())),
        NodeData::Comment(text) => events.push(StructuralEvent::Comment(text.clone())),
        NodeData::ProcessingInstruction { target, data } => {
            events.push(StructuralEvent::ProcessingInstruction {
                target: target.clone(),
                data: data.clone(),
            })
        }
    }
}
