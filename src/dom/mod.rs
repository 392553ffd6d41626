//! Document object model: arena tree, qualified names, filters, and the
//! event-driven builder.

pub mod builder;
pub mod document;
pub mod filter;
pub mod node;
pub mod qname;

pub use builder::{emit_events, StructuralEvent, TreeBuilder};
pub use document::Document;
pub use filter::{push_filters, with_filters, FilterScope, NodeFilter};
pub use node::{Attribute, NodeData, NodeId, NodeKind, SENTINEL};
pub use qname::QName;
