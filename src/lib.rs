//! xmlgrove - mutable arena-backed markup tree with an embedded
//! XPath-subset query engine.
//!
//! The `dom` module holds the tree itself: an arena `Document` addressed by
//! compact node ids, with validated node construction, structural mutation
//! (attach/detach/replace/clone), lazy per-axis navigation iterators, and an
//! event-driven builder for ingestion from streaming readers. A thread-local
//! default filter context narrows what navigation yields without threading a
//! parameter through every call.
//!
//! The `xpath` module compiles a practical subset of XPath 1.0 location
//! paths into immutable, LRU-cached expressions and evaluates them against
//! the tree, including a fetch-or-create mode for statically unambiguous
//! paths.

pub mod dom;
pub mod error;
pub mod xpath;

pub use dom::{
    emit_events, push_filters, with_filters, Attribute, Document, FilterScope, NodeData,
    NodeFilter, NodeId, NodeKind, QName, StructuralEvent, TreeBuilder, SENTINEL,
};
pub use error::{Error, Result, SyntaxErrorKind};
pub use xpath::{
    evaluate, evaluate_nodes, evaluate_nodes_with, fetch_or_create_by_xpath, FunctionRegistry,
    Namespaces, NodeSet, PredicateContext, Value,
};
