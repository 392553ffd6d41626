//! Embedded path-query engine: tokenizer, parser, compiled-expression
//! cache, evaluator, and unambiguous fetch-or-create.

pub mod cache;
pub mod construct;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod nodeset;
pub mod parser;
pub mod value;

pub use cache::compile;
pub use construct::fetch_or_create_by_xpath;
pub use eval::{evaluate, evaluate_nodes, evaluate_nodes_with, Namespaces};
pub use functions::{Function, FunctionRegistry, PredicateContext};
pub use nodeset::NodeSet;
pub use parser::{Axis, CmpOp, Expr, LocationPath, NodeTest, PredExpr, Step};
pub use value::Value;
