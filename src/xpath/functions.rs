//! Predicate function registry
//!
//! Functions are plain fn pointers resolved by name at evaluation time. The
//! default registry carries the built-ins; callers may register their own
//! and pass the registry through `evaluate_nodes_with`.

use super::value::Value;
use crate::dom::document::Document;
use crate::dom::node::NodeId;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Evaluation context for one candidate node inside a predicate.
pub struct PredicateContext<'d> {
    pub doc: &'d Document,
    pub node: NodeId,
    /// 1-based position among the step's candidates.
    pub position: usize,
    /// Total candidate count for the step.
    pub size: usize,
}

/// A predicate function.
pub type Function = fn(&PredicateContext, &[Value]) -> Result<Value>;

/// Name-to-function table consulted by the evaluator.
pub struct FunctionRegistry {
    functions: HashMap<String, Function>,
}

impl Default for FunctionRegistry {
    /// Registry preloaded with the built-ins.
    fn default() -> Self {
        let mut registry = FunctionRegistry::empty();
        registry.register("position", fn_position);
        registry.register("last", fn_last);
        registry.register("not", fn_not);
        registry.register("true", fn_true);
        registry.register("false", fn_false);
        registry.register("name", fn_name);
        registry
    }
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        FunctionRegistry {
            functions: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, function: Function) {
        self.functions.insert(name.to_string(), function);
    }

    pub fn get(&self, name: &str) -> Option<Function> {
        self.functions.get(name).copied()
    }
}

fn expect_arity(name: &str, args: &[Value], arity: usize) -> Result<()> {
    if args.len() == arity {
        Ok(())
    } else {
        Err(Error::Evaluation(format!(
            "{}() takes {} argument(s), got {}",
            name,
            arity,
            args.len()
        )))
    }
}

fn fn_position(ctx: &PredicateContext, args: &[Value]) -> Result<Value> {
    expect_arity("position", args, 0)?;
    Ok(Value::Number(ctx.position as f64))
}

fn fn_last(ctx: &PredicateContext, args: &[Value]) -> Result<Value> {
    expect_arity("last", args, 0)?;
    Ok(Value::Number(ctx.size as f64))
}

fn fn_not(_ctx: &PredicateContext, args: &[Value]) -> Result<Value> {
    expect_arity("not", args, 1)?;
    Ok(Value::Boolean(!args[0].truthy()))
}

fn fn_true(_ctx: &PredicateContext, args: &[Value]) -> Result<Value> {
    expect_arity("true", args, 0)?;
    Ok(Value::Boolean(true))
}

fn fn_false(_ctx: &PredicateContext, args: &[Value]) -> Result<Value> {
    expect_arity("false", args, 0)?;
    Ok(Value::Boolean(false))
}

/// Canonical name of the context node; empty for non-tag nodes.
fn fn_name(ctx: &PredicateContext, args: &[Value]) -> Result<Value> {
    expect_arity("name", args, 0)?;
    let name = ctx
        .doc
        .name(ctx.node)
        .map(|n| n.to_string())
        .unwrap_or_default();
    Ok(Value::Str(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::SENTINEL;
    use crate::dom::qname::QName;

    fn ctx(doc: &Document, node: NodeId) -> PredicateContext<'_> {
        PredicateContext {
            doc,
            node,
            position: 2,
            size: 5,
        }
    }

    #[test]
    fn test_position_and_last() {
        let doc = Document::new();
        let c = ctx(&doc, SENTINEL);
        assert_eq!(fn_position(&c, &[]).unwrap(), Value::Number(2.0));
        assert_eq!(fn_last(&c, &[]).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_not() {
        let doc = Document::new();
        let c = ctx(&doc, SENTINEL);
        assert_eq!(
            fn_not(&c, &[Value::Boolean(false)]).unwrap(),
            Value::Boolean(true)
        );
        assert!(fn_not(&c, &[]).is_err());
    }

    #[test]
    fn test_name_of_tag() {
        let mut doc = Document::new();
        let tag = doc.new_tag(QName::new("urn:x", "item").unwrap());
        let c = ctx(&doc, tag);
        assert_eq!(
            fn_name(&c, &[]).unwrap(),
            Value::Str("{urn:x}item".to_string())
        );
    }

    #[test]
    fn test_custom_registration() {
        fn always_seven(_: &PredicateContext, _: &[Value]) -> Result<Value> {
            Ok(Value::Number(7.0))
        }
        let mut registry = FunctionRegistry::default();
        registry.register("seven", always_seven);
        assert!(registry.get("seven").is_some());
        assert!(registry.get("position").is_some());
        assert!(registry.get("missing").is_none());
    }
}
