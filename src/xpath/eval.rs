//! Query evaluator
//!
//! Walks a compiled expression against the tree. Each step gathers
//! candidates in axis order over all context nodes with first-seen
//! de-duplication, then runs every predicate over the merged candidate list
//! with a 1-based position/size context. Axis traversal uses the document's
//! lazy iterators, so the active default filter set applies here too.

use super::functions::{FunctionRegistry, PredicateContext};
use super::nodeset::NodeSet;
use super::parser::{Axis, Expr, LocationPath, NodeTest, PredExpr, Step};
use super::value::{self, Value};
use super::cache;
use crate::dom::document::Document;
use crate::dom::node::{NodeId, NodeKind, SENTINEL};
use crate::dom::qname::QName;
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Prefix-to-namespace mapping supplied by the caller. The entry under the
/// empty string, when present, is the default namespace for unprefixed name
/// tests.
pub type Namespaces = HashMap<String, String>;

/// Namespace resolution for one evaluation.
pub(crate) struct NsContext<'a> {
    map: Option<&'a Namespaces>,
    fallback: String,
}

impl<'a> NsContext<'a> {
    pub(crate) fn new(doc: &Document, starts: &[NodeId], map: Option<&'a Namespaces>) -> Self {
        // Unprefixed name tests fall back to the namespace of the first
        // start node that is a tag when the mapping has no default entry.
        let fallback = starts
            .iter()
            .find_map(|&id| doc.name(id))
            .map(|name| name.namespace().to_string())
            .unwrap_or_default();
        NsContext { map, fallback }
    }

    pub(crate) fn resolve(&self, prefix: &str) -> Result<&str> {
        self.map
            .and_then(|m| m.get(prefix))
            .map(String::as_str)
            .ok_or_else(|| Error::Evaluation(format!("unbound namespace prefix '{}'", prefix)))
    }

    pub(crate) fn default_namespace(&self) -> &str {
        self.map
            .and_then(|m| m.get(""))
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }
}

/// Evaluate a query from one start node.
pub fn evaluate(
    doc: &Document,
    start: NodeId,
    text: &str,
    namespaces: Option<&Namespaces>,
) -> Result<NodeSet> {
    evaluate_nodes(doc, &[start], text, namespaces)
}

/// Evaluate a query from several start nodes at once.
pub fn evaluate_nodes(
    doc: &Document,
    starts: &[NodeId],
    text: &str,
    namespaces: Option<&Namespaces>,
) -> Result<NodeSet> {
    evaluate_nodes_with(doc, starts, text, namespaces, &FunctionRegistry::default())
}

/// Evaluate with a caller-supplied function registry.
pub fn evaluate_nodes_with(
    doc: &Document,
    starts: &[NodeId],
    text: &str,
    namespaces: Option<&Namespaces>,
    registry: &FunctionRegistry,
) -> Result<NodeSet> {
    let expr = cache::compile(text)?;
    let ns = NsContext::new(doc, starts, namespaces);
    eval_expr(doc, starts, &expr, &ns, registry)
}

fn eval_expr(
    doc: &Document,
    starts: &[NodeId],
    expr: &Expr,
    ns: &NsContext,
    registry: &FunctionRegistry,
) -> Result<NodeSet> {
    let mut result = NodeSet::new();
    let mut seen = HashSet::new();
    // Union branches evaluate independently; the merge keeps first-seen
    // order and drops duplicate identities.
    for path in &expr.paths {
        for id in eval_path(doc, starts, path, ns, registry)? {
            if id != SENTINEL {
                result.push_unique(id, &mut seen);
            }
        }
    }
    Ok(result)
}

fn eval_path(
    doc: &Document,
    starts: &[NodeId],
    path: &LocationPath,
    ns: &NsContext,
    registry: &FunctionRegistry,
) -> Result<Vec<NodeId>> {
    let mut context: Vec<NodeId> = if path.absolute {
        vec![SENTINEL]
    } else {
        starts.to_vec()
    };
    for step in &path.steps {
        context = eval_step(doc, &context, step, ns, registry)?;
        if context.is_empty() {
            break;
        }
    }
    Ok(context)
}

fn eval_step(
    doc: &Document,
    context: &[NodeId],
    step: &Step,
    ns: &NsContext,
    registry: &FunctionRegistry,
) -> Result<Vec<NodeId>> {
    let mut candidates = Vec::new();
    let mut seen = HashSet::new();
    for &ctx in context {
        for id in axis_nodes(doc, step.axis, ctx) {
            if test_matches(doc, id, &step.test, ns)? && seen.insert(id) {
                candidates.push(id);
            }
        }
    }
    for predicate in &step.predicates {
        candidates = apply_predicate(doc, candidates, predicate, ns, registry)?;
    }
    Ok(candidates)
}

fn axis_nodes(doc: &Document, axis: Axis, ctx: NodeId) -> Vec<NodeId> {
    match axis {
        Axis::Child => doc.children(ctx).collect(),
        Axis::Descendant => doc.descendants(ctx).collect(),
        Axis::DescendantOrSelf => {
            std::iter::once(ctx).chain(doc.descendants(ctx)).collect()
        }
        Axis::Parent => doc
            .parent(ctx)
            .filter(|&p| p != SENTINEL)
            .into_iter()
            .collect(),
        Axis::Ancestor => doc.ancestors(ctx).collect(),
        Axis::AncestorOrSelf => doc.ancestors_or_self(ctx).collect(),
        Axis::FollowingSibling => doc.following_siblings(ctx).collect(),
        Axis::PrecedingSibling => doc.preceding_siblings(ctx).collect(),
        Axis::Following => doc.following(ctx, false).collect(),
        Axis::Preceding => doc.preceding(ctx).collect(),
        Axis::SelfAxis => vec![ctx],
    }
}

fn test_matches(doc: &Document, id: NodeId, test: &NodeTest, ns: &NsContext) -> Result<bool> {
    Ok(match test {
        NodeTest::Node => true,
        NodeTest::Text => doc.kind(id) == Some(NodeKind::Text),
        NodeTest::Comment => doc.kind(id) == Some(NodeKind::Comment),
        NodeTest::ProcessingInstruction(target) => {
            doc.kind(id) == Some(NodeKind::ProcessingInstruction)
                && target
                    .as_deref()
                    .map(|t| doc.pi_target(id) == Some(t))
                    .unwrap_or(true)
        }
        NodeTest::Wildcard => doc.kind(id) == Some(NodeKind::Tag),
        NodeTest::PrefixWildcard(prefix) => {
            let namespace = ns.resolve(prefix)?;
            doc.name(id)
                .map(|n| n.namespace() == namespace)
                .unwrap_or(false)
        }
        NodeTest::Name { prefix, local } => {
            let namespace = match prefix {
                Some(p) => ns.resolve(p)?,
                None => ns.default_namespace(),
            };
            doc.name(id)
                .map(|n| n.local_name() == local && n.namespace() == namespace)
                .unwrap_or(false)
        }
    })
}

fn apply_predicate(
    doc: &Document,
    candidates: Vec<NodeId>,
    predicate: &PredExpr,
    ns: &NsContext,
    registry: &FunctionRegistry,
) -> Result<Vec<NodeId>> {
    let size = candidates.len();
    let mut kept = Vec::new();
    for (i, &node) in candidates.iter().enumerate() {
        let ctx = PredicateContext {
            doc,
            node,
            position: i + 1,
            size,
        };
        let value = eval_predicate(&ctx, predicate, ns, registry)?;
        // A bare number selects by position.
        let keep = match value {
            Value::Number(n) => (i + 1) as f64 == n,
            other => other.truthy(),
        };
        if keep {
            kept.push(node);
        }
    }
    Ok(kept)
}

fn eval_predicate(
    ctx: &PredicateContext,
    predicate: &PredExpr,
    ns: &NsContext,
    registry: &FunctionRegistry,
) -> Result<Value> {
    Ok(match predicate {
        PredExpr::Or(left, right) => {
            // Short-circuit: the right side is not evaluated when the left
            // already decides.
            if eval_predicate(ctx, left, ns, registry)?.truthy() {
                Value::Boolean(true)
            } else {
                Value::Boolean(eval_predicate(ctx, right, ns, registry)?.truthy())
            }
        }
        PredExpr::And(left, right) => {
            if !eval_predicate(ctx, left, ns, registry)?.truthy() {
                Value::Boolean(false)
            } else {
                Value::Boolean(eval_predicate(ctx, right, ns, registry)?.truthy())
            }
        }
        PredExpr::Compare(left, op, right) => {
            let left = eval_predicate(ctx, left, ns, registry)?;
            let right = eval_predicate(ctx, right, ns, registry)?;
            Value::Boolean(value::compare(*op, &left, &right))
        }
        PredExpr::Attribute { prefix, local } => {
            // Unprefixed attributes live in no namespace; the default
            // namespace never applies to them.
            let namespace = match prefix {
                Some(p) => ns.resolve(p)?,
                None => "",
            };
            let name = QName::new(namespace, local)?;
            match ctx.doc.attribute(ctx.node, &name) {
                Some(value) => Value::Str(value.to_string()),
                None => Value::Nothing,
            }
        }
        PredExpr::Literal(s) => Value::Str(s.clone()),
        PredExpr::Number(n) => Value::Number(*n),
        PredExpr::Call(name, args) => {
            let function = registry
                .get(name)
                .ok_or_else(|| Error::Evaluation(format!("unknown function '{}'", name)))?;
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_predicate(ctx, arg, ns, registry)?);
            }
            function(ctx, &values)?
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::filter::with_filters;
    use crate::dom::qname::QName;

    /// `<root><node n="1"/><node n="2"/><node/><node n="3"/></root>`
    fn numbered_tree() -> (Document, NodeId, Vec<NodeId>) {
        let mut doc = Document::new();
        let root = doc.new_tag(QName::local("root").unwrap());
        doc.append(SENTINEL, root).unwrap();
        let values = [Some("1"), Some("2"), None, Some("3")];
        let mut nodes = Vec::new();
        for value in values {
            let node = doc.new_tag(QName::local("node").unwrap());
            if let Some(v) = value {
                doc.set_attribute(node, QName::local("n").unwrap(), v).unwrap();
            }
            doc.append(root, node).unwrap();
            nodes.push(node);
        }
        (doc, root, nodes)
    }

    #[test]
    fn test_number_predicate_is_position() {
        let (doc, root, nodes) = numbered_tree();
        let result = evaluate(&doc, root, "//node[2]", None).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.first(), Some(nodes[1]));
    }

    #[test]
    fn test_attribute_presence_predicate() {
        let (doc, root, nodes) = numbered_tree();
        let result = evaluate(&doc, root, "//node[@n]", None).unwrap();
        let expected: Vec<NodeId> = vec![nodes[0], nodes[1], nodes[3]];
        assert_eq!(result.iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_position_function_over_merged_candidates() {
        let (doc, root, nodes) = numbered_tree();
        let result = evaluate(&doc, root, "//*[position()=1]", None).unwrap();
        // The merged child candidates of the descendant-or-self contexts
        // start with the first top-level child.
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![nodes[0]]);
    }

    #[test]
    fn test_absolute_path() {
        let (doc, _, nodes) = numbered_tree();
        // Absolute paths ignore the start node.
        let result = evaluate(&doc, nodes[2], "/root/node[@n='3']", None).unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![nodes[3]]);
    }

    #[test]
    fn test_union_dedups() {
        let (doc, root, nodes) = numbered_tree();
        let once = evaluate(&doc, root, "//node", None).unwrap();
        let twice = evaluate(&doc, root, "//node|//node", None).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.len(), nodes.len());
    }

    #[test]
    fn test_reevaluation_is_stable() {
        let (doc, root, _) = numbered_tree();
        let first = evaluate(&doc, root, "//node[@n]", None).unwrap();
        let second = evaluate(&doc, root, "//node[@n]", None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_last_function() {
        let (doc, root, nodes) = numbered_tree();
        let result = evaluate(&doc, root, "node[position()=last()]", None).unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![nodes[3]]);
    }

    #[test]
    fn test_explicit_axes() {
        let (doc, root, nodes) = numbered_tree();
        let up = evaluate(&doc, nodes[0], "ancestor::node()", None).unwrap();
        assert_eq!(up.iter().collect::<Vec<_>>(), vec![root]);

        let siblings = evaluate(&doc, nodes[1], "following-sibling::*", None).unwrap();
        assert_eq!(
            siblings.iter().collect::<Vec<_>>(),
            vec![nodes[2], nodes[3]]
        );
    }

    #[test]
    fn test_type_tests() {
        let mut doc = Document::new();
        let root = doc.new_tag(QName::local("root").unwrap());
        doc.append(SENTINEL, root).unwrap();
        let text = doc.new_text("payload").unwrap();
        let comment = doc.new_comment("note").unwrap();
        let pi = doc
            .new_processing_instruction("style", "href='x'")
            .unwrap();
        doc.append(root, text).unwrap();
        doc.append(root, comment).unwrap();
        doc.append(root, pi).unwrap();

        let texts = evaluate(&doc, root, "text()", None).unwrap();
        assert_eq!(texts.iter().collect::<Vec<_>>(), vec![text]);
        let comments = evaluate(&doc, root, "comment()", None).unwrap();
        assert_eq!(comments.iter().collect::<Vec<_>>(), vec![comment]);
        let pis = evaluate(&doc, root, "processing-instruction('style')", None).unwrap();
        assert_eq!(pis.iter().collect::<Vec<_>>(), vec![pi]);
        let none = evaluate(&doc, root, "processing-instruction('other')", None).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_namespace_resolution() {
        let mut doc = Document::new();
        let root = doc.new_tag(QName::local("root").unwrap());
        doc.append(SENTINEL, root).unwrap();
        let a = doc.new_tag(QName::new("urn:a", "item").unwrap());
        let b = doc.new_tag(QName::new("urn:b", "item").unwrap());
        doc.append(root, a).unwrap();
        doc.append(root, b).unwrap();

        let mut ns = Namespaces::new();
        ns.insert("x".to_string(), "urn:a".to_string());

        let result = evaluate(&doc, root, "x:item", Some(&ns)).unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![a]);

        let wild = evaluate(&doc, root, "x:*", Some(&ns)).unwrap();
        assert_eq!(wild.iter().collect::<Vec<_>>(), vec![a]);

        let err = evaluate(&doc, root, "y:item", Some(&ns)).unwrap_err();
        assert!(matches!(err, Error::Evaluation(_)));
    }

    #[test]
    fn test_default_namespace_entry() {
        let mut doc = Document::new();
        let root = doc.new_tag(QName::local("root").unwrap());
        doc.append(SENTINEL, root).unwrap();
        let item = doc.new_tag(QName::new("urn:d", "item").unwrap());
        doc.append(root, item).unwrap();

        // Without a mapping, the unprefixed test uses the start node's own
        // namespace (empty here) and misses.
        let miss = evaluate(&doc, root, "item", None).unwrap();
        assert!(miss.is_empty());

        let mut ns = Namespaces::new();
        ns.insert("".to_string(), "urn:d".to_string());
        let hit = evaluate(&doc, root, "item", Some(&ns)).unwrap();
        assert_eq!(hit.iter().collect::<Vec<_>>(), vec![item]);
    }

    #[test]
    fn test_missing_attribute_compares_false() {
        let (doc, root, nodes) = numbered_tree();
        let eq = evaluate(&doc, root, "//node[@missing='x']", None).unwrap();
        assert!(eq.is_empty());
        // '!=' against a missing attribute is also false, not an error.
        let neq = evaluate(&doc, root, "//node[@missing!='x']", None).unwrap();
        assert!(neq.is_empty());
        let _ = nodes;
    }

    #[test]
    fn test_ordering_comparison() {
        let (doc, root, nodes) = numbered_tree();
        let result = evaluate(&doc, root, "//node[@n >= 2]", None).unwrap();
        assert_eq!(
            result.iter().collect::<Vec<_>>(),
            vec![nodes[1], nodes[3]]
        );
    }

    #[test]
    fn test_boolean_connectives_short_circuit() {
        let (doc, root, nodes) = numbered_tree();
        // unknown-function() on the right of 'or' must not be reached.
        let result = evaluate(&doc, root, "//node[@n='1' or missing-fn()]", None);
        assert!(result.is_err());
        let ok = evaluate(&doc, root, "//node[true() or missing-fn()]", None).unwrap();
        assert_eq!(ok.len(), nodes.len());
    }

    #[test]
    fn test_unknown_function_is_evaluation_error() {
        let (doc, root, _) = numbered_tree();
        let err = evaluate(&doc, root, "//node[nope()]", None).unwrap_err();
        assert!(matches!(err, Error::Evaluation(_)));
    }

    #[test]
    fn test_custom_function() {
        fn second(ctx: &PredicateContext, _: &[Value]) -> Result<Value> {
            Ok(Value::Boolean(ctx.position == 2))
        }
        let (doc, root, nodes) = numbered_tree();
        let mut registry = FunctionRegistry::default();
        registry.register("second", second);
        let result =
            evaluate_nodes_with(&doc, &[root], "//node[second()]", None, &registry).unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![nodes[1]]);
    }

    #[test]
    fn test_evaluation_respects_filters() {
        let (doc, root, nodes) = numbered_tree();

        fn hide_unnumbered(doc: &Document, id: NodeId) -> bool {
            doc.kind(id) != Some(NodeKind::Tag)
                || doc
                    .attribute(id, &QName::local("n").unwrap())
                    .is_some()
                || doc.name(id).map(|n| n.local_name() == "root").unwrap_or(false)
        }

        with_filters(&[hide_unnumbered], false, || {
            let result = evaluate(&doc, root, "//node[2]", None).unwrap();
            // With the unnumbered node hidden, the second visible node is
            // still n="2"; the third becomes n="3".
            assert_eq!(result.iter().collect::<Vec<_>>(), vec![nodes[1]]);
            let third = evaluate(&doc, root, "//node[3]", None).unwrap();
            assert_eq!(third.iter().collect::<Vec<_>>(), vec![nodes[3]]);
        });
    }

    #[test]
    fn test_multiple_start_nodes() {
        let (doc, _, nodes) = numbered_tree();
        let result =
            evaluate_nodes(&doc, &[nodes[0], nodes[1]], "following-sibling::node()", None)
                .unwrap();
        // Candidates merge across start nodes with first-seen de-dup.
        assert_eq!(
            result.iter().collect::<Vec<_>>(),
            vec![nodes[1], nodes[2], nodes[3]]
        );
    }

    #[test]
    fn test_sort_document_order_after_reorder() {
        let (mut doc, root, nodes) = numbered_tree();
        doc.detach(nodes[3]).unwrap();
        doc.attach(root, 0, nodes[3]).unwrap();
        let mut result = evaluate(&doc, root, "//node", None).unwrap();
        result.sort_document_order(&doc);
        assert_eq!(
            result.iter().collect::<Vec<_>>(),
            vec![nodes[3], nodes[0], nodes[1], nodes[2]]
        );
    }
}
