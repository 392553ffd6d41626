//! Fetch-or-create by query
//!
//! Resolves a statically unambiguous path against the tree, synthesizing the
//! missing suffix. The shape check runs before any mutation: a query that
//! could denote more than one node is rejected up front, so the operation is
//! idempotent by construction.

use super::cache;
use super::eval::{Namespaces, NsContext};
use super::parser::{Axis, CmpOp, Expr, LocationPath, NodeTest, PredExpr, Step};
use crate::dom::document::Document;
use crate::dom::node::{NodeId, SENTINEL};
use crate::dom::qname::QName;
use crate::error::{Error, Result};
use log::trace;

/// Resolve `text` from `start`, creating any missing tags along the way.
///
/// Only single-branch child-axis paths with concrete name tests qualify;
/// each predicate must be a conjunction of attribute-equals-literal tests.
/// Returns the unique node at the end of the path.
pub fn fetch_or_create_by_xpath(
    doc: &mut Document,
    start: NodeId,
    text: &str,
    namespaces: Option<&Namespaces>,
) -> Result<NodeId> {
    let expr = cache::compile(text)?;
    let path = check_unambiguous(&expr)?;
    let ns = NsContext::new(doc, &[start], namespaces);

    let mut current = if path.absolute { SENTINEL } else { start };
    for step in &path.steps {
        let name = step_name(step, &ns)?;
        let attributes = step_attributes(step, &ns)?;

        let matches: Vec<NodeId> = doc
            .children(current)
            .filter(|&child| {
                doc.name(child) == Some(&name)
                    && attributes
                        .iter()
                        .all(|(n, v)| doc.attribute(child, n) == Some(v.as_str()))
            })
            .collect();
        current = match matches.len() {
            0 => {
                let node = doc.new_tag(name.clone());
                for (attr_name, attr_value) in &attributes {
                    doc.set_attribute(node, attr_name.clone(), attr_value)?;
                }
                doc.append(current, node)?;
                trace!("synthesized <{}> under node {}", name, current);
                node
            }
            1 => matches[0],
            n => {
                return Err(Error::Ambiguous(format!(
                    "{} nodes already match step '{}'",
                    n, name
                )))
            }
        };
    }
    Ok(current)
}

/// Verify the compiled form denotes at most one node and return its single
/// path.
fn check_unambiguous(expr: &Expr) -> Result<&LocationPath> {
    if expr.paths.len() != 1 {
        return Err(Error::Evaluation(
            "a union expression cannot denote a unique node".to_string(),
        ));
    }
    let path = &expr.paths[0];
    for step in &path.steps {
        if step.axis != Axis::Child {
            return Err(Error::Evaluation(
                "only child-axis steps denote a unique node".to_string(),
            ));
        }
        if !matches!(step.test, NodeTest::Name { .. }) {
            return Err(Error::Evaluation(
                "every step needs a concrete name test".to_string(),
            ));
        }
        for predicate in &step.predicates {
            check_predicate(predicate)?;
        }
    }
    Ok(path)
}

/// Accept only conjunctions of attribute-equals-literal tests.
fn check_predicate(predicate: &PredExpr) -> Result<()> {
    match predicate {
        PredExpr::And(left, right) => {
            check_predicate(left)?;
            check_predicate(right)
        }
        PredExpr::Compare(left, CmpOp::Eq, right) => match (&**left, &**right) {
            (PredExpr::Attribute { .. }, PredExpr::Literal(_))
            | (PredExpr::Literal(_), PredExpr::Attribute { .. }) => Ok(()),
            _ => Err(Error::Evaluation(
                "predicates must compare an attribute to a literal".to_string(),
            )),
        },
        _ => Err(Error::Evaluation(
            "predicates must be conjunctions of attribute-equals-literal tests".to_string(),
        )),
    }
}

fn step_name(step: &Step, ns: &NsContext) -> Result<QName> {
    match &step.test {
        NodeTest::Name { prefix, local } => {
            let namespace = match prefix {
                Some(p) => ns.resolve(p)?,
                None => ns.default_namespace(),
            };
            QName::new(namespace, local)
        }
        // check_unambiguous already rejected everything else.
        _ => Err(Error::Evaluation(
            "every step needs a concrete name test".to_string(),
        )),
    }
}

fn step_attributes(step: &Step, ns: &NsContext) -> Result<Vec<(QName, String)>> {
    let mut out = Vec::new();
    for predicate in &step.predicates {
        collect_attributes(predicate, ns, &mut out)?;
    }
    Ok(out)
}

fn collect_attributes(
    predicate: &PredExpr,
    ns: &NsContext,
    out: &mut Vec<(QName, String)>,
) -> Result<()> {
    match predicate {
        PredExpr::And(left, right) => {
            collect_attributes(left, ns, out)?;
            collect_attributes(right, ns, out)
        }
        PredExpr::Compare(left, CmpOp::Eq, right) => {
            let (attr, literal) = match (&**left, &**right) {
                (PredExpr::Attribute { prefix, local }, PredExpr::Literal(value))
                | (PredExpr::Literal(value), PredExpr::Attribute { prefix, local }) => {
                    ((prefix, local), value)
                }
                _ => return Ok(()),
            };
            let namespace = match attr.0 {
                Some(p) => ns.resolve(p)?,
                None => "",
            };
            out.push((QName::new(namespace, attr.1)?, literal.clone()));
            Ok(())
        }
        _ => Ok(()),
    }
}
