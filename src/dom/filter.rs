//! Default filter context
//!
//! A thread-local stack of predicate sets that narrows which nodes
//! navigation treats as visible, without threading a parameter through every
//! call. The active set is the top of the stack; pushes are scoped and pop
//! on every exit path, including unwinding.

use super::document::Document;
use super::node::NodeId;
use std::cell::RefCell;

/// A visibility predicate over a node.
pub type NodeFilter = fn(&Document, NodeId) -> bool;

thread_local! {
    static STACK: RefCell<Vec<Vec<NodeFilter>>> = const { RefCell::new(Vec::new()) };
}

/// Scope guard for a pushed filter set; pops on drop.
#[must_use = "dropping the scope immediately pops the filters"]
pub struct FilterScope {
    _private: (),
}

impl Drop for FilterScope {
    fn drop(&mut self) {
        STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Push a filter set for the current thread.
///
/// With `extend`, the new entry is the current active set plus `filters`;
/// otherwise it replaces the active set for the scope's duration.
pub fn push_filters(filters: &[NodeFilter], extend: bool) -> FilterScope {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let mut entry = if extend {
            stack.last().cloned().unwrap_or_default()
        } else {
            Vec::new()
        };
        entry.extend_from_slice(filters);
        stack.push(entry);
    });
    FilterScope { _private: () }
}

/// Run `f` with `filters` active, popping them afterwards even on panic.
pub fn with_filters<R>(filters: &[NodeFilter], extend: bool, f: impl FnOnce() -> R) -> R {
    let _scope = push_filters(filters, extend);
    f()
}

/// Snapshot of the active filter set (empty when nothing is pushed).
pub(crate) fn active() -> Vec<NodeFilter> {
    STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::NodeKind;

    fn hide_comments(doc: &Document, id: NodeId) -> bool {
        doc.kind(id) != Some(NodeKind::Comment)
    }

    fn hide_text(doc: &Document, id: NodeId) -> bool {
        doc.kind(id) != Some(NodeKind::Text)
    }

    #[test]
    fn test_scope_pops_on_drop() {
        assert!(active().is_empty());
        {
            let _scope = push_filters(&[hide_comments], false);
            assert_eq!(active().len(), 1);
        }
        assert!(active().is_empty());
    }

    #[test]
    fn test_extend_appends_to_active_set() {
        let _outer = push_filters(&[hide_comments], false);
        {
            let _inner = push_filters(&[hide_text], true);
            assert_eq!(active().len(), 2);
        }
        assert_eq!(active().len(), 1);
    }

    #[test]
    fn test_replace_shadows_active_set() {
        let _outer = push_filters(&[hide_comments], false);
        {
            let _inner = push_filters(&[hide_text], false);
            assert_eq!(active().len(), 1);
        }
        assert_eq!(active().len(), 1);
    }

    #[test]
    fn test_pops_through_panic() {
        let caught = std::panic::catch_unwind(|| {
            with_filters(&[hide_comments], false, || {
                panic!("boom");
            })
        });
        assert!(caught.is_err());
        assert!(active().is_empty());
    }
}
