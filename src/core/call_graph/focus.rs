use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

use crate::core::model::CodeElement;
use crate::error::{CanvasError, Result};
use super::CallGraph;

/// Prune a tree and its graph down to what matters for one entrypoint.
///
/// Kept: the entrypoint and its descendants, everything reachable from it through
/// resolved edges, its direct callers, and the ancestors of all of those. `entrypoint`
/// is a name or a dotted path such as `Store.load`.
pub fn focus(root: &CodeElement, graph: &CallGraph, entrypoint: &str) -> Result<(CodeElement, CallGraph)> {
    let entry = root
        .find_by_path(entrypoint)
        .ok_or_else(|| CanvasError::EntrypointNotFound(format!("{} in {}", entrypoint, root.name)))?;

    let mut keep: BTreeSet<String> = entry.walk().into_iter().map(|e| e.id.clone()).collect();

    let mut queue: VecDeque<String> = keep.iter().cloned().collect();
    while let Some(current) = queue.pop_front() {
        for callee in graph.callees(&current) {
            if keep.insert(callee.to_string()) {
                queue.push_back(callee.to_string());
            }
        }
    }

    for caller in graph.callers(&entry.id) {
        keep.insert(caller.to_string());
    }

    let pruned = prune(root, &keep).unwrap_or_else(|| CodeElement {
        children: Vec::new(),
        ..root.clone()
    });

    let focused = CallGraph {
        edges: graph
            .edges
            .iter()
            .filter(|e| keep.contains(&e.caller) && keep.contains(&e.callee))
            .cloned()
            .collect(),
        unresolved: graph.unresolved.iter().filter(|u| keep.contains(&u.caller)).cloned().collect(),
        api_calls: graph
            .api_calls
            .iter()
            .filter(|(id, _)| keep.contains(*id))
            .map(|(id, calls)| (id.clone(), calls.clone()))
            .collect(),
        warnings: graph.warnings.iter().filter(|w| keep.contains(&w.element_id)).cloned().collect(),
    };

    debug!("Focused on {}: kept {} of {} elements", entry.id, keep.len(), root.walk().len());
    Ok((pruned, focused))
}

/// Copy of `element` restricted to kept ids and their ancestors
fn prune(element: &CodeElement, keep: &BTreeSet<String>) -> Option<CodeElement> {
    let children: Vec<CodeElement> = element.children.iter().filter_map(|c| prune(c, keep)).collect();

    if children.is_empty() && !keep.contains(&element.id) {
        return None;
    }

    Some(CodeElement {
        children,
        ..element.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::fixtures::element;
    use crate::core::model::{CallReference, ElementKind};

    fn tree() -> CodeElement {
        let mut root = element("app", ElementKind::Module, "app", (1, 50));

        let mut route = element("app::route", ElementKind::Function, "route", (1, 3));
        route.calls = vec![CallReference::new("load", 2).with_target("Store")];
        root.children.push(route);

        let mut store = element("app::Store", ElementKind::Class, "Store", (5, 20));
        let mut load = element("app::Store::load", ElementKind::Method, "load", (6, 10));
        load.calls = vec![CallReference::new("parse", 8), CallReference::new("print", 9)];
        store.children.push(load);
        store.children.push(element("app::Store::unused", ElementKind::Method, "unused", (12, 14)));
        root.children.push(store);

        root.children.push(element("app::parse", ElementKind::Function, "parse", (22, 24)));
        root.children.push(element("app::other", ElementKind::Function, "other", (26, 28)));
        root
    }

    #[test]
    fn test_focus_keeps_reachable_callers_and_ancestors() {
        let root = tree();
        let graph = CallGraph::build(&root);

        let (pruned, focused) = focus(&root, &graph, "Store.load").unwrap();
        let ids: Vec<&str> = pruned.walk().iter().map(|e| e.id.as_str()).collect();

        assert_eq!(ids, vec!["app", "app::route", "app::Store", "app::Store::load", "app::parse"]);
        assert_eq!(focused.edges.len(), 2);
        assert_eq!(focused.unresolved.len(), 1);
    }

    #[test]
    fn test_unknown_entrypoint() {
        let root = tree();
        let graph = CallGraph::build(&root);

        let err = focus(&root, &graph, "missing").unwrap_err();
        assert!(matches!(err, CanvasError::EntrypointNotFound(_)));
    }
}
