//! Compiles the code context handed to the flow analyzer
//!
//! Elements are emitted breadth-first from the entrypoint along resolved call edges, then the
//! entrypoint's direct callers. Without an entrypoint every class and callable is emitted in
//! source order. Each element contributes one chunk with its source slice, its outgoing calls,
//! and its classified API calls. Chunks stop once the character budget is spent.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use tracing::debug;

use crate::core::call_graph::CallGraph;
use crate::core::model::{CodeElement, ElementKind};

/// Text sent to the analyzer plus what went into it
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledContext {
    pub text: String,
    /// Element ids in emission order
    pub elements: Vec<String>,
    /// Whether the budget cut off remaining elements
    pub truncated: bool,
}

impl CompiledContext {
    /// Rough token count at four characters per token
    pub fn estimate_tokens(&self) -> usize {
        self.text.len().div_ceil(4)
    }
}

/// Source file the context is compiled from
pub struct ContextSource<'a> {
    pub path: &'a Path,
    pub language: &'a str,
    pub source: &'a str,
}

pub struct ContextCompiler {
    max_chars: usize,
}

impl ContextCompiler {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn compile(
        &self,
        file: &ContextSource<'_>,
        root: &CodeElement,
        graph: &CallGraph,
        entry_id: Option<&str>,
    ) -> CompiledContext {
        let lines: Vec<&str> = file.source.lines().collect();
        let file_name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.path.display().to_string());

        let mut text = format!("# File: {}\n", file.path.display());
        if let Some(entry) = entry_id.and_then(|id| root.find_by_id(id)) {
            text.push_str(&format!("# Entrypoint: {}\n", entry.qualified_name()));
        }
        if !root.imports.is_empty() {
            let modules: Vec<&str> = root.imports.iter().map(|i| i.module.as_str()).collect();
            text.push_str(&format!("# Imports: {}\n", modules.join(", ")));
        }
        text.push('\n');

        let mut elements: Vec<String> = Vec::new();
        let mut covered: Vec<(usize, usize)> = Vec::new();
        let mut truncated = false;

        let order = match entry_id {
            Some(entry_id) => emission_order(graph, entry_id),
            None => root
                .walk()
                .into_iter()
                .filter(|e| e.kind.is_callable() || e.kind == ElementKind::Class)
                .map(|e| e.id.clone())
                .collect(),
        };

        for id in order {
            let Some(element) = root.find_by_id(&id) else {
                continue;
            };
            if covered
                .iter()
                .any(|(start, end)| *start <= element.start_line && element.end_line <= *end)
            {
                continue;
            }

            let chunk = self.chunk(element, root, graph, &lines, &file_name, file.language);
            if text.len() + chunk.len() > self.max_chars {
                if elements.is_empty() {
                    text.push_str(&chunk);
                    truncate_at_char_boundary(&mut text, self.max_chars);
                    elements.push(element.id.clone());
                }
                truncated = true;
                break;
            }

            text.push_str(&chunk);
            covered.push((element.start_line, element.end_line));
            elements.push(element.id.clone());
        }

        debug!(
            "Compiled context for {}: {} elements, {} chars{}",
            entry_id.unwrap_or(&root.name),
            elements.len(),
            text.len(),
            if truncated { " (truncated)" } else { "" }
        );

        CompiledContext {
            text,
            elements,
            truncated,
        }
    }

    fn chunk(
        &self,
        element: &CodeElement,
        root: &CodeElement,
        graph: &CallGraph,
        lines: &[&str],
        file_name: &str,
        language: &str,
    ) -> String {
        let mut chunk = format!(
            "### {}: {} (from {}, lines {}-{})\n",
            element.kind.as_str().to_uppercase(),
            element.qualified_name(),
            file_name,
            element.start_line,
            element.end_line
        );

        let start = element.start_line.saturating_sub(1).min(lines.len());
        let end = element.end_line.clamp(start, lines.len());
        chunk.push_str(&format!("```{}\n", language));
        for line in &lines[start..end] {
            chunk.push_str(line);
            chunk.push('\n');
        }
        chunk.push_str("```\n");

        let mut seen = HashSet::new();
        let mut calls: Vec<String> = graph
            .callees(&element.id)
            .into_iter()
            .filter(|id| seen.insert(id.to_string()))
            .map(|id| root.find_by_id(id).map(|e| e.qualified_name()).unwrap_or_else(|| id.to_string()))
            .collect();
        for unresolved in graph.unresolved.iter().filter(|u| u.caller == element.id) {
            if seen.insert(unresolved.name.clone()) {
                calls.push(format!("{} (external)", unresolved.name));
            }
        }
        if !calls.is_empty() {
            chunk.push_str(&format!("Calls: {}\n", calls.join(", ")));
        }

        for api in graph.api_calls_for(&element.id) {
            let target = api
                .matched_endpoint
                .as_deref()
                .map(|endpoint| format!(" → {}", endpoint))
                .unwrap_or_default();
            chunk.push_str(&format!("API call: {} {} via {}{}\n", api.method, api.path, api.client, target));
        }

        chunk.push('\n');
        chunk
    }
}

/// Entry first, then callees breadth-first, then direct callers of the entry
fn emission_order(graph: &CallGraph, entry_id: &str) -> Vec<String> {
    let mut order = vec![entry_id.to_string()];
    let mut seen: HashSet<String> = order.iter().cloned().collect();
    let mut queue = VecDeque::from([entry_id.to_string()]);

    while let Some(current) = queue.pop_front() {
        for callee in graph.callees(&current) {
            if seen.insert(callee.to_string()) {
                order.push(callee.to_string());
                queue.push_back(callee.to_string());
            }
        }
    }

    for caller in graph.callers(entry_id) {
        if seen.insert(caller.to_string()) {
            order.push(caller.to_string());
        }
    }
    order
}

fn truncate_at_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::fixtures::element;
    use crate::core::model::{ApiCallReference, CallReference};

    const SOURCE: &str = "import requests\n\
def handle(order_id):\n    order = load(order_id)\n    return notify(order)\n\
def load(order_id):\n    return requests.get('/orders/' + order_id)\n\
def notify(order):\n    print(order)\n\
def unrelated():\n    pass\n";

    fn tree() -> CodeElement {
        let mut root = element("shop", ElementKind::Module, "shop", (1, 10));
        let mut handle = element("shop::handle", ElementKind::Function, "handle", (2, 4));
        handle.calls = vec![CallReference::new("load", 3), CallReference::new("notify", 4)];
        let load = element("shop::load", ElementKind::Function, "load", (5, 6));
        let mut notify = element("shop::notify", ElementKind::Function, "notify", (7, 8));
        notify.calls = vec![CallReference::new("print", 8)];
        let unrelated = element("shop::unrelated", ElementKind::Function, "unrelated", (9, 10));
        root.children = vec![handle, load, notify, unrelated];
        root
    }

    fn graph(root: &CodeElement) -> CallGraph {
        let mut graph = CallGraph::build(root);
        graph.api_calls.insert(
            "shop::load".to_string(),
            vec![ApiCallReference {
                method: "GET".to_string(),
                path: "/orders/{order_id}".to_string(),
                client: "requests".to_string(),
                line: 6,
                is_external: false,
                matched_endpoint: None,
            }],
        );
        graph
    }

    fn source() -> ContextSource<'static> {
        ContextSource {
            path: Path::new("src/shop.py"),
            language: "python",
            source: SOURCE,
        }
    }

    #[test]
    fn test_entry_and_callees_in_order() {
        let root = tree();
        let graph = graph(&root);
        let context = ContextCompiler::new(10_000).compile(&source(), &root, &graph, Some("shop::handle"));

        assert_eq!(context.elements, vec!["shop::handle", "shop::load", "shop::notify"]);
        assert!(!context.truncated);
        assert!(context.text.contains("### FUNCTION: handle (from shop.py, lines 2-4)"));
        assert!(context.text.contains("Calls: load, notify"));
        assert!(context.text.contains("API call: GET /orders/{order_id} via requests"));
        assert!(context.text.contains("print (external)"));
        assert!(!context.text.contains("unrelated"));

        let handle = context.text.find("handle (from").unwrap();
        let load = context.text.find("load (from").unwrap();
        assert!(handle < load);
    }

    #[test]
    fn test_budget_truncates_after_entry() {
        let root = tree();
        let graph = graph(&root);
        let context = ContextCompiler::new(260).compile(&source(), &root, &graph, Some("shop::handle"));

        assert!(context.truncated);
        assert_eq!(context.elements, vec!["shop::handle"]);
        assert!(context.text.len() <= 260);
        assert!(context.estimate_tokens() <= 65);
    }

    #[test]
    fn test_nested_elements_not_repeated() {
        let mut root = element("m", ElementKind::Module, "m", (1, 4));
        let mut outer = element("m::outer", ElementKind::Function, "outer", (1, 4));
        outer.calls = vec![CallReference::new("inner", 4)];
        outer.children = vec![element("m::outer::inner", ElementKind::Function, "inner", (2, 3))];
        root.children = vec![outer];
        let graph = CallGraph::build(&root);

        let file = ContextSource {
            path: Path::new("m.py"),
            language: "python",
            source: "def outer():\n    def inner():\n        pass\n    inner()\n",
        };
        let context = ContextCompiler::new(10_000).compile(&file, &root, &graph, Some("m::outer"));
        assert_eq!(context.elements, vec!["m::outer"]);
    }

    #[test]
    fn test_whole_file_without_entrypoint() {
        let root = tree();
        let graph = graph(&root);
        let context = ContextCompiler::new(10_000).compile(&source(), &root, &graph, None);

        assert_eq!(
            context.elements,
            vec!["shop::handle", "shop::load", "shop::notify", "shop::unrelated"]
        );
        assert!(!context.text.contains("# Entrypoint"));
    }
}
