use std::collections::{BTreeMap, HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::model::{ApiCallReference, CallReference, CodeElement};
use super::api_classifier;

/// Receivers that refer to the enclosing object rather than another value
const SELF_RECEIVERS: &[&str] = &["self", "this", "cls", "super", "super()"];

/// Edge in the call graph: `caller` calls `callee`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller: String,
    pub callee: String,
    /// Line number where the call occurs
    pub line: usize,
}

/// A call that did not resolve to any element in the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedCall {
    pub caller: String,
    /// Callee as written, receiver included
    pub name: String,
    pub line: usize,
}

/// Non-fatal note about a call that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionWarning {
    pub element_id: String,
    pub callee: String,
    pub line: usize,
}

/// Directed call graph over element ids of one tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallGraph {
    /// Resolved calls in tree pre-order, then call order
    pub edges: Vec<CallEdge>,
    pub unresolved: Vec<UnresolvedCall>,
    /// Classified HTTP calls per element id
    pub api_calls: BTreeMap<String, Vec<ApiCallReference>>,
    pub warnings: Vec<ResolutionWarning>,
}

impl CallGraph {
    /// Build the graph for one normalized tree
    pub fn build(root: &CodeElement) -> Self {
        let scopes = ScopeTable::new(root);
        let mut graph = CallGraph::default();

        for element in root.walk() {
            let mut classified: Vec<ApiCallReference> = element.api_calls.clone();
            let mut seen: HashSet<(String, String, String)> = HashSet::new();

            for call in &element.calls {
                if let Some(api) = api_classifier::classify(call) {
                    let key = (api.method.clone(), api.path.clone(), api.client.clone());
                    if seen.insert(key) {
                        classified.push(api);
                    } else if let Some(existing) = classified.iter_mut().skip(element.api_calls.len()).find(|a| {
                        a.method == api.method && a.path == api.path && a.client == api.client
                    }) {
                        existing.line = existing.line.min(api.line);
                    }
                    continue;
                }

                match scopes.resolve(&element.id, call) {
                    Some(callee) => graph.edges.push(CallEdge {
                        caller: element.id.clone(),
                        callee,
                        line: call.line,
                    }),
                    None => {
                        let name = call.callee_text();
                        debug!("Unresolved call {} in {} (line {})", name, element.id, call.line);
                        graph.warnings.push(ResolutionWarning {
                            element_id: element.id.clone(),
                            callee: name.clone(),
                            line: call.line,
                        });
                        graph.unresolved.push(UnresolvedCall {
                            caller: element.id.clone(),
                            name,
                            line: call.line,
                        });
                    }
                }
            }

            if !classified.is_empty() {
                graph.api_calls.insert(element.id.clone(), classified);
            }
        }

        if !graph.warnings.is_empty() {
            warn!(
                "{}: {} call(s) could not be resolved and go to the external calls node",
                root.name,
                graph.warnings.len()
            );
        }

        graph
    }

    /// Resolved edges with duplicate caller/callee pairs removed, first occurrence kept
    pub fn unique_edges(&self) -> Vec<&CallEdge> {
        let mut seen = HashSet::new();
        self.edges
            .iter()
            .filter(|e| seen.insert((e.caller.as_str(), e.callee.as_str())))
            .collect()
    }

    /// Ids called by `id`
    pub fn callees(&self, id: &str) -> Vec<&str> {
        self.edges.iter().filter(|e| e.caller == id).map(|e| e.callee.as_str()).collect()
    }

    /// Ids that call `id`
    pub fn callers(&self, id: &str) -> Vec<&str> {
        self.edges.iter().filter(|e| e.callee == id).map(|e| e.caller.as_str()).collect()
    }

    pub fn api_calls_for(&self, id: &str) -> &[ApiCallReference] {
        self.api_calls.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn api_call_count(&self) -> usize {
        self.api_calls.values().map(Vec::len).sum()
    }
}

/// Name lookup built once per tree: scope id → child name → first child id
struct ScopeTable {
    children: HashMap<String, HashMap<String, String>>,
    parents: HashMap<String, String>,
}

impl ScopeTable {
    fn new(root: &CodeElement) -> Self {
        let mut children: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut parents = HashMap::new();

        for element in root.walk() {
            let table = children.entry(element.id.clone()).or_default();
            for child in &element.children {
                // Children are in source order, so the first definition wins
                table.entry(child.name.clone()).or_insert_with(|| child.id.clone());
                parents.insert(child.id.clone(), element.id.clone());
            }
        }

        Self { children, parents }
    }

    /// Scope ids from `id` up to the root
    fn chain<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        std::iter::successors(Some(id), move |current| self.parents.get(*current).map(String::as_str))
    }

    fn lookup(&self, scope: &str, name: &str) -> Option<&String> {
        self.children.get(scope).and_then(|names| names.get(name))
    }

    fn find_in_chain(&self, from: &str, name: &str) -> Option<String> {
        self.chain(from).find_map(|scope| self.lookup(scope, name)).cloned()
    }

    fn resolve(&self, caller: &str, call: &CallReference) -> Option<String> {
        let receiver = match call.target.as_deref() {
            None => return self.find_in_chain(caller, &call.name),
            Some(receiver) if SELF_RECEIVERS.contains(&receiver) => {
                return self.find_in_chain(caller, &call.name);
            }
            Some(receiver) => receiver,
        };

        let mut segments = receiver.split('.');
        let first = segments.next()?;
        if !is_identifier(first) {
            return None;
        }

        let mut scope = if SELF_RECEIVERS.contains(&first) {
            // self.helpers.run(): walk from the enclosing scope
            let next = segments.next()?;
            self.find_in_chain(caller, next)?
        } else {
            self.find_in_chain(caller, first)?
        };

        for segment in segments {
            if !is_identifier(segment) {
                return None;
            }
            scope = self.lookup(&scope, segment)?.clone();
        }

        self.lookup(&scope, &call.name).cloned()
    }
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}
