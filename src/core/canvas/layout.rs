//! Structural canvas layout
//!
//! Every element except the module root becomes a node. A node's row is its nesting depth
//! plus the call band it falls in among its siblings: siblings called by other siblings sit
//! in lower bands. Each sibling is allocated the full width of its subtree, so subtrees
//! never share horizontal space and bands never share rows.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::config::LayoutConfig;
use crate::core::call_graph::CallGraph;
use crate::core::model::{CodeElement, ElementKind};
use crate::error::Result;
use super::dimensions::measure;
use super::document::{short_hash, CanvasDocument, CanvasNode, Palette};

/// Id of the shared sink for unresolved calls
pub const EXTERNAL_NODE_ID: &str = "external_calls";

/// Node id for an element id
pub fn node_id(element_id: &str) -> String {
    format!("n_{}", short_hash(element_id))
}

/// Per-element layout plan computed bottom-up before placement
struct Plan {
    text: String,
    size: (i64, i64),
    /// Child indices grouped by call band, each band in source order
    bands: Vec<Vec<usize>>,
    /// Rows used by the tallest subtree of each band
    band_rows: Vec<usize>,
    /// Allocated subtree width
    width: i64,
    /// Rows used by this element and its subtree
    rows: usize,
}

pub struct StructuralLayout<'a> {
    config: &'a LayoutConfig,
    palette: &'a Palette,
}

impl<'a> StructuralLayout<'a> {
    pub fn new(config: &'a LayoutConfig, palette: &'a Palette) -> Self {
        Self { config, palette }
    }

    /// Lay out one tree and its call graph
    pub fn build(&self, root: &CodeElement, graph: &CallGraph) -> Result<CanvasDocument> {
        let edges: HashSet<(&str, &str)> = graph
            .unique_edges()
            .into_iter()
            .map(|e| (e.caller.as_str(), e.callee.as_str()))
            .collect();

        let mut plans = HashMap::new();
        self.plan(root, true, graph, &edges, &mut plans);

        let mut document = CanvasDocument::new();
        let mut node_ids: HashMap<&str, String> = HashMap::new();
        self.place_children(root, 0, 0, &plans, &mut document, &mut node_ids)?;

        for edge in graph.unique_edges() {
            if let (Some(from), Some(to)) = (node_ids.get(edge.caller.as_str()), node_ids.get(edge.callee.as_str())) {
                let color = document.node(from).map(|n| n.color).unwrap_or(self.palette.function);
                document.connect(from, to, color, None)?;
            }
        }

        self.add_external_sink(graph, &node_ids, &mut document)?;
        document.validate()?;

        debug!(
            "Laid out {}: {} nodes, {} edges",
            root.name,
            document.nodes.len(),
            document.edges.len()
        );
        Ok(document)
    }

    fn plan<'t>(
        &self,
        element: &'t CodeElement,
        is_root: bool,
        graph: &CallGraph,
        edges: &HashSet<(&str, &str)>,
        plans: &mut HashMap<&'t str, Plan>,
    ) {
        for child in &element.children {
            self.plan(child, false, graph, edges, plans);
        }

        let bands = sibling_bands(&element.children, edges);
        let mut band_rows = Vec::with_capacity(bands.len());
        let mut children_width = 0;
        for band in &bands {
            let member_plans: Vec<&Plan> = band.iter().filter_map(|&i| plans.get(element.children[i].id.as_str())).collect();
            let width: i64 = member_plans.iter().map(|p| p.width).sum::<i64>()
                + self.config.gutter * (member_plans.len() as i64 - 1).max(0);
            children_width = children_width.max(width);
            band_rows.push(member_plans.iter().map(|p| p.rows).max().unwrap_or(0));
        }
        let children_rows: usize = band_rows.iter().sum();

        let (text, size) = if is_root {
            (String::new(), (0, 0))
        } else {
            let text = self.node_text(element, graph);
            let size = measure(&text, self.config);
            (text, size)
        };

        let (width, rows) = if is_root {
            (children_width, children_rows)
        } else {
            (size.0.max(children_width), 1 + children_rows)
        };

        plans.insert(
            element.id.as_str(),
            Plan {
                text,
                size,
                bands,
                band_rows,
                width,
                rows,
            },
        );
    }

    fn place<'t>(
        &self,
        element: &'t CodeElement,
        x: i64,
        row: usize,
        plans: &HashMap<&'t str, Plan>,
        document: &mut CanvasDocument,
        node_ids: &mut HashMap<&'t str, String>,
    ) -> Result<()> {
        let Some(plan) = plans.get(element.id.as_str()) else {
            return Ok(());
        };

        let id = node_id(&element.id);
        document.add_node(CanvasNode::text(
            id.clone(),
            x,
            row as i64 * self.config.row_height,
            plan.size,
            self.palette.for_kind(element.kind),
            plan.text.clone(),
        ))?;
        node_ids.insert(element.id.as_str(), id);

        self.place_children(element, x, row + 1, plans, document, node_ids)
    }

    fn place_children<'t>(
        &self,
        parent: &'t CodeElement,
        x0: i64,
        row0: usize,
        plans: &HashMap<&'t str, Plan>,
        document: &mut CanvasDocument,
        node_ids: &mut HashMap<&'t str, String>,
    ) -> Result<()> {
        let Some(plan) = plans.get(parent.id.as_str()) else {
            return Ok(());
        };

        let mut row = row0;
        for (band, band_rows) in plan.bands.iter().zip(&plan.band_rows) {
            let mut x = x0;
            for &index in band {
                let child = &parent.children[index];
                self.place(child, x, row, plans, document, node_ids)?;
                x += plans.get(child.id.as_str()).map_or(0, |p| p.width) + self.config.gutter;
            }
            row += band_rows;
        }
        Ok(())
    }

    /// One sink node listing distinct unresolved names, one labeled edge per name
    fn add_external_sink(
        &self,
        graph: &CallGraph,
        node_ids: &HashMap<&str, String>,
        document: &mut CanvasDocument,
    ) -> Result<()> {
        let mut seen = HashSet::new();
        let targets: Vec<(&str, &String)> = graph
            .unresolved
            .iter()
            .filter_map(|u| node_ids.get(u.caller.as_str()).map(|node| (u.name.as_str(), node)))
            .filter(|(name, _)| seen.insert(*name))
            .collect();

        if targets.is_empty() {
            return Ok(());
        }

        let mut text = String::from("### External calls");
        for (name, _) in &targets {
            text.push_str(&format!("\n- `{}`", name));
        }
        let size = measure(&text, self.config);
        let x = document.max_x() + self.config.gutter;
        document.add_node(CanvasNode::text(EXTERNAL_NODE_ID, x, 0, size, self.palette.external, text))?;

        for (name, caller) in targets {
            document.connect(caller, EXTERNAL_NODE_ID, self.palette.external, Some(name.to_string()))?;
        }
        Ok(())
    }

    /// Markup shown inside an element's node
    fn node_text(&self, element: &CodeElement, graph: &CallGraph) -> String {
        let mut lines = Vec::new();

        if element.kind == ElementKind::Variable {
            let mut line = format!("**{}**", element.name);
            if let Some(hint) = &element.return_type {
                line.push_str(&format!(": {}", hint));
            }
            lines.push(line);
        } else {
            let prefix = if element.is_async { "async " } else { "" };
            lines.push(format!("### {}{}", prefix, element.name));
        }

        if self.config.show_params && element.kind.is_callable() {
            let visible: Vec<String> = element
                .parameters
                .iter()
                .filter(|p| p.name != "self" && p.name != "cls")
                .map(|p| p.display())
                .collect();
            if !visible.is_empty() {
                let mut shown: Vec<String> = visible.iter().take(self.config.max_params).cloned().collect();
                if visible.len() > self.config.max_params {
                    shown.push("…".to_string());
                }
                lines.push(format!("({})", shown.join(", ")));
            }
        }

        if let Some(return_type) = element.return_type.as_ref().filter(|_| element.kind.is_callable()) {
            lines.push(format!("→ {}", return_type));
        }

        if element.kind == ElementKind::Class && !element.base_classes.is_empty() {
            lines.push(format!("extends {}", element.base_classes.join(", ")));
        }

        if self.config.show_docstrings {
            if let Some(first_line) = element.docstring.as_deref().and_then(|d| d.lines().next()) {
                let excerpt = truncate(first_line.trim(), self.config.docstring_chars);
                if !excerpt.is_empty() {
                    lines.push(format!("*{}*", excerpt));
                }
            }
        }

        for api in graph.api_calls_for(&element.id) {
            let mut line = format!("`{} {}`", api.method, api.path);
            if let Some(endpoint) = &api.matched_endpoint {
                line.push_str(&format!(" → {}", endpoint));
            }
            lines.push(line);
        }

        lines.join("\n")
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

/// Group siblings into call bands. A sibling's band is one more than the highest band of
/// the siblings calling it; back edges found by a source-order DFS are ignored.
fn sibling_bands(children: &[CodeElement], edges: &HashSet<(&str, &str)>) -> Vec<Vec<usize>> {
    let n = children.len();
    if n == 0 {
        return Vec::new();
    }

    let index: HashMap<&str, usize> = children.iter().enumerate().map(|(i, c)| (c.id.as_str(), i)).collect();
    let mut calls: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(caller, callee) in edges {
        if let (Some(&i), Some(&j)) = (index.get(caller), index.get(callee)) {
            if i != j {
                calls[i].push(j);
            }
        }
    }
    for targets in &mut calls {
        targets.sort_unstable();
        targets.dedup();
    }

    // 0 = unvisited, 1 = on stack, 2 = done
    let mut state = vec![0u8; n];
    let mut back_edges = HashSet::new();
    for start in 0..n {
        if state[start] == 0 {
            mark_back_edges(start, &calls, &mut state, &mut back_edges);
        }
    }

    let mut callers: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, targets) in calls.iter().enumerate() {
        for &j in targets {
            if !back_edges.contains(&(i, j)) {
                callers[j].push(i);
            }
        }
    }

    let mut memo: Vec<Option<usize>> = vec![None; n];
    let bands: Vec<usize> = (0..n).map(|i| band_of(i, &callers, &mut memo)).collect();

    let band_count = bands.iter().max().map_or(0, |b| b + 1);
    let mut grouped = vec![Vec::new(); band_count];
    for (i, band) in bands.into_iter().enumerate() {
        grouped[band].push(i);
    }
    grouped
}

fn mark_back_edges(node: usize, calls: &[Vec<usize>], state: &mut [u8], back_edges: &mut HashSet<(usize, usize)>) {
    state[node] = 1;
    for &next in &calls[node] {
        match state[next] {
            0 => mark_back_edges(next, calls, state, back_edges),
            1 => {
                back_edges.insert((node, next));
            }
            _ => {}
        }
    }
    state[node] = 2;
}

fn band_of(node: usize, callers: &[Vec<usize>], memo: &mut [Option<usize>]) -> usize {
    if let Some(band) = memo[node] {
        return band;
    }
    let band = callers[node]
        .iter()
        .map(|&caller| band_of(caller, callers, memo) + 1)
        .max()
        .unwrap_or(0);
    memo[node] = Some(band);
    band
}
