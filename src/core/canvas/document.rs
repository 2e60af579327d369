//! JSON Canvas document types and serialization

use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::model::ElementKind;
use crate::error::{CanvasError, Result};
use super::flow::StepKind;

/// The six preset canvas colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanvasColor {
    #[serde(rename = "1")]
    Red,
    #[serde(rename = "2")]
    Orange,
    #[serde(rename = "3")]
    Yellow,
    #[serde(rename = "4")]
    Green,
    #[serde(rename = "5")]
    Cyan,
    #[serde(rename = "6")]
    Purple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

/// Kind → color mapping shared by the structural and flow canvases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub module: CanvasColor,
    pub class: CanvasColor,
    pub function: CanvasColor,
    pub method: CanvasColor,
    pub component: CanvasColor,
    pub variable: CanvasColor,
    /// The external calls sink
    pub external: CanvasColor,
    pub start: CanvasColor,
    pub process: CanvasColor,
    pub decision: CanvasColor,
    pub data: CanvasColor,
    pub end: CanvasColor,
    pub error: CanvasColor,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            module: CanvasColor::Orange,
            class: CanvasColor::Purple,
            function: CanvasColor::Cyan,
            method: CanvasColor::Cyan,
            component: CanvasColor::Cyan,
            variable: CanvasColor::Green,
            external: CanvasColor::Orange,
            start: CanvasColor::Green,
            process: CanvasColor::Cyan,
            decision: CanvasColor::Yellow,
            data: CanvasColor::Purple,
            end: CanvasColor::Green,
            error: CanvasColor::Red,
        }
    }
}

impl Palette {
    pub fn for_kind(&self, kind: ElementKind) -> CanvasColor {
        match kind {
            ElementKind::Module => self.module,
            ElementKind::Class => self.class,
            ElementKind::Function => self.function,
            ElementKind::Method => self.method,
            ElementKind::Component => self.component,
            ElementKind::Variable => self.variable,
        }
    }

    pub fn for_step(&self, kind: StepKind) -> CanvasColor {
        match kind {
            StepKind::Start => self.start,
            StepKind::Process => self.process,
            StepKind::Decision => self.decision,
            StepKind::Data => self.data,
            StepKind::End => self.end,
            StepKind::Error => self.error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub color: CanvasColor,
    pub text: String,
}

impl CanvasNode {
    pub fn text(id: impl Into<String>, x: i64, y: i64, size: (i64, i64), color: CanvasColor, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: "text".to_string(),
            x,
            y,
            width: size.0,
            height: size.1,
            color,
            text: text.into(),
        }
    }

    pub fn right(&self) -> i64 {
        self.x + self.width
    }

    #[cfg(test)]
    pub fn bottom(&self) -> i64 {
        self.y + self.height
    }

    fn center(&self) -> (i64, i64) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Whether the two bounding boxes share any area
    #[cfg(test)]
    pub fn overlaps(&self, other: &CanvasNode) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasEdge {
    pub id: String,
    pub from_node: String,
    pub from_side: Side,
    pub to_node: String,
    pub to_side: Side,
    pub color: CanvasColor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Sides for an edge between two nodes: vertical when the vertical distance dominates
pub fn edge_sides(from: &CanvasNode, to: &CanvasNode) -> (Side, Side) {
    if from.id == to.id {
        return (Side::Right, Side::Top);
    }

    let (fx, fy) = from.center();
    let (tx, ty) = to.center();
    let (dx, dy) = (tx - fx, ty - fy);

    if dy.abs() >= dx.abs() {
        if dy >= 0 {
            (Side::Bottom, Side::Top)
        } else {
            (Side::Top, Side::Bottom)
        }
    } else if dx > 0 {
        (Side::Right, Side::Left)
    } else {
        (Side::Left, Side::Right)
    }
}

/// First 16 hex chars of SHA-256
pub fn short_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasDocument {
    pub nodes: Vec<CanvasNode>,
    pub edges: Vec<CanvasEdge>,
}

impl CanvasDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; a repeated id is a layout error
    pub fn add_node(&mut self, node: CanvasNode) -> Result<()> {
        if self.node(&node.id).is_some() {
            return Err(CanvasError::Layout(format!("duplicate node id {}", node.id)));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Connect two existing nodes, choosing sides from their positions
    pub fn connect(&mut self, from: &str, to: &str, color: CanvasColor, label: Option<String>) -> Result<()> {
        let sides = match (self.node(from), self.node(to)) {
            (Some(f), Some(t)) => edge_sides(f, t),
            _ => {
                return Err(CanvasError::Layout(format!("edge {} -> {} references a missing node", from, to)));
            }
        };
        self.connect_sides(from, to, sides, color, label)
    }

    /// Connect two existing nodes through the given sides
    pub fn connect_sides(
        &mut self,
        from: &str,
        to: &str,
        (from_side, to_side): (Side, Side),
        color: CanvasColor,
        label: Option<String>,
    ) -> Result<()> {
        if self.node(from).is_none() || self.node(to).is_none() {
            return Err(CanvasError::Layout(format!("edge {} -> {} references a missing node", from, to)));
        }

        let id = format!("e_{}", short_hash(&format!("{}->{}#{}", from, to, label.as_deref().unwrap_or(""))));
        if self.edges.iter().any(|e| e.id == id) {
            return Err(CanvasError::Layout(format!("duplicate edge {} -> {}", from, to)));
        }

        self.edges.push(CanvasEdge {
            id,
            from_node: from.to_string(),
            from_side,
            to_node: to.to_string(),
            to_side,
            color,
            label,
        });
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&CanvasNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Check unique ids and that every edge endpoint exists
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(CanvasError::Layout(format!("duplicate node id {}", node.id)));
            }
            if node.width <= 0 || node.height <= 0 {
                return Err(CanvasError::Layout(format!("node {} has a non-positive size", node.id)));
            }
        }

        let mut edge_ids = HashSet::new();
        for edge in &self.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(CanvasError::Layout(format!("duplicate edge id {}", edge.id)));
            }
            for endpoint in [&edge.from_node, &edge.to_node] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(CanvasError::Layout(format!(
                        "edge {} references missing node {}",
                        edge.id, endpoint
                    )));
                }
            }
        }
        Ok(())
    }

    /// Rightmost extent of all nodes, or 0 for an empty document
    pub fn max_x(&self) -> i64 {
        self.nodes.iter().map(CanvasNode::right).max().unwrap_or(0)
    }

    pub fn min_x(&self) -> i64 {
        self.nodes.iter().map(|n| n.x).min().unwrap_or(0)
    }

    /// Place several documents side by side, left to right, prefixing ids with `f<index>_`
    pub fn merge_horizontal(documents: Vec<CanvasDocument>, gutter: i64) -> CanvasDocument {
        let mut merged = CanvasDocument::new();
        let mut offset = 0;

        for (index, document) in documents.into_iter().enumerate() {
            if document.nodes.is_empty() {
                continue;
            }
            let shift = offset - document.min_x();
            let prefix = format!("f{}_", index);

            for mut node in document.nodes {
                node.id = format!("{}{}", prefix, node.id);
                node.x += shift;
                offset = offset.max(node.right() + gutter);
                merged.nodes.push(node);
            }
            for mut edge in document.edges {
                edge.id = format!("{}{}", prefix, edge.id);
                edge.from_node = format!("{}{}", prefix, edge.from_node);
                edge.to_node = format!("{}{}", prefix, edge.to_node);
                merged.edges.push(edge);
            }
        }

        merged
    }

    /// Serialize with tab indentation, or on one line when `compact`
    pub fn to_json(&self, compact: bool) -> Result<String> {
        if compact {
            return Ok(serde_json::to_string(self)?);
        }

        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        String::from_utf8(buffer).map_err(|e| CanvasError::Layout(e.to_string()))
    }

    #[cfg(test)]
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
