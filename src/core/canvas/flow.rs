//! Execution-flow canvas
//!
//! The trunk runs top to bottom in column 0. A decision's branch groups go one column to
//! the right, starting level with the decision or below whatever already occupies that
//! column, and nest further right recursively.

use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::LayoutConfig;
use crate::error::{CanvasError, Result};
use super::dimensions::measure;
use super::document::{CanvasDocument, CanvasNode, Palette, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Start,
    Process,
    Decision,
    Data,
    End,
    Error,
}

impl StepKind {
    fn icon(&self) -> &'static str {
        match self {
            Self::Start => "▶",
            Self::Process => "⚙",
            Self::Decision => "◆",
            Self::Data => "🗄",
            Self::End => "■",
            Self::Error => "✖",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Error)
    }
}

/// One outcome of a decision with its own step sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchGroup {
    pub label: String,
    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStep {
    pub id: String,
    #[serde(alias = "step_type", alias = "type")]
    pub kind: StepKind,
    #[serde(alias = "name")]
    pub label: String,
    #[serde(default, alias = "description", skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<BranchGroup>,
}

/// A data shape the analyzed code passes around
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFormat {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// What the analysis collaborator returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub steps: Vec<FlowStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_formats: Vec<DataFormat>,
}

/// Demote decisions with fewer than two branches and drop branches on other steps
pub fn normalize_steps(steps: Vec<FlowStep>) -> Vec<FlowStep> {
    steps
        .into_iter()
        .map(|mut step| {
            if step.kind == StepKind::Decision && step.branches.len() < 2 {
                warn!(
                    "Decision '{}' has {} branch(es); treating it as a process step",
                    step.id,
                    step.branches.len()
                );
                step.kind = StepKind::Process;
                step.branches.clear();
            } else if step.kind != StepKind::Decision && !step.branches.is_empty() {
                warn!("Dropping branches on non-decision step '{}'", step.id);
                step.branches.clear();
            }

            for group in &mut step.branches {
                group.steps = normalize_steps(std::mem::take(&mut group.steps));
            }
            step
        })
        .collect()
}

/// Check the invariants a flow must satisfy before it can be drawn
pub fn validate_steps(steps: &[FlowStep]) -> Result<()> {
    let first = steps
        .first()
        .ok_or_else(|| CanvasError::Layout("flow has no steps".to_string()))?;
    if first.kind != StepKind::Start {
        return Err(CanvasError::Layout(format!(
            "flow must begin with a start step, found {:?} step '{}'",
            first.kind, first.id
        )));
    }

    let mut ids = HashSet::new();
    check_sequence(steps, "trunk", &mut ids)
}

fn check_sequence<'a>(steps: &'a [FlowStep], owner: &str, ids: &mut HashSet<&'a str>) -> Result<()> {
    let last = steps
        .last()
        .ok_or_else(|| CanvasError::Layout(format!("{} has an empty step sequence", owner)))?;

    for step in steps {
        if !ids.insert(step.id.as_str()) {
            return Err(CanvasError::Layout(format!("duplicate step id '{}'", step.id)));
        }
        for group in &step.branches {
            check_sequence(&group.steps, &format!("branch '{}' of '{}'", group.label, step.id), ids)?;
        }
    }

    let terminated = last.kind.is_terminal() || (last.kind == StepKind::Decision && !last.branches.is_empty());
    if !terminated {
        return Err(CanvasError::Layout(format!(
            "{} does not terminate: last step '{}' is neither end nor error",
            owner, last.id
        )));
    }
    Ok(())
}

/// Node id for a step id
pub fn step_node_id(step_id: &str) -> String {
    format!("step_{}", step_id)
}

pub struct FlowSynthesizer<'a> {
    config: &'a LayoutConfig,
    palette: &'a Palette,
}

impl<'a> FlowSynthesizer<'a> {
    pub fn new(config: &'a LayoutConfig, palette: &'a Palette) -> Self {
        Self { config, palette }
    }

    /// Normalize, validate and draw a full analysis
    pub fn build(&self, analysis: &FlowAnalysis) -> Result<CanvasDocument> {
        let steps = normalize_steps(analysis.steps.clone());
        validate_steps(&steps)?;

        let top_row = usize::from(analysis.summary.is_some());
        let mut state = Placement {
            document: CanvasDocument::new(),
            next_free: Vec::new(),
        };
        self.place_sequence(&steps, 0, top_row, &mut state)?;

        let deepest = state.next_free.len().max(1);
        let mut document = state.document;

        if let Some(summary) = &analysis.summary {
            let text = format!("## Summary\n{}", summary.trim());
            let (width, height) = measure(&text, self.config);
            let span = (deepest as i64 * self.column_width() - self.config.column_gutter).max(width);
            document.add_node(CanvasNode::text("summary", 0, 0, (span, height), self.palette.process, text))?;
        }

        for (index, format) in analysis.data_formats.iter().enumerate() {
            let mut text = format!("### 🗄 {}", format.name);
            if !format.description.trim().is_empty() {
                text.push_str(&format!("\n*{}*", format.description.trim()));
            }
            for field in &format.fields {
                text.push_str(&format!("\n- `{}`", field));
            }
            let size = measure(&text, self.config);
            let x = deepest as i64 * self.column_width();
            let y = (top_row + index) as i64 * self.config.row_height;
            document.add_node(CanvasNode::text(format!("format_{}", index), x, y, size, self.palette.data, text))?;
        }

        document.validate()?;
        Ok(document)
    }

    fn column_width(&self) -> i64 {
        self.config.max_width + self.config.column_gutter
    }

    /// Place `steps` top to bottom in `column` from `start_row`, branches depth first
    fn place_sequence(&self, steps: &[FlowStep], column: usize, start_row: usize, state: &mut Placement) -> Result<()> {
        if state.next_free.len() <= column {
            state.next_free.resize(column + 1, 0);
        }

        let mut previous: Option<(String, StepKind)> = None;
        for (offset, step) in steps.iter().enumerate() {
            let row = start_row + offset;
            let id = step_node_id(&step.id);
            let text = self.step_text(step);
            let size = measure(&text, self.config);

            state.document.add_node(CanvasNode::text(
                id.clone(),
                column as i64 * self.column_width(),
                row as i64 * self.config.row_height,
                size,
                self.palette.for_step(step.kind),
                text,
            ))?;
            state.next_free[column] = row + 1;

            if let Some((previous_id, previous_kind)) = &previous {
                let color = if step.kind == StepKind::Error {
                    self.palette.error
                } else {
                    self.palette.for_step(*previous_kind)
                };
                state.document.connect_sides(previous_id, &id, (Side::Bottom, Side::Top), color, None)?;
            }

            if step.kind == StepKind::Decision {
                let branch_column = column + 1;
                if state.next_free.len() <= branch_column {
                    state.next_free.resize(branch_column + 1, 0);
                }

                for group in &step.branches {
                    let group_row = row.max(state.next_free[branch_column]);
                    self.place_sequence(&group.steps, branch_column, group_row, state)?;

                    if let Some(first) = group.steps.first() {
                        let color = if first.kind == StepKind::Error {
                            self.palette.error
                        } else {
                            self.palette.decision
                        };
                        state.document.connect_sides(
                            &id,
                            &step_node_id(&first.id),
                            (Side::Right, Side::Left),
                            color,
                            Some(group.label.clone()),
                        )?;
                    }
                }
            }

            previous = Some((id, step.kind));
        }
        Ok(())
    }

    fn step_text(&self, step: &FlowStep) -> String {
        let mut text = format!("{} **{}**", step.kind.icon(), step.label.trim());
        if let Some(detail) = step.detail.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            text.push_str(&format!("\n*{}*", detail));
        }
        text
    }
}

struct Placement {
    document: CanvasDocument,
    /// First unoccupied row per column
    next_free: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, kind: StepKind) -> FlowStep {
        FlowStep {
            id: id.to_string(),
            kind,
            label: id.replace('_', " "),
            detail: None,
            branches: Vec::new(),
        }
    }

    fn decision(id: &str, branches: Vec<(&str, Vec<FlowStep>)>) -> FlowStep {
        FlowStep {
            branches: branches
                .into_iter()
                .map(|(label, steps)| BranchGroup {
                    label: label.to_string(),
                    steps,
                })
                .collect(),
            ..step(id, StepKind::Decision)
        }
    }

    fn synthesize(steps: &[FlowStep]) -> Result<CanvasDocument> {
        let config = LayoutConfig::default();
        let palette = Palette::default();
        FlowSynthesizer::new(&config, &palette).build(&FlowAnalysis {
            summary: None,
            steps: steps.to_vec(),
            data_formats: Vec::new(),
        })
    }

    fn yes_no_flow() -> Vec<FlowStep> {
        vec![
            step("start", StepKind::Start),
            decision(
                "valid",
                vec![
                    ("yes", vec![step("save", StepKind::Process), step("done", StepKind::End)]),
                    ("no", vec![step("reject", StepKind::Error)]),
                ],
            ),
        ]
    }

    #[test]
    fn test_decision_has_two_labeled_branches() {
        let doc = synthesize(&yes_no_flow()).unwrap();
        let decision_id = step_node_id("valid");

        let outgoing: Vec<_> = doc.edges.iter().filter(|e| e.from_node == decision_id).collect();
        assert_eq!(outgoing.len(), 2);

        let yes = outgoing.iter().find(|e| e.label.as_deref() == Some("yes")).unwrap();
        let after_yes = doc.edges.iter().find(|e| e.from_node == yes.to_node).unwrap();
        assert_eq!(after_yes.to_node, step_node_id("done"));
        assert_eq!(doc.node(&after_yes.to_node).unwrap().color, Palette::default().end);

        let no = outgoing.iter().find(|e| e.label.as_deref() == Some("no")).unwrap();
        assert_eq!(no.to_node, step_node_id("reject"));
        assert_eq!(no.color, Palette::default().error);
        assert_eq!((no.from_side, no.to_side), (Side::Right, Side::Left));
    }

    #[test]
    fn test_branches_stack_without_overlap() {
        let doc = synthesize(&yes_no_flow()).unwrap();
        let save = doc.node(&step_node_id("save")).unwrap();
        let done = doc.node(&step_node_id("done")).unwrap();
        let reject = doc.node(&step_node_id("reject")).unwrap();
        let valid = doc.node(&step_node_id("valid")).unwrap();

        assert_eq!(save.y, valid.y);
        assert!(save.x > valid.x);
        assert_eq!(reject.x, save.x);
        assert!(reject.y > done.y);
        for (i, a) in doc.nodes.iter().enumerate() {
            for b in &doc.nodes[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn test_nested_decisions_grow_to_the_right() {
        let steps = vec![
            step("start", StepKind::Start),
            decision(
                "outer",
                vec![
                    (
                        "a",
                        vec![decision(
                            "inner",
                            vec![
                                ("x", vec![step("x_end", StepKind::End)]),
                                ("y", vec![step("y_end", StepKind::Error)]),
                            ],
                        )],
                    ),
                    ("b", vec![step("b_end", StepKind::End)]),
                ],
            ),
        ];

        let doc = synthesize(&steps).unwrap();
        let column = LayoutConfig::default().max_width + LayoutConfig::default().column_gutter;
        assert_eq!(doc.node(&step_node_id("x_end")).unwrap().x, 2 * column);
        assert_eq!(doc.edges.len(), 5);
    }

    #[test]
    fn test_missing_start_is_rejected() {
        let err = synthesize(&[step("work", StepKind::Process), step("done", StepKind::End)]).unwrap_err();
        assert!(err.to_string().contains("must begin with a start step"));
    }

    #[test]
    fn test_unterminated_branch_is_rejected() {
        let steps = vec![
            step("start", StepKind::Start),
            decision(
                "check",
                vec![
                    ("ok", vec![step("continue", StepKind::Process)]),
                    ("fail", vec![step("boom", StepKind::Error)]),
                ],
            ),
        ];
        let err = synthesize(&steps).unwrap_err();
        assert!(err.to_string().contains("branch 'ok' of 'check' does not terminate"));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let steps = vec![step("start", StepKind::Start), step("start", StepKind::End)];
        assert!(synthesize(&steps).unwrap_err().to_string().contains("duplicate step id"));
    }

    #[test]
    fn test_single_branch_decision_is_demoted() {
        let steps = vec![
            step("start", StepKind::Start),
            decision("maybe", vec![("only", vec![step("lonely", StepKind::End)])]),
            step("done", StepKind::End),
        ];

        let normalized = normalize_steps(steps.clone());
        assert_eq!(normalized[1].kind, StepKind::Process);
        assert!(normalized[1].branches.is_empty());

        let doc = synthesize(&steps).unwrap();
        assert_eq!(doc.nodes.len(), 3);
        assert!(doc.node(&step_node_id("lonely")).is_none());
    }

    #[test]
    fn test_summary_and_data_formats() {
        let analysis = FlowAnalysis {
            summary: Some("Creates an order.".to_string()),
            steps: vec![step("start", StepKind::Start), step("done", StepKind::End)],
            data_formats: vec![DataFormat {
                name: "OrderRequest".to_string(),
                description: "Incoming payload".to_string(),
                fields: vec!["items".to_string(), "total".to_string()],
            }],
        };
        let config = LayoutConfig::default();
        let palette = Palette::default();
        let doc = FlowSynthesizer::new(&config, &palette).build(&analysis).unwrap();

        let summary = doc.node("summary").unwrap();
        assert_eq!(summary.y, 0);
        assert_eq!(doc.node(&step_node_id("start")).unwrap().y, config.row_height);
        let format = doc.node("format_0").unwrap();
        assert!(format.x >= config.max_width + config.column_gutter);
        assert!(format.text.contains("- `items`"));
    }

    #[test]
    fn test_analysis_accepts_alternate_field_names() {
        let analysis: FlowAnalysis = serde_json::from_str(
            r#"{"steps": [{"id": "s", "step_type": "start", "name": "Begin", "description": "entry"},
                          {"id": "e", "kind": "end", "label": "Finish"}]}"#,
        )
        .unwrap();
        assert_eq!(analysis.steps[0].kind, StepKind::Start);
        assert_eq!(analysis.steps[0].detail.as_deref(), Some("entry"));
        assert!(analysis.data_formats.is_empty());
    }
}
