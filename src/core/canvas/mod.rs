//! Canvas documents and the two layouts that produce them

mod dimensions;
mod document;
mod flow;
mod layout;

pub use document::{CanvasColor, CanvasDocument, Palette};
pub use flow::{FlowAnalysis, FlowStep, FlowSynthesizer, StepKind};
pub use layout::StructuralLayout;
