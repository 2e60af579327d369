mod engine;
mod model;
mod normalizer;
mod parser;

// Tree-sitter adapters
mod languages;

// Call resolution and API classification
mod call_graph;

// Canvas documents and layouts
mod canvas;

// Flow analysis collaborator
mod llm;

pub use engine::{Engine, FlowOptions, StructuralOptions};
pub use canvas::{CanvasColor, Palette};
