//! Boundary to the external flow-analysis service
//!
//! The engine compiles a code context, hands it to a flow analyzer, and lays out the
//! returned steps. Providers are chosen from `[analysis]` config by [`create_analyzer`].

mod analyzer;
mod context;
mod prompts;
mod providers;

pub use analyzer::{analyze_with_retry, AnalysisRequest};
pub use context::{ContextCompiler, ContextSource};
pub use providers::create_analyzer;
