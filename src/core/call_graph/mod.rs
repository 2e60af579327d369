//! Call graph construction for normalized element trees
//!
//! Calls are resolved by name through each element's scope chain. Calls that look like
//! HTTP requests are classified instead of resolved, and can be linked to routes declared
//! in the analyzed code.

mod api_classifier;
mod call_graph;
mod endpoint_matcher;
mod focus;

pub use call_graph::CallGraph;
pub use endpoint_matcher::{collect_endpoints, match_endpoints, Endpoint};
pub use focus::focus;
