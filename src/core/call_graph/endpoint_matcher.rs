use std::sync::OnceLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::model::CodeElement;
use super::CallGraph;

/// Prefixes commonly added in front of routes by proxies and routers
const API_PREFIXES: &[&str] = &["api/v1/", "api/v2/", "api/"];

/// A server route declared by a decorator such as `@app.get("/users/{id}")`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
    pub element_id: String,
}

impl Endpoint {
    /// Label stored on matched API calls
    pub fn describe(&self) -> String {
        format!("{} {} ({})", self.method, self.path, self.element_id)
    }

    /// Whether a request with `method` and `path` would hit this route
    pub fn matches(&self, method: &str, path: &str) -> bool {
        if !self.method.eq_ignore_ascii_case(method) {
            return false;
        }

        let endpoint = trim_path(&self.path);
        let request = trim_path(path);
        if segments_match(endpoint, request) {
            return true;
        }

        API_PREFIXES.iter().any(|prefix| match request.strip_prefix(prefix) {
            Some(stripped) => {
                let endpoint = endpoint.strip_prefix(prefix).unwrap_or(endpoint);
                segments_match(endpoint, stripped)
            }
            None => false,
        })
    }
}

/// Routes declared anywhere in the tree
pub fn collect_endpoints(root: &CodeElement) -> Vec<Endpoint> {
    let mut endpoints = Vec::new();

    for element in root.walk() {
        for decorator in &element.decorators {
            if let Some(captures) = route_pattern().captures(decorator) {
                endpoints.push(Endpoint {
                    method: captures[2].to_ascii_uppercase(),
                    path: captures[3].to_string(),
                    element_id: element.id.clone(),
                });
            }
        }
    }

    endpoints
}

/// Annotate API calls in `graph` that hit one of `endpoints`. Returns the number matched.
pub fn match_endpoints(graph: &mut CallGraph, endpoints: &[Endpoint]) -> usize {
    if endpoints.is_empty() {
        return 0;
    }

    let mut matched = 0;
    for calls in graph.api_calls.values_mut() {
        for call in calls.iter_mut().filter(|c| !c.is_external) {
            if let Some(endpoint) = endpoints.iter().find(|e| e.matches(&call.method, &call.path)) {
                debug!("{} {} handled by {}", call.method, call.path, endpoint.element_id);
                call.matched_endpoint = Some(endpoint.describe());
                matched += 1;
            }
        }
    }
    matched
}

fn route_pattern() -> &'static Regex {
    static ROUTE: OnceLock<Regex> = OnceLock::new();
    ROUTE.get_or_init(|| {
        Regex::new(r#"^(app|router|api|bp)\.(get|post|put|patch|delete|head|options)\(\s*[rf]?["']([^"']*)["']"#)
            .expect("valid route regex")
    })
}

/// Strip the query string and surrounding slashes
fn trim_path(path: &str) -> &str {
    path.split('?').next().unwrap_or(path).trim_matches('/')
}

/// Segment-wise comparison where `{placeholder}` matches any single segment
fn segments_match(endpoint: &str, request: &str) -> bool {
    let endpoint: Vec<&str> = endpoint.split('/').collect();
    let request: Vec<&str> = request.split('/').collect();

    endpoint.len() == request.len()
        && endpoint.iter().zip(&request).all(|(e, r)| {
            (is_placeholder(e) && !r.is_empty()) || (is_placeholder(r) && !e.is_empty()) || e == r
        })
}

fn is_placeholder(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::fixtures::element;
    use crate::core::model::{ApiCallReference, ElementKind};

    fn endpoint(method: &str, path: &str) -> Endpoint {
        Endpoint {
            method: method.to_string(),
            path: path.to_string(),
            element_id: "api::get_user".to_string(),
        }
    }

    #[test]
    fn test_collects_route_decorators() {
        let mut root = element("api", ElementKind::Module, "api", (1, 20));
        let mut handler = element("api::get_user", ElementKind::Function, "get_user", (3, 5));
        handler.decorators = vec!["router.get(\"/users/{user_id}\", response_model=User)".to_string()];
        root.children.push(handler);
        let mut other = element("api::helper", ElementKind::Function, "helper", (7, 8));
        other.decorators = vec!["lru_cache(maxsize=None)".to_string()];
        root.children.push(other);

        let endpoints = collect_endpoints(&root);
        assert_eq!(endpoints, vec![endpoint("GET", "/users/{user_id}")]);
    }

    #[test]
    fn test_placeholders_match_any_segment() {
        let route = endpoint("GET", "/users/{user_id}");
        assert!(route.matches("GET", "/users/{id}"));
        assert!(route.matches("get", "/users/42?expand=true"));
        assert!(!route.matches("POST", "/users/42"));
        assert!(!route.matches("GET", "/users/42/orders"));
    }

    #[test]
    fn test_api_prefixes_are_ignored() {
        let route = endpoint("GET", "/users/{user_id}");
        assert!(route.matches("GET", "/api/users/7"));
        assert!(route.matches("GET", "/api/v1/users/7"));

        let prefixed = endpoint("POST", "/api/v2/orders");
        assert!(prefixed.matches("POST", "/api/v2/orders"));
    }

    #[test]
    fn test_match_endpoints_annotates_calls() {
        let mut graph = CallGraph::default();
        graph.api_calls.insert(
            "ui::load".to_string(),
            vec![ApiCallReference {
                method: "GET".to_string(),
                path: "/api/users/{id}".to_string(),
                client: "fetch".to_string(),
                line: 3,
                is_external: false,
                matched_endpoint: None,
            }],
        );

        let matched = match_endpoints(&mut graph, &[endpoint("GET", "/users/{user_id}")]);
        assert_eq!(matched, 1);
        assert_eq!(
            graph.api_calls_for("ui::load")[0].matched_endpoint.as_deref(),
            Some("GET /users/{user_id} (api::get_user)")
        );
    }
}
