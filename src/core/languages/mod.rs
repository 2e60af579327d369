//! Language-specific parsers for different programming languages
//!
//! Each language gets its own module with a consistent interface: source text in,
//! [`RawElement`] tree out. The normalizer turns that tree into the unified model, so
//! nothing downstream ever sees a grammar-specific node type.

mod python;
mod javascript;

pub use python::PythonParser;
pub use javascript::JavaScriptParser;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use super::model::{ApiCallReference, CallReference, Import, Parameter};

/// Adapter output before normalization. Everything except `kind` and `name` may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawElement {
    pub kind: Option<String>,
    pub name: Option<String>,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub docstring: Option<String>,
    pub children: Option<Vec<RawElement>>,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub is_async: bool,
    pub is_generator: bool,
    pub decorators: Vec<String>,
    pub base_classes: Vec<String>,
    pub calls: Vec<CallReference>,
    pub api_calls: Vec<ApiCallReference>,
    pub imports: Vec<Import>,
    pub exports: Vec<String>,
}

impl RawElement {
    pub fn new(kind: &str, name: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.to_string()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_lines(mut self, start: usize, end: usize) -> Self {
        self.start_line = Some(start);
        self.end_line = Some(end);
        self
    }

    pub fn push_child(&mut self, child: RawElement) {
        self.children.get_or_insert_with(Vec::new).push(child);
    }
}

/// Trait that all language parsers must implement
pub trait LanguageParser: Send {
    /// Parse source code into a raw element tree rooted at a module
    fn parse(&mut self, content: &str, file_path: &Path) -> Result<RawElement>;

    /// Get the file extensions this parser handles
    fn file_extensions(&self) -> &[&str];

    /// Get the language name
    fn language_name(&self) -> &str;
}

/// Pure extension → language mapping used to pick an adapter
pub fn language_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "py" | "pyw" | "pyi" => Some("python"),
        "js" | "jsx" | "mjs" | "cjs" => Some("javascript"),
        "ts" | "tsx" | "mts" | "cts" => Some("typescript"),
        _ => None,
    }
}

/// Module name for a file: its stem, or `module` when there is none
pub(crate) fn module_name(file_path: &Path) -> String {
    file_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "module".to_string())
}

/// Maximum characters kept per argument summary
pub(crate) const ARGUMENT_SUMMARY_LIMIT: usize = 240;

/// Call argument text with whitespace collapsed. Kept whole so hook arguments stay parseable.
pub(crate) fn call_argument(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn summarize_argument(text: &str) -> String {
    let collapsed = call_argument(text);
    if collapsed.chars().count() <= ARGUMENT_SUMMARY_LIMIT {
        collapsed
    } else {
        let mut truncated: String = collapsed.chars().take(ARGUMENT_SUMMARY_LIMIT).collect();
        truncated.push('…');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_for_extension() {
        assert_eq!(language_for_extension("py"), Some("python"));
        assert_eq!(language_for_extension("JSX"), Some("javascript"));
        assert_eq!(language_for_extension("tsx"), Some("typescript"));
        assert_eq!(language_for_extension("rs"), None);
    }

    #[test]
    fn test_adapters_agree_with_extension_map() {
        let adapters: Vec<Box<dyn LanguageParser>> = vec![
            Box::new(PythonParser::new().unwrap()),
            Box::new(JavaScriptParser::new().unwrap()),
            Box::new(JavaScriptParser::typescript().unwrap()),
        ];
        for adapter in &adapters {
            for extension in adapter.file_extensions() {
                assert_eq!(language_for_extension(extension), Some(adapter.language_name()));
            }
        }
    }

    #[test]
    fn test_raw_element_accepts_sparse_json() {
        let raw: RawElement = serde_json::from_str(
            r#"{"kind": "module", "name": "app", "children": [{"kind": "function", "name": "main", "start_line": 3}]}"#,
        )
        .unwrap();

        assert_eq!(raw.kind.as_deref(), Some("module"));
        let children = raw.children.unwrap();
        assert_eq!(children[0].start_line, Some(3));
        assert!(children[0].end_line.is_none());
        assert!(children[0].calls.is_empty());
    }

    #[test]
    fn test_summarize_argument_collapses_whitespace() {
        assert_eq!(summarize_argument("{\n  method: 'POST'\n}"), "{ method: 'POST' }");
    }
}
