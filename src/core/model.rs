//! Unified, language-agnostic code element model
//!
//! Every language adapter output ends up as a tree of [`CodeElement`]s rooted at a module.
//! Trees are built once by the normalizer and treated as immutable afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a code element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Module,
    Class,
    Function,
    Method,
    Variable,
    Component,
}

impl ElementKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "module" => Some(Self::Module),
            "class" => Some(Self::Class),
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            "variable" => Some(Self::Variable),
            "component" => Some(Self::Component),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
            Self::Variable => "variable",
            Self::Component => "component",
        }
    }

    /// Functions, methods and components are the elements that make calls
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function | Self::Method | Self::Component)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function/method parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_hint: Option<String>,
    pub default_value: Option<String>,
    /// `*args` / `...rest`
    #[serde(default)]
    pub is_variadic: bool,
    /// `**kwargs`
    #[serde(default)]
    pub is_keyword: bool,
}

impl Parameter {
    /// Render as it would appear in a signature
    pub fn display(&self) -> String {
        let mut text = self.name.clone();
        if let Some(hint) = &self.type_hint {
            text.push_str(": ");
            text.push_str(hint);
        }
        if self.is_variadic {
            text.insert(0, '*');
        } else if self.is_keyword {
            text.insert_str(0, "**");
        }
        text
    }
}

/// A call found in an element body, not yet resolved to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallReference {
    /// Callee name (`method` in `obj.method()`)
    pub name: String,
    /// Receiver expression text (`obj` in `obj.method()`)
    pub target: Option<String>,
    /// Source text of each argument, truncated
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub line: usize,
}

impl CallReference {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            target: None,
            arguments: Vec::new(),
            line,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    /// `target.name` or just `name`
    pub fn callee_text(&self) -> String {
        match &self.target {
            Some(target) => format!("{}.{}", target, self.name),
            None => self.name.clone(),
        }
    }
}

/// An HTTP call made by an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCallReference {
    pub method: String,
    pub path: String,
    pub client: String,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub is_external: bool,
    pub matched_endpoint: Option<String>,
}

/// An import statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub module: String,
    #[serde(default)]
    pub names: Vec<String>,
    pub alias: Option<String>,
    #[serde(default)]
    pub is_from: bool,
    #[serde(default)]
    pub line: usize,
}

/// Normalized unit of code structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeElement {
    /// Stable id, unique within one tree
    pub id: String,
    pub kind: ElementKind,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub docstring: Option<String>,
    pub children: Vec<CodeElement>,
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

impl CodeElement {
    /// Pre-order traversal of this element and all descendants
    pub fn walk(&self) -> Vec<&CodeElement> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(element) = stack.pop() {
            out.push(element);
            for child in element.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Find an element by id anywhere in the tree
    pub fn find_by_id(&self, id: &str) -> Option<&CodeElement> {
        self.walk().into_iter().find(|e| e.id == id)
    }

    /// Resolve `name` or `Outer.inner` to the first matching element in pre-order
    pub fn find_by_path(&self, dotted: &str) -> Option<&CodeElement> {
        let parts: Vec<&str> = dotted.split('.').filter(|p| !p.is_empty()).collect();
        let (first, rest) = parts.split_first()?;

        let mut current = self
            .walk()
            .into_iter()
            .skip(1)
            .find(|e| e.name == *first)?;
        for part in rest {
            current = current.children.iter().find(|c| c.name == *part)?;
        }
        Some(current)
    }

    /// Qualified display name: the id without the module prefix and disambiguation suffixes
    pub fn qualified_name(&self) -> String {
        let mut segments: Vec<&str> = self.id.split("::").collect();
        if segments.len() > 1 {
            segments.remove(0);
        }
        segments
            .iter()
            .map(|s| s.split('#').next().unwrap_or(s))
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn element(id: &str, kind: ElementKind, name: &str, lines: (usize, usize)) -> CodeElement {
        CodeElement {
            id: id.to_string(),
            kind,
            name: name.to_string(),
            start_line: lines.0,
            end_line: lines.1,
            docstring: None,
            children: vec![],
            parameters: vec![],
            return_type: None,
            is_async: false,
            is_generator: false,
            decorators: vec![],
            base_classes: vec![],
            calls: vec![],
            api_calls: vec![],
            imports: vec![],
            exports: vec![],
        }
    }
}
