use std::path::Path;
use tree_sitter::{Node, Parser};

use crate::error::{CanvasError, Result};
use crate::core::model::{CallReference, Import, Parameter};
use super::{call_argument, module_name, summarize_argument, LanguageParser, RawElement};

/// Python-specific parser using Tree-sitter
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let python_language = tree_sitter_python::language();
        parser.set_language(&python_language)
            .map_err(|e| CanvasError::Config(format!("Failed to set Python language: {}", e)))?;

        Ok(Self { parser })
    }
}

impl LanguageParser for PythonParser {
    fn parse(&mut self, content: &str, file_path: &Path) -> Result<RawElement> {
        let tree = self.parser.parse(content, None)
            .ok_or_else(|| CanvasError::Parse {
                path: file_path.to_path_buf(),
                reason: "tree-sitter could not parse Python source".to_string(),
            })?;

        let root_node = tree.root_node();
        if root_node.has_error() {
            return Err(CanvasError::Parse {
                path: file_path.to_path_buf(),
                reason: format!("syntax error near line {}", first_error_line(root_node)),
            });
        }

        let mut module = RawElement::new("module", module_name(file_path));
        module.start_line = Some(1);
        module.end_line = Some(content.lines().count().max(1));
        module.docstring = self.extract_docstring(root_node, content);

        let mut cursor = root_node.walk();
        for child in root_node.named_children(&mut cursor) {
            match child.kind() {
                "import_statement" => module.imports.extend(self.parse_import(child, content)),
                "import_from_statement" => module.imports.push(self.parse_import_from(child, content)),
                "expression_statement" => {
                    if let Some(variable) = self.parse_assignment(child, content) {
                        module.push_child(variable);
                    }
                }
                _ => {}
            }
        }

        // Definitions can hide inside `if __name__ == "__main__":` and similar blocks
        for definition in self.collect_definitions(root_node, content, false)? {
            module.push_child(definition);
        }

        // Module-level statements can call things too
        module.calls = self.find_calls(root_node, content, true);

        Ok(module)
    }

    fn file_extensions(&self) -> &[&str] {
        &["py", "pyw", "pyi"]
    }

    fn language_name(&self) -> &str {
        "python"
    }
}

impl PythonParser {
    /// Find function/class definitions below `node` without descending into them
    fn collect_definitions(&self, node: Node, source: &str, in_class: bool) -> Result<Vec<RawElement>> {
        let mut definitions = Vec::new();
        let mut cursor = node.walk();

        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "function_definition" => {
                    definitions.push(self.parse_function(child, source, in_class, Vec::new())?);
                }
                "class_definition" => {
                    definitions.push(self.parse_class(child, source, Vec::new())?);
                }
                "decorated_definition" => {
                    let decorators = self.decorators(child, source);
                    if let Some(definition) = child.child_by_field_name("definition") {
                        match definition.kind() {
                            "function_definition" => definitions.push(
                                self.parse_function(definition, source, in_class, decorators)?,
                            ),
                            "class_definition" => {
                                definitions.push(self.parse_class(definition, source, decorators)?)
                            }
                            _ => {}
                        }
                    }
                }
                "lambda" => {}
                _ => definitions.extend(self.collect_definitions(child, source, in_class)?),
            }
        }

        Ok(definitions)
    }

    /// Parse a Python function definition
    fn parse_function(
        &self,
        node: Node,
        source: &str,
        is_method: bool,
        decorators: Vec<String>,
    ) -> Result<RawElement> {
        let name = node.child_by_field_name("name")
            .map(|n| self.node_text(n, source))
            .unwrap_or_default();

        let kind = if is_method { "method" } else { "function" };
        let mut function = RawElement::new(kind, name)
            .with_lines(node.start_position().row + 1, node.end_position().row + 1);

        function.decorators = decorators;
        function.is_async = node.child(0).map_or(false, |c| c.kind() == "async");
        function.return_type = node.child_by_field_name("return_type")
            .map(|n| self.node_text(n, source));
        function.parameters = node.child_by_field_name("parameters")
            .map(|p| self.parse_parameters(p, source))
            .unwrap_or_default();

        if let Some(body) = node.child_by_field_name("body") {
            function.docstring = self.extract_docstring(body, source);
            function.calls = self.find_calls(body, source, true);
            function.is_generator = contains_kind(body, "yield");

            for nested in self.collect_definitions(body, source, false)? {
                function.push_child(nested);
            }
        }

        Ok(function)
    }

    /// Parse a Python class definition
    fn parse_class(&self, node: Node, source: &str, decorators: Vec<String>) -> Result<RawElement> {
        let name = node.child_by_field_name("name")
            .map(|n| self.node_text(n, source))
            .unwrap_or_default();

        let mut class = RawElement::new("class", name)
            .with_lines(node.start_position().row + 1, node.end_position().row + 1);
        class.decorators = decorators;

        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            class.base_classes = superclasses.named_children(&mut cursor)
                .filter(|n| n.kind() != "keyword_argument" && n.kind() != "comment")
                .map(|n| self.node_text(n, source))
                .collect();
        }

        if let Some(body) = node.child_by_field_name("body") {
            class.docstring = self.extract_docstring(body, source);

            let mut cursor = body.walk();
            for child in body.named_children(&mut cursor) {
                if child.kind() == "expression_statement" {
                    if let Some(attribute) = self.parse_assignment(child, source) {
                        class.push_child(attribute);
                    }
                }
            }

            for member in self.collect_definitions(body, source, true)? {
                class.push_child(member);
            }
        }

        Ok(class)
    }

    /// `NAME = value` at module or class level becomes a variable element
    fn parse_assignment(&self, statement: Node, source: &str) -> Option<RawElement> {
        let assignment = statement.named_child(0).filter(|n| n.kind() == "assignment")?;
        let left = assignment.child_by_field_name("left").filter(|n| n.kind() == "identifier")?;
        let line = statement.start_position().row + 1;

        let mut variable = RawElement::new("variable", self.node_text(left, source))
            .with_lines(line, statement.end_position().row + 1);
        variable.return_type = assignment.child_by_field_name("type")
            .map(|n| self.node_text(n, source));
        Some(variable)
    }

    fn parse_parameters(&self, node: Node, source: &str) -> Vec<Parameter> {
        let mut parameters = Vec::new();
        let mut cursor = node.walk();

        for child in node.named_children(&mut cursor) {
            let parameter = match child.kind() {
                "identifier" => Some(self.parameter(self.node_text(child, source))),
                "typed_parameter" => {
                    let inner = child.named_child(0);
                    let mut parameter = match inner.map(|n| n.kind()) {
                        Some("list_splat_pattern") => {
                            let mut p = self.parameter(self.splat_name(inner, source));
                            p.is_variadic = true;
                            p
                        }
                        Some("dictionary_splat_pattern") => {
                            let mut p = self.parameter(self.splat_name(inner, source));
                            p.is_keyword = true;
                            p
                        }
                        _ => self.parameter(inner.map(|n| self.node_text(n, source)).unwrap_or_default()),
                    };
                    parameter.type_hint = child.child_by_field_name("type")
                        .map(|n| self.node_text(n, source));
                    Some(parameter)
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = child.child_by_field_name("name")
                        .map(|n| self.node_text(n, source))
                        .unwrap_or_default();
                    let mut parameter = self.parameter(name);
                    parameter.type_hint = child.child_by_field_name("type")
                        .map(|n| self.node_text(n, source));
                    parameter.default_value = child.child_by_field_name("value")
                        .map(|n| summarize_argument(&self.node_text(n, source)));
                    Some(parameter)
                }
                "list_splat_pattern" => {
                    let mut parameter = self.parameter(self.splat_name(Some(child), source));
                    parameter.is_variadic = true;
                    Some(parameter)
                }
                "dictionary_splat_pattern" => {
                    let mut parameter = self.parameter(self.splat_name(Some(child), source));
                    parameter.is_keyword = true;
                    Some(parameter)
                }
                _ => None,
            };

            if let Some(parameter) = parameter.filter(|p| !p.name.is_empty()) {
                parameters.push(parameter);
            }
        }

        parameters
    }

    fn parameter(&self, name: String) -> Parameter {
        Parameter {
            name,
            type_hint: None,
            default_value: None,
            is_variadic: false,
            is_keyword: false,
        }
    }

    fn splat_name(&self, node: Option<Node>, source: &str) -> String {
        node.and_then(|n| n.named_child(0))
            .map(|n| self.node_text(n, source))
            .unwrap_or_default()
    }

    fn decorators(&self, node: Node, source: &str) -> Vec<String> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|n| n.kind() == "decorator")
            .map(|n| self.node_text(n, source).trim_start_matches('@').trim().to_string())
            .collect()
    }

    fn parse_import(&self, node: Node, source: &str) -> Vec<Import> {
        let mut imports = Vec::new();
        let mut cursor = node.walk();

        for child in node.named_children(&mut cursor) {
            let (module, alias) = match child.kind() {
                "dotted_name" => (self.node_text(child, source), None),
                "aliased_import" => (
                    child.child_by_field_name("name").map(|n| self.node_text(n, source)).unwrap_or_default(),
                    child.child_by_field_name("alias").map(|n| self.node_text(n, source)),
                ),
                _ => continue,
            };
            imports.push(Import {
                module,
                names: Vec::new(),
                alias,
                is_from: false,
                line: node.start_position().row + 1,
            });
        }

        imports
    }

    fn parse_import_from(&self, node: Node, source: &str) -> Import {
        let module = node.child_by_field_name("module_name")
            .map(|n| self.node_text(n, source))
            .unwrap_or_default();

        let mut cursor = node.walk();
        let names = node.children_by_field_name("name", &mut cursor)
            .map(|n| match n.kind() {
                "aliased_import" => n.child_by_field_name("name")
                    .map(|inner| self.node_text(inner, source))
                    .unwrap_or_default(),
                _ => self.node_text(n, source),
            })
            .collect();

        Import {
            module,
            names,
            alias: None,
            is_from: true,
            line: node.start_position().row + 1,
        }
    }

    /// Collect calls below `node`, skipping nested definitions (they own their calls)
    fn find_calls(&self, node: Node, source: &str, skip_definitions: bool) -> Vec<CallReference> {
        let mut calls = Vec::new();
        self.walk_calls(node, source, skip_definitions, &mut calls);
        calls.sort_by_key(|c| c.line);
        calls
    }

    fn walk_calls(&self, node: Node, source: &str, skip_definitions: bool, calls: &mut Vec<CallReference>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if skip_definitions
                && matches!(child.kind(), "function_definition" | "class_definition" | "decorated_definition")
            {
                continue;
            }

            if child.kind() == "call" {
                if let Some(call) = self.parse_call(child, source) {
                    calls.push(call);
                }
            }

            self.walk_calls(child, source, skip_definitions, calls);
        }
    }

    fn parse_call(&self, node: Node, source: &str) -> Option<CallReference> {
        let function = node.child_by_field_name("function")?;
        let line = node.start_position().row + 1;

        let call = match function.kind() {
            "identifier" => CallReference::new(self.node_text(function, source), line),
            "attribute" => {
                let name = function.child_by_field_name("attribute")?;
                let object = function.child_by_field_name("object")?;
                CallReference::new(self.node_text(name, source), line)
                    .with_target(summarize_argument(&self.node_text(object, source)))
            }
            _ => return None,
        };

        let arguments = node.child_by_field_name("arguments")
            .map(|args| {
                let mut cursor = args.walk();
                args.named_children(&mut cursor)
                    .filter(|n| n.kind() != "comment")
                    .map(|n| call_argument(&self.node_text(n, source)))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Some(call.with_arguments(arguments))
    }

    /// First statement of a block, when it is a string literal
    fn extract_docstring(&self, body: Node, source: &str) -> Option<String> {
        let first = body.named_child(0).filter(|n| n.kind() == "expression_statement")?;
        let string = first.named_child(0).filter(|n| n.kind() == "string")?;
        let cleaned = strip_string_quotes(&self.node_text(string, source));
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    /// Extract text content of a node
    fn node_text(&self, node: Node, source: &str) -> String {
        source[node.byte_range()].to_string()
    }
}

fn strip_string_quotes(literal: &str) -> String {
    let without_prefix = literal.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = without_prefix.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner.trim().to_string();
        }
    }
    without_prefix.trim().to_string()
}

fn contains_kind(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    children.into_iter().any(|child| {
        if matches!(child.kind(), "function_definition" | "class_definition" | "lambda") {
            return false;
        }
        child.kind() == kind || contains_kind(child, kind)
    })
}

fn first_error_line(node: Node) -> usize {
    if node.is_error() || node.is_missing() {
        return node.start_position().row + 1;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .find(|c| c.has_error())
        .map(first_error_line)
        .unwrap_or(node.start_position().row + 1)
}
