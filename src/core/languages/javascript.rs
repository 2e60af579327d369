use std::path::Path;
use tree_sitter::{Node, Parser};

use crate::error::{CanvasError, Result};
use crate::core::model::{CallReference, Import, Parameter};
use super::{call_argument, module_name, summarize_argument, LanguageParser, RawElement};

/// JavaScript/JSX parser using Tree-sitter.
/// The TypeScript dialect shares the walker; `.tsx` files go through the TSX grammar.
pub struct JavaScriptParser {
    parser: Parser,
    tsx_parser: Option<Parser>,
    language: &'static str,
    extensions: &'static [&'static str],
}

impl JavaScriptParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let javascript_language = tree_sitter_javascript::language();
        parser.set_language(&javascript_language)
            .map_err(|e| CanvasError::Config(format!("Failed to set JavaScript language: {}", e)))?;

        Ok(Self {
            parser,
            tsx_parser: None,
            language: "javascript",
            extensions: &["js", "jsx", "mjs", "cjs"],
        })
    }

    pub fn typescript() -> Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_typescript::language_typescript())
            .map_err(|e| CanvasError::Config(format!("Failed to set TypeScript language: {}", e)))?;

        let mut tsx_parser = Parser::new();
        tsx_parser.set_language(&tree_sitter_typescript::language_tsx())
            .map_err(|e| CanvasError::Config(format!("Failed to set TSX language: {}", e)))?;

        Ok(Self {
            parser,
            tsx_parser: Some(tsx_parser),
            language: "typescript",
            extensions: &["ts", "tsx", "mts", "cts"],
        })
    }
}

impl LanguageParser for JavaScriptParser {
    fn parse(&mut self, content: &str, file_path: &Path) -> Result<RawElement> {
        let is_tsx = file_path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("tsx"));
        let parser = match self.tsx_parser.as_mut() {
            Some(tsx_parser) if is_tsx => tsx_parser,
            _ => &mut self.parser,
        };
        let tree = parser.parse(content, None)
            .ok_or_else(|| CanvasError::Parse {
                path: file_path.to_path_buf(),
                reason: format!("tree-sitter could not parse {} source", self.language),
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
        module.docstring = self.extract_file_docs(root_node, content);

        let mut cursor = root_node.walk();
        for child in root_node.named_children(&mut cursor) {
            match child.kind() {
                "import_statement" => {
                    if let Some(import) = self.parse_import(child, content) {
                        module.imports.push(import);
                    }
                }
                "export_statement" => module.exports.extend(self.export_names(child, content)),
                "lexical_declaration" | "variable_declaration" => {
                    for variable in self.parse_plain_variables(child, content) {
                        module.push_child(variable);
                    }
                }
                _ => {}
            }
        }

        for definition in self.collect_definitions(root_node, content, true) {
            module.push_child(definition);
        }

        module.calls = self.find_calls(root_node, content);

        Ok(module)
    }

    fn file_extensions(&self) -> &[&str] {
        self.extensions
    }

    fn language_name(&self) -> &str {
        self.language
    }
}

impl JavaScriptParser {
    /// Leading `/** ... */` block separated from the first statement by a blank line
    fn extract_file_docs(&self, root: Node, source: &str) -> Option<String> {
        let first = root.named_child(0).filter(|n| n.kind() == "comment")?;
        let text = self.node_text(first, source);
        if !text.starts_with("/**") {
            return None;
        }

        let attached = first.next_named_sibling()
            .map_or(false, |next| next.start_position().row <= first.end_position().row + 1);
        if attached {
            return None;
        }
        clean_jsdoc(&text)
    }

    /// Walk `node` for element-producing declarations without descending into them
    fn collect_definitions(&self, node: Node, source: &str, top_level: bool) -> Vec<RawElement> {
        let mut definitions = Vec::new();
        let mut cursor = node.walk();

        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "function_declaration" | "generator_function_declaration" => {
                    definitions.push(self.parse_function(child, child, source, top_level));
                }
                "class_declaration" | "abstract_class_declaration" => {
                    definitions.push(self.parse_class(child, source))
                }
                "variable_declarator" => {
                    if let Some(value) = function_value(child) {
                        definitions.push(self.parse_function(child, value, source, top_level));
                    }
                }
                // Inline callbacks belong to their enclosing element
                "arrow_function" | "function_expression" | "function" | "generator_function"
                | "class" | "class_body" => {}
                _ => definitions.extend(self.collect_definitions(child, source, top_level)),
            }
        }

        definitions
    }

    /// Parse a function declaration or a declarator whose value is a function.
    /// `anchor` carries the name and range, `function` the parameters and body.
    fn parse_function(&self, anchor: Node, function: Node, source: &str, top_level: bool) -> RawElement {
        let name = anchor.child_by_field_name("name")
            .map(|n| self.node_text(n, source))
            .unwrap_or_default();

        let is_component = top_level && name.chars().next().map_or(false, char::is_uppercase);
        let kind = if is_component { "component" } else { "function" };

        let range = statement_for(anchor);
        let mut element = RawElement::new(kind, name)
            .with_lines(range.start_position().row + 1, range.end_position().row + 1);

        element.docstring = self.extract_jsdoc(range, source);
        element.is_async = has_token(function, "async");
        element.is_generator = matches!(function.kind(), "generator_function_declaration" | "generator_function")
            || has_token(function, "*");
        element.parameters = self.function_parameters(function, source);
        element.return_type = self.return_type(function, source);

        if let Some(body) = function.child_by_field_name("body") {
            element.calls = self.find_calls(body, source);
            for nested in self.collect_definitions(body, source, false) {
                element.push_child(nested);
            }
        }

        element
    }

    /// Parse a class declaration with its methods and fields
    fn parse_class(&self, node: Node, source: &str) -> RawElement {
        let name = node.child_by_field_name("name")
            .map(|n| self.node_text(n, source))
            .unwrap_or_default();

        let range = statement_for(node);
        let mut class = RawElement::new("class", name)
            .with_lines(range.start_position().row + 1, range.end_position().row + 1);
        class.docstring = self.extract_jsdoc(range, source);

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "class_heritage" {
                if let Some(base) = child.named_child(0) {
                    // TypeScript wraps the base in `extends_clause`
                    let base = if base.kind() == "extends_clause" {
                        base.child_by_field_name("value").unwrap_or(base)
                    } else {
                        base
                    };
                    class.base_classes.push(self.node_text(base, source));
                }
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.named_children(&mut cursor) {
                match member.kind() {
                    "method_definition" => class.push_child(self.parse_method(member, source)),
                    "field_definition" | "public_field_definition" => {
                        let property = member.child_by_field_name("property")
                            .or_else(|| member.child_by_field_name("name"));
                        if let Some(property) = property {
                            class.push_child(
                                RawElement::new("variable", self.node_text(property, source)).with_lines(
                                    member.start_position().row + 1,
                                    member.end_position().row + 1,
                                ),
                            );
                        }
                    }
                    _ => {}
                }
            }
        }

        class
    }

    fn parse_method(&self, node: Node, source: &str) -> RawElement {
        let name = node.child_by_field_name("name")
            .map(|n| self.node_text(n, source))
            .unwrap_or_default();

        let mut method = RawElement::new("method", name)
            .with_lines(node.start_position().row + 1, node.end_position().row + 1);
        method.docstring = self.extract_jsdoc(node, source);
        method.is_async = has_token(node, "async");
        method.is_generator = has_token(node, "*");
        if has_token(node, "static") {
            method.decorators.push("static".to_string());
        }
        method.parameters = self.function_parameters(node, source);
        method.return_type = self.return_type(node, source);

        if let Some(body) = node.child_by_field_name("body") {
            method.calls = self.find_calls(body, source);
            for nested in self.collect_definitions(body, source, false) {
                method.push_child(nested);
            }
        }

        method
    }

    /// Top-level `const X = <not a function>` declarations
    fn parse_plain_variables(&self, node: Node, source: &str) -> Vec<RawElement> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|d| d.kind() == "variable_declarator" && function_value(*d).is_none())
            .filter_map(|d| {
                let name = d.child_by_field_name("name").filter(|n| n.kind() == "identifier")?;
                Some(
                    RawElement::new("variable", self.node_text(name, source))
                        .with_lines(node.start_position().row + 1, node.end_position().row + 1),
                )
            })
            .collect()
    }

    fn function_parameters(&self, function: Node, source: &str) -> Vec<Parameter> {
        if let Some(single) = function.child_by_field_name("parameter") {
            return vec![parameter(self.node_text(single, source))];
        }

        let Some(params) = function.child_by_field_name("parameters") else {
            return Vec::new();
        };

        let mut parameters = Vec::new();
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            match child.kind() {
                "identifier" | "object_pattern" | "array_pattern" => {
                    parameters.push(parameter(summarize_argument(&self.node_text(child, source))));
                }
                "assignment_pattern" => {
                    let name = child.child_by_field_name("left")
                        .map(|n| summarize_argument(&self.node_text(n, source)))
                        .unwrap_or_default();
                    let mut p = parameter(name);
                    p.default_value = child.child_by_field_name("right")
                        .map(|n| summarize_argument(&self.node_text(n, source)));
                    parameters.push(p);
                }
                "required_parameter" | "optional_parameter" => {
                    parameters.push(self.typed_parameter(child, source));
                }
                "rest_pattern" => {
                    let name = child.named_child(0)
                        .map(|n| self.node_text(n, source))
                        .unwrap_or_default();
                    let mut p = parameter(name);
                    p.is_variadic = true;
                    parameters.push(p);
                }
                _ => {}
            }
        }

        parameters.retain(|p| !p.name.is_empty());
        parameters
    }

    /// TypeScript `name?: Type = default` parameter
    fn typed_parameter(&self, node: Node, source: &str) -> Parameter {
        let pattern = node.child_by_field_name("pattern");
        let mut p = match pattern.filter(|n| n.kind() == "rest_pattern") {
            Some(rest) => {
                let mut p = parameter(rest.named_child(0)
                    .map(|n| self.node_text(n, source))
                    .unwrap_or_default());
                p.is_variadic = true;
                p
            }
            None => parameter(pattern
                .map(|n| summarize_argument(&self.node_text(n, source)))
                .unwrap_or_default()),
        };
        p.type_hint = node.child_by_field_name("type").map(|t| type_text(&self.node_text(t, source)));
        p.default_value = node.child_by_field_name("value")
            .map(|n| summarize_argument(&self.node_text(n, source)));
        p
    }

    fn return_type(&self, function: Node, source: &str) -> Option<String> {
        function.child_by_field_name("return_type")
            .map(|t| type_text(&self.node_text(t, source)))
    }

    fn parse_import(&self, node: Node, source: &str) -> Option<Import> {
        let module = node.child_by_field_name("source")
            .map(|n| strip_quotes(&self.node_text(n, source)))?;

        let mut names = Vec::new();
        let mut alias = None;
        let mut cursor = node.walk();
        for clause in node.named_children(&mut cursor).filter(|n| n.kind() == "import_clause") {
            let mut clause_cursor = clause.walk();
            for part in clause.named_children(&mut clause_cursor) {
                match part.kind() {
                    "identifier" => names.push(self.node_text(part, source)),
                    "namespace_import" => {
                        alias = part.named_child(0).map(|n| self.node_text(n, source));
                    }
                    "named_imports" => {
                        let mut spec_cursor = part.walk();
                        for specifier in part.named_children(&mut spec_cursor) {
                            if let Some(name) = specifier.child_by_field_name("name") {
                                names.push(self.node_text(name, source));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        Some(Import {
            module,
            is_from: !names.is_empty(),
            names,
            alias,
            line: node.start_position().row + 1,
        })
    }

    fn export_names(&self, node: Node, source: &str) -> Vec<String> {
        if let Some(declaration) = node.child_by_field_name("declaration") {
            return match declaration.kind() {
                "lexical_declaration" | "variable_declaration" => {
                    let mut cursor = declaration.walk();
                    declaration.named_children(&mut cursor)
                        .filter_map(|d| d.child_by_field_name("name"))
                        .map(|n| self.node_text(n, source))
                        .collect()
                }
                _ => declaration.child_by_field_name("name")
                    .map(|n| vec![self.node_text(n, source)])
                    .unwrap_or_default(),
            };
        }

        let mut names = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "export_clause" => {
                    let mut spec_cursor = child.walk();
                    for specifier in child.named_children(&mut spec_cursor) {
                        let exported = specifier.child_by_field_name("alias")
                            .or_else(|| specifier.child_by_field_name("name"));
                        if let Some(name) = exported {
                            names.push(self.node_text(name, source));
                        }
                    }
                }
                "identifier" => names.push(self.node_text(child, source)),
                _ => {}
            }
        }
        if names.is_empty() && has_token(node, "default") {
            names.push("default".to_string());
        }
        names
    }

    /// Collect calls below `node`. Nested declarations own their calls; inline callbacks don't.
    fn find_calls(&self, node: Node, source: &str) -> Vec<CallReference> {
        let mut calls = Vec::new();
        self.walk_calls(node, source, false, &mut calls);
        calls.sort_by_key(|c| c.line);
        calls
    }

    fn walk_calls(&self, node: Node, source: &str, inside_callback: bool, calls: &mut Vec<CallReference>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let owns_calls = match child.kind() {
                "function_declaration" | "generator_function_declaration" | "class_declaration"
                | "abstract_class_declaration" => true,
                "variable_declarator" => function_value(child).is_some(),
                _ => false,
            };
            if owns_calls && !inside_callback {
                continue;
            }

            match child.kind() {
                "call_expression" => {
                    if let Some(call) = self.parse_call(child, source) {
                        calls.push(call);
                    }
                }
                "jsx_opening_element" | "jsx_self_closing_element" => {
                    if let Some(call) = self.jsx_component_usage(child, source) {
                        calls.push(call);
                    }
                }
                _ => {}
            }

            let callback = inside_callback
                || matches!(child.kind(), "arrow_function" | "function_expression" | "function");
            self.walk_calls(child, source, callback, calls);
        }
    }

    fn parse_call(&self, node: Node, source: &str) -> Option<CallReference> {
        let function = node.child_by_field_name("function")?;
        let line = node.start_position().row + 1;

        let call = match function.kind() {
            "identifier" => CallReference::new(self.node_text(function, source), line),
            "member_expression" => {
                let property = function.child_by_field_name("property")?;
                let object = function.child_by_field_name("object")?;
                CallReference::new(self.node_text(property, source), line)
                    .with_target(summarize_argument(&self.node_text(object, source)))
            }
            _ => return None,
        };

        let arguments = node.child_by_field_name("arguments")
            .map(|args| match args.kind() {
                "template_string" => vec![call_argument(&self.node_text(args, source))],
                _ => {
                    let mut cursor = args.walk();
                    args.named_children(&mut cursor)
                        .filter(|n| n.kind() != "comment")
                        .map(|n| call_argument(&self.node_text(n, source)))
                        .collect()
                }
            })
            .unwrap_or_default();

        Some(call.with_arguments(arguments))
    }

    /// `<UserList />` renders a component, which reads as a call to it
    fn jsx_component_usage(&self, node: Node, source: &str) -> Option<CallReference> {
        let name = node.child_by_field_name("name").filter(|n| n.kind() == "identifier")?;
        let text = self.node_text(name, source);
        if !text.chars().next().map_or(false, char::is_uppercase) {
            return None;
        }
        Some(CallReference::new(text, node.start_position().row + 1))
    }

    /// JSDoc block that ends on the line directly above `node`
    fn extract_jsdoc(&self, node: Node, source: &str) -> Option<String> {
        let comment = node.prev_named_sibling().filter(|n| n.kind() == "comment")?;
        if comment.end_position().row + 1 != node.start_position().row {
            return None;
        }
        let text = self.node_text(comment, source);
        if text.starts_with("/**") {
            clean_jsdoc(&text)
        } else {
            None
        }
    }

    /// Extract text content of a node
    fn node_text(&self, node: Node, source: &str) -> String {
        source[node.byte_range()].to_string()
    }
}

fn parameter(name: String) -> Parameter {
    Parameter {
        name,
        type_hint: None,
        default_value: None,
        is_variadic: false,
        is_keyword: false,
    }
}

/// The function node a declarator is initialized with, if any
fn function_value(declarator: Node) -> Option<Node> {
    declarator.child_by_field_name("value").filter(|v| {
        matches!(v.kind(), "arrow_function" | "function_expression" | "function" | "generator_function")
    })
}

/// The statement a declaration lives in, so ranges and JSDoc include `export`/`const`
fn statement_for(node: Node) -> Node {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if matches!(parent.kind(), "lexical_declaration" | "variable_declaration" | "export_statement") {
            current = parent;
        } else {
            break;
        }
    }
    current
}

fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| !c.is_named() && c.kind() == token);
    found
}

fn clean_jsdoc(text: &str) -> Option<String> {
    let lines: Vec<String> = text
        .trim_start_matches("/**")
        .trim_end_matches("*/")
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim().to_string())
        .filter(|l| !l.is_empty() && !l.starts_with('@'))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// `: Promise<User>` → `Promise<User>`
fn type_text(annotation: &str) -> String {
    summarize_argument(annotation.trim_start_matches(':').trim())
}

fn strip_quotes(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> RawElement {
        let mut parser = JavaScriptParser::new().unwrap();
        parser.parse(source, Path::new("users.jsx")).unwrap()
    }

    fn children(element: &RawElement) -> &[RawElement] {
        element.children.as_deref().unwrap_or(&[])
    }

    fn child<'a>(element: &'a RawElement, name: &str) -> &'a RawElement {
        children(element)
            .iter()
            .find(|c| c.name.as_deref() == Some(name))
            .unwrap()
    }

    #[test]
    fn test_functions_arrows_and_components() {
        let module = parse(
            r#"import React from 'react';
import { useState } from 'react';

/**
 * Load all users.
 */
export async function loadUsers(page = 1, ...filters) {
  const res = await fetch(`/api/users?page=${page}`);
  return res.json();
}

const format = (user) => user.name.trim();

export const UserList = ({ users }) => {
  return <ul>{users.map((u) => <UserRow key={u.id} user={u} />)}</ul>;
};
"#,
        );

        assert_eq!(module.imports.len(), 2);
        assert_eq!(module.imports[1].names, vec!["useState".to_string()]);
        assert!(module.exports.contains(&"loadUsers".to_string()));
        assert!(module.exports.contains(&"UserList".to_string()));

        let load = child(&module, "loadUsers");
        assert_eq!(load.kind.as_deref(), Some("function"));
        assert!(load.is_async);
        assert_eq!(load.docstring.as_deref(), Some("Load all users."));
        assert_eq!(load.start_line, Some(7));
        assert_eq!(load.parameters[0].default_value.as_deref(), Some("1"));
        assert!(load.parameters[1].is_variadic);

        let fetch = load.calls.iter().find(|c| c.name == "fetch").unwrap();
        assert_eq!(fetch.arguments[0], "`/api/users?page=${page}`");

        let format = child(&module, "format");
        assert_eq!(format.parameters[0].name, "user");

        let list = child(&module, "UserList");
        assert_eq!(list.kind.as_deref(), Some("component"));
        let names: Vec<&str> = list.calls.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"map"));
        assert!(names.contains(&"UserRow"));
    }

    #[test]
    fn test_class_with_methods() {
        let module = parse(
            r#"
class ApiClient extends BaseClient {
  baseUrl = '/api';

  async getOrders() {
    return this.http.get('/orders');
  }

  static create() {
    return new ApiClient();
  }
}
"#,
        );

        let class = child(&module, "ApiClient");
        assert_eq!(class.kind.as_deref(), Some("class"));
        assert_eq!(class.base_classes, vec!["BaseClient".to_string()]);

        let kinds: Vec<&str> = children(class).iter().filter_map(|m| m.kind.as_deref()).collect();
        assert_eq!(kinds, vec!["variable", "method", "method"]);

        let get_orders = child(class, "getOrders");
        assert!(get_orders.is_async);
        assert_eq!(get_orders.calls[0].callee_text(), "this.http.get");
        assert_eq!(child(class, "create").decorators, vec!["static".to_string()]);
    }

    #[test]
    fn test_callback_calls_belong_to_enclosing_function() {
        let module = parse(
            r#"
function Dashboard() {
  const { data } = useQuery({ queryKey: ['stats'], queryFn: () => api.get('/stats') });
  function helper() {
    return compute();
  }
  return helper(data);
}
"#,
        );

        let dashboard = child(&module, "Dashboard");
        let names: Vec<&str> = dashboard.calls.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"useQuery"));
        assert!(names.contains(&"get"));
        assert!(names.contains(&"helper"));
        assert!(!names.contains(&"compute"));

        let helper = child(dashboard, "helper");
        assert_eq!(helper.kind.as_deref(), Some("function"));
        assert_eq!(helper.calls[0].name, "compute");
    }

    #[test]
    fn test_typescript_dialect() {
        let mut parser = JavaScriptParser::typescript().unwrap();
        assert_eq!(parser.language_name(), "typescript");

        let module = parser
            .parse(
                r#"import axios from 'axios';

interface Order {
  id: string;
}

export class OrderService extends BaseService {
  private baseUrl: string = '/api';

  async getOrder(id: string, expand?: boolean): Promise<Order> {
    return axios.get(`/api/orders/${id}`);
  }
}

export async function createOrder(order: Order, ...tags: string[]): Promise<void> {
  await fetch('/api/orders', { method: 'POST' });
}
"#,
                Path::new("orders.ts"),
            )
            .unwrap();

        let service = child(&module, "OrderService");
        assert_eq!(service.base_classes, vec!["BaseService".to_string()]);
        let kinds: Vec<&str> = children(service).iter().filter_map(|m| m.kind.as_deref()).collect();
        assert_eq!(kinds, vec!["variable", "method"]);

        let get_order = child(service, "getOrder");
        assert_eq!(get_order.parameters[0].name, "id");
        assert_eq!(get_order.parameters[0].type_hint.as_deref(), Some("string"));
        assert_eq!(get_order.parameters[1].name, "expand");
        assert_eq!(get_order.return_type.as_deref(), Some("Promise<Order>"));
        assert_eq!(get_order.calls[0].callee_text(), "axios.get");

        let create = child(&module, "createOrder");
        assert!(create.is_async);
        assert!(create.parameters[1].is_variadic);
        assert_eq!(create.parameters[1].name, "tags");
        assert!(create.calls.iter().any(|c| c.name == "fetch"));
    }

    #[test]
    fn test_tsx_components() {
        let mut parser = JavaScriptParser::typescript().unwrap();
        let module = parser
            .parse(
                r#"type Props = { userId: string };

export const UserCard = ({ userId }: Props) => {
  const { data } = useQuery({ queryKey: ['user', userId], queryFn: () => api.get(`/users/${userId}`) });
  return <Avatar user={data} />;
};
"#,
                Path::new("UserCard.tsx"),
            )
            .unwrap();

        let card = child(&module, "UserCard");
        assert_eq!(card.kind.as_deref(), Some("component"));
        let names: Vec<&str> = card.calls.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"useQuery"));
        assert!(names.contains(&"Avatar"));
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let mut parser = JavaScriptParser::new().unwrap();
        let err = parser.parse("function (", Path::new("bad.js")).unwrap_err();
        assert!(matches!(err, CanvasError::Parse { .. }));
    }
}
