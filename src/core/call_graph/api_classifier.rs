//! Ordered heuristics that recognize HTTP calls
//!
//! Each rule looks at one [`CallReference`] and either claims it as an API call or passes.
//! Rules are tried in [`RULES`] order and the first match wins.

use std::sync::OnceLock;
use regex::Regex;

use crate::core::model::{ApiCallReference, CallReference};

/// A named classification rule
pub struct ApiRule {
    pub name: &'static str,
    pub apply: fn(&CallReference) -> Option<ApiCallReference>,
}

/// Classification rules in priority order
pub const RULES: &[ApiRule] = &[
    ApiRule { name: "fetch_primitive", apply: fetch_primitive },
    ApiRule { name: "client_verb", apply: client_verb },
    ApiRule { name: "query_hook", apply: query_hook },
    ApiRule { name: "path_argument", apply: path_argument },
];

const FETCH_PRIMITIVES: &[&str] = &["fetch", "$fetch", "ofetch", "ky", "got", "request"];

const HTTP_VERBS: &[&str] = &["get", "post", "put", "patch", "delete", "head", "options"];

const KNOWN_CLIENTS: &[&str] = &[
    "axios", "http", "httpClient", "requests", "httpx", "session", "ky", "got", "superagent", "$http",
];

const QUERY_HOOKS: &[&str] = &[
    "useQuery", "useInfiniteQuery", "useMutation", "useSWR", "useSWRMutation", "createQuery", "createMutation",
];

/// Run the rules against a call
pub fn classify(call: &CallReference) -> Option<ApiCallReference> {
    RULES.iter().find_map(|rule| (rule.apply)(call))
}

/// `fetch("/api/users", { method: "POST" })`
fn fetch_primitive(call: &CallReference) -> Option<ApiCallReference> {
    if call.target.is_some() || !FETCH_PRIMITIVES.contains(&call.name.as_str()) {
        return None;
    }
    let path = string_literal(call.arguments.first()?)?;
    let method = call.arguments.get(1)
        .and_then(|options| method_option(options))
        .unwrap_or_else(|| "GET".to_string());

    Some(api_call(method, path, call.name.clone(), call.line))
}

/// `axios.get("/users")`, `this.apiClient.post("/orders", body)`
fn client_verb(call: &CallReference) -> Option<ApiCallReference> {
    let receiver = call.target.as_deref()?;
    let verb = call.name.to_ascii_lowercase();
    if !HTTP_VERBS.contains(&verb.as_str()) {
        return None;
    }

    let last_segment = receiver.rsplit('.').next().unwrap_or(receiver);
    if !KNOWN_CLIENTS.contains(&last_segment) && !client_name_pattern().is_match(last_segment) {
        return None;
    }

    let path = string_literal(call.arguments.first()?)?;
    Some(api_call(verb.to_ascii_uppercase(), path, receiver.to_string(), call.line))
}

/// `useQuery({ queryFn: () => api.get("/stats") })` is the inner call, reported at the hook
fn query_hook(call: &CallReference) -> Option<ApiCallReference> {
    if call.target.is_some() || !QUERY_HOOKS.contains(&call.name.as_str()) {
        return None;
    }

    call.arguments.iter().find_map(|argument| {
        let captures = hook_field_pattern().captures(argument)?;
        let start = captures.get(0)?.end();
        let inner = parse_call_text(&argument[start..], call.line)?;
        fetch_primitive(&inner).or_else(|| client_verb(&inner))
    })
}

/// Any call whose first argument looks like a URL path
fn path_argument(call: &CallReference) -> Option<ApiCallReference> {
    let path = string_literal(call.arguments.first()?)?;
    if !path_pattern().is_match(&path) {
        return None;
    }

    let method = method_from_name(&call.name);
    Some(api_call(method.to_string(), path, call.callee_text(), call.line))
}

fn api_call(method: String, path: String, client: String, line: usize) -> ApiCallReference {
    let is_external = path.starts_with("http://") || path.starts_with("https://");
    ApiCallReference {
        method,
        path,
        client,
        line,
        is_external,
        matched_endpoint: None,
    }
}

/// Method implied by a verb at the start of any word in the callee name
fn method_from_name(name: &str) -> &'static str {
    const VERBS: &[(&str, &str)] = &[
        ("create", "POST"),
        ("update", "PUT"),
        ("delete", "DELETE"),
        ("remove", "DELETE"),
        ("patch", "PATCH"),
    ];

    name_words(name)
        .iter()
        .find_map(|word| VERBS.iter().find(|(verb, _)| word.starts_with(verb)).map(|(_, method)| *method))
        .unwrap_or("GET")
}

/// Lowercased words of a camelCase, PascalCase or snake_case identifier
fn name_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut previous_lower = false;

    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            previous_lower = false;
            continue;
        }
        if c.is_uppercase() && previous_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        previous_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn method_option(options: &str) -> Option<String> {
    static METHOD: OnceLock<Regex> = OnceLock::new();
    let pattern = METHOD.get_or_init(|| {
        Regex::new(r#"["']?method["']?\s*[:=]\s*["'`](\w+)["'`]"#).expect("valid method regex")
    });
    pattern.captures(options).map(|c| c[1].to_ascii_uppercase())
}

fn client_name_pattern() -> &'static Regex {
    static CLIENT: OnceLock<Regex> = OnceLock::new();
    CLIENT.get_or_init(|| Regex::new(r"(?i)(api|client|http)").expect("valid client regex"))
}

fn path_pattern() -> &'static Regex {
    static PATH: OnceLock<Regex> = OnceLock::new();
    PATH.get_or_init(|| {
        Regex::new(r"^/[\w{}\-.:]+(/[\w{}\-.:]*)*(\?.*)?$").expect("valid path regex")
    })
}

fn hook_field_pattern() -> &'static Regex {
    static FIELD: OnceLock<Regex> = OnceLock::new();
    FIELD.get_or_init(|| {
        Regex::new(r"\b(queryFn|mutationFn|fetcher)\s*:\s*(async\s+)?(\([^)]*\)|[\w$]+)\s*=>\s*\{?\s*(return\s+)?(await\s+)?")
            .expect("valid hook regex")
    })
}

/// Decode a string literal argument into a path, turning interpolations into `{placeholders}`.
/// Anything that is not a single literal (concatenations, variables) yields `None`.
pub(crate) fn string_literal(argument: &str) -> Option<String> {
    let text = argument.trim();
    let prefix_len = text.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    if prefix_len > 2 {
        return None;
    }
    let (prefix, rest) = text.split_at(prefix_len);
    if !prefix.chars().all(|c| matches!(c.to_ascii_lowercase(), 'r' | 'b' | 'f' | 'u')) {
        return None;
    }

    let quote = ["\"\"\"", "'''", "\"", "'", "`"]
        .into_iter()
        .find(|q| rest.starts_with(q) && rest.len() >= 2 * q.len() && rest.ends_with(q))?;
    let body = &rest[quote.len()..rest.len() - quote.len()];
    if body.contains(quote) {
        return None;
    }

    if quote == "`" {
        Some(template_placeholders(body))
    } else {
        // f-strings already use {expr}; plain strings are taken as written
        Some(body.to_string())
    }
}

fn template_placeholders(body: &str) -> String {
    static INTERPOLATION: OnceLock<Regex> = OnceLock::new();
    let pattern = INTERPOLATION.get_or_init(|| Regex::new(r"\$\{([^}]*)\}").expect("valid template regex"));
    pattern
        .replace_all(body, |caps: &regex::Captures| format!("{{{}}}", caps[1].trim()))
        .into_owned()
}

/// Read `callee(arg, arg)` from the start of `text`
fn parse_call_text(text: &str, line: usize) -> Option<CallReference> {
    let open = text.find('(')?;
    let callee = text[..open].trim();
    if callee.is_empty() || !callee.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.')) {
        return None;
    }

    let mut arguments = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut current = String::new();
    let mut closed = false;

    for c in text[open + 1..].chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' if depth == 0 => {
                closed = true;
                break;
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => arguments.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    if !closed {
        return None;
    }
    if !current.trim().is_empty() {
        arguments.push(current.trim().to_string());
    }

    let call = match callee.rsplit_once('.') {
        Some((target, name)) => CallReference::new(name, line).with_target(target),
        None => CallReference::new(callee, line),
    };
    Some(call.with_arguments(arguments))
}
