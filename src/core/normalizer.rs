use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{CanvasError, Result};
use super::languages::RawElement;
use super::model::{CodeElement, ElementKind};

/// Convert a raw adapter tree into the unified model.
///
/// Optional fields get their defaults, missing end lines are computed from the children,
/// children are ordered by start line and every element receives a stable id. Any
/// structural problem fails the whole conversion; no partial tree is returned.
pub fn normalize(raw: RawElement, language: &str, file_path: &Path) -> Result<CodeElement> {
    let normalizer = Normalizer { file_path };

    let kind = normalizer.required_kind(&raw)?;
    if kind != ElementKind::Module {
        return Err(normalizer.error(format!("root element must be a module, found {}", kind)));
    }

    let root_name = normalizer.required_name(&raw)?;
    let root = normalizer.convert(raw, root_name, 1)?;

    debug!(
        "Normalized {} tree for {}: {} elements",
        language,
        file_path.display(),
        root.walk().len()
    );
    Ok(root)
}

struct Normalizer<'a> {
    file_path: &'a Path,
}

impl Normalizer<'_> {
    fn convert(&self, raw: RawElement, id: String, default_start: usize) -> Result<CodeElement> {
        let kind = self.required_kind(&raw)?;
        let name = self.required_name(&raw)?;
        let start_line = raw.start_line.unwrap_or(default_start);

        if let Some(end) = raw.end_line {
            if end < start_line {
                return Err(self.error(format!(
                    "'{}' ends at line {} before it starts at line {}",
                    name, end, start_line
                )));
            }
        }

        let mut raw_children = raw.children.unwrap_or_default();
        raw_children.sort_by_key(|child| child.start_line.unwrap_or(start_line));

        let mut children = Vec::with_capacity(raw_children.len());
        let mut seen_names: HashMap<String, usize> = HashMap::new();
        for raw_child in raw_children {
            let child_name = self.required_name(&raw_child)?;
            let occurrence = seen_names.entry(child_name.clone()).or_insert(0);
            *occurrence += 1;
            let child_id = if *occurrence == 1 {
                format!("{}::{}", id, child_name)
            } else {
                format!("{}::{}#{}", id, child_name, occurrence)
            };

            let child = self.convert(raw_child, child_id, start_line)?;
            if child.start_line < start_line {
                return Err(self.error(format!(
                    "'{}' starts at line {} outside its parent '{}' (line {})",
                    child.name, child.start_line, name, start_line
                )));
            }
            children.push(child);
        }

        let children_end = children.iter().map(|c| c.end_line).max().unwrap_or(0);
        let end_line = match raw.end_line {
            Some(end) => {
                if children_end > end {
                    return Err(self.error(format!(
                        "a child of '{}' ends at line {} outside its parent (ends at line {})",
                        name, children_end, end
                    )));
                }
                end
            }
            None => start_line.max(children_end),
        };

        Ok(CodeElement {
            id,
            kind,
            name,
            start_line,
            end_line,
            docstring: raw.docstring.filter(|d| !d.trim().is_empty()),
            children,
            parameters: raw.parameters,
            return_type: raw.return_type,
            is_async: raw.is_async,
            is_generator: raw.is_generator,
            decorators: raw.decorators,
            base_classes: raw.base_classes,
            calls: raw.calls,
            api_calls: raw.api_calls,
            imports: raw.imports,
            exports: raw.exports,
        })
    }

    fn required_kind(&self, raw: &RawElement) -> Result<ElementKind> {
        let value = raw
            .kind
            .as_deref()
            .ok_or_else(|| self.error(format!("element '{}' has no kind", display_name(raw))))?;
        ElementKind::parse(value).ok_or_else(|| {
            self.error(format!("element '{}' has unknown kind '{}'", display_name(raw), value))
        })
    }

    fn required_name(&self, raw: &RawElement) -> Result<String> {
        match raw.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(self.error(format!(
                "{} element at line {} has no name",
                raw.kind.as_deref().unwrap_or("unknown"),
                raw.start_line.unwrap_or(0)
            ))),
        }
    }

    fn error(&self, reason: String) -> CanvasError {
        CanvasError::Normalization {
            path: self.file_path.to_path_buf(),
            reason,
        }
    }
}

fn display_name(raw: &RawElement) -> &str {
    raw.name.as_deref().unwrap_or("<unnamed>")
}
