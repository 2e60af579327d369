use std::path::{Path, PathBuf};
use std::collections::HashMap;
use sha2::{Sha256, Digest};
use ignore::WalkBuilder;
use tracing::debug;

use crate::config::ParsingConfig;
use crate::error::{CanvasError, Result};
use super::languages::{language_for_extension, LanguageParser, PythonParser, JavaScriptParser};
use super::model::CodeElement;
use super::normalizer::normalize;

/// Represents a parsed and normalized source file
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// File path as given or discovered
    pub path: PathBuf,

    /// Programming language detected
    pub language: String,

    /// Content hash of the source text
    pub content_hash: String,

    /// Normalized element tree rooted at the module
    pub root: CodeElement,

    /// Raw source content (for analysis context)
    pub source: String,
}

/// Multi-language code parser that delegates to language-specific parsers
pub struct CodeParser {
    config: ParsingConfig,
    language_parsers: HashMap<String, Box<dyn LanguageParser>>,
}

impl CodeParser {
    pub fn new(config: &ParsingConfig) -> Result<Self> {
        let mut language_parsers: HashMap<String, Box<dyn LanguageParser>> = HashMap::new();

        for language in &config.languages {
            let parser: Box<dyn LanguageParser> = match language.as_str() {
                "python" => Box::new(PythonParser::new()?),
                "javascript" => Box::new(JavaScriptParser::new()?),
                "typescript" => Box::new(JavaScriptParser::typescript()?),
                other => {
                    debug!("Skipping unsupported language in config: {}", other);
                    continue;
                }
            };
            debug!(
                "Registered {} parser for .{}",
                parser.language_name(),
                parser.file_extensions().join(", .")
            );
            language_parsers.insert(parser.language_name().to_string(), parser);
        }

        Ok(Self {
            config: config.clone(),
            language_parsers,
        })
    }

    /// Read, parse and normalize a single source file
    pub fn parse_file<P: AsRef<Path>>(&mut self, file_path: P) -> Result<ParsedFile> {
        let path = file_path.as_ref();
        // Detect before reading so unsupported files fail fast
        self.detect_language(path)?;

        let metadata = std::fs::metadata(path)?;
        if metadata.len() as usize > self.config.max_file_size {
            return Err(CanvasError::Parse {
                path: path.to_path_buf(),
                reason: format!(
                    "file is {} bytes, above the {} byte limit",
                    metadata.len(),
                    self.config.max_file_size
                ),
            });
        }

        let source = std::fs::read_to_string(path)?;
        self.parse_source(path, source)
    }

    /// Parse already loaded source text as if it came from `path`
    pub fn parse_source(&mut self, path: &Path, source: String) -> Result<ParsedFile> {
        let language = self.detect_language(path)?;
        let content_hash = self.calculate_hash(&source);

        let parser = self.language_parsers.get_mut(&language)
            .ok_or_else(|| CanvasError::UnsupportedLanguage(language.clone()))?;
        let raw = parser.parse(&source, path)?;
        let root = normalize(raw, &language, path)?;

        debug!("Parsed {} ({}, {})", path.display(), language, &content_hash[..12]);

        Ok(ParsedFile {
            path: path.to_path_buf(),
            language,
            content_hash,
            root,
            source,
        })
    }

    /// Expand the given inputs into a sorted list of parseable files.
    /// Explicit files must be supported; directories are filtered silently.
    pub fn discover_files(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for input in inputs {
            if input.is_dir() {
                // Use ignore crate to respect .gitignore
                let walker = WalkBuilder::new(input)
                    .hidden(true)
                    .git_ignore(self.config.respect_gitignore)
                    .build();

                for entry in walker {
                    let entry = entry.map_err(|e| CanvasError::Io(std::io::Error::other(e.to_string())))?;
                    let path = entry.path();
                    if path.is_file() && self.should_parse_file(path) {
                        files.push(path.to_path_buf());
                    }
                }
            } else if input.is_file() {
                self.detect_language(input)?;
                files.push(input.clone());
            } else {
                return Err(CanvasError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} does not exist", input.display()),
                )));
            }
        }

        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Determine if a file should be parsed based on configuration
    fn should_parse_file(&self, path: &Path) -> bool {
        self.detect_language(path).is_ok()
    }

    /// Detect programming language from file path
    fn detect_language(&self, path: &Path) -> Result<String> {
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();

        match language_for_extension(extension) {
            Some(language) if self.language_parsers.contains_key(language) => Ok(language.to_string()),
            _ => Err(CanvasError::UnsupportedLanguage(path.display().to_string())),
        }
    }

    /// Calculate SHA256 hash of content
    fn calculate_hash(&self, content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
