use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::Palette;
use crate::error::{CanvasError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source code parsing configuration
    pub parsing: ParsingConfig,

    /// Canvas geometry and node text options
    pub layout: LayoutConfig,

    /// Kind → color mapping shared by both canvas variants
    pub palette: Palette,

    /// Flow analysis collaborator settings
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Languages to support
    pub languages: Vec<String>,

    /// Maximum file size to parse (in bytes)
    pub max_file_size: usize,

    /// Respect .gitignore when walking directories
    pub respect_gitignore: bool,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            languages: vec!["python".to_string(), "javascript".to_string(), "typescript".to_string()],
            max_file_size: 1024 * 1024, // 1MB
            respect_gitignore: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Vertical distance between rows
    pub row_height: i64,

    /// Horizontal space between sibling subtrees
    pub gutter: i64,

    /// Extra space between flow columns
    pub column_gutter: i64,

    pub min_width: i64,
    pub max_width: i64,
    pub min_height: i64,
    pub max_height: i64,

    /// Parameters shown per node before eliding
    pub max_params: usize,

    /// Docstring excerpt length
    pub docstring_chars: usize,

    pub show_docstrings: bool,
    pub show_params: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            row_height: 300,
            gutter: 60,
            column_gutter: 80,
            min_width: 200,
            max_width: 420,
            min_height: 80,
            max_height: 260,
            max_params: 4,
            docstring_chars: 50,
            show_docstrings: true,
            show_params: true,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_width <= 0 || self.min_height <= 0 {
            return Err(CanvasError::Config("layout.min_width and layout.min_height must be positive".to_string()));
        }
        if self.min_width > self.max_width {
            return Err(CanvasError::Config(format!(
                "layout.min_width ({}) exceeds layout.max_width ({})",
                self.min_width, self.max_width
            )));
        }
        if self.min_height > self.max_height {
            return Err(CanvasError::Config(format!(
                "layout.min_height ({}) exceeds layout.max_height ({})",
                self.min_height, self.max_height
            )));
        }
        if self.max_height >= self.row_height {
            return Err(CanvasError::Config(format!(
                "layout.max_height ({}) must be smaller than layout.row_height ({})",
                self.max_height, self.row_height
            )));
        }
        if self.gutter < 0 || self.column_gutter < 0 {
            return Err(CanvasError::Config("layout gutters cannot be negative".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Provider name (only "openai" compatible endpoints are supported)
    pub provider: String,

    /// Model name used when the command line gives none
    pub model: String,

    /// API key; falls back to OPENAI_API_KEY
    pub api_key: Option<String>,

    /// Base URL of the chat completions API
    pub base_url: String,

    /// Per-request timeout
    pub timeout_secs: u64,

    /// Maximum tokens for responses
    pub max_tokens: Option<u32>,

    /// Temperature for responses (0.0 to 1.0)
    pub temperature: Option<f32>,

    /// Upper bound on the compiled context sent to the model
    pub max_context_chars: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            timeout_secs: 120,
            max_tokens: Some(4000),
            temperature: Some(0.1),
            max_context_chars: 60_000,
        }
    }
}

impl AnalysisConfig {
    /// Configured key, or the environment's
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()))
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| CanvasError::Config(e.to_string()))?;
        config.layout.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Err(CanvasError::Config(format!(
                        "config file {} does not exist",
                        p.as_ref().display()
                    )))
                }
            }
            None => {
                // Try common config file locations
                let candidates = ["codecanvas.toml", ".codecanvas.toml"];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CanvasColor;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
[layout]
gutter = 90

[palette]
class = "3"

[analysis]
timeout_secs = 5
"#,
        )
        .unwrap();

        assert_eq!(config.layout.gutter, 90);
        assert_eq!(config.layout.row_height, LayoutConfig::default().row_height);
        assert_eq!(config.palette.class, CanvasColor::Yellow);
        assert_eq!(config.palette.function, Palette::default().function);
        assert_eq!(config.analysis.timeout_secs, 5);
        assert_eq!(config.parsing.max_file_size, 1024 * 1024);
    }

    #[test]
    fn test_max_height_must_fit_in_row() {
        let err = Config::from_toml("[layout]\nrow_height = 100\nmax_height = 150\n").unwrap_err();
        assert!(err.to_string().contains("must be smaller than layout.row_height"));
    }

    #[test]
    fn test_palette_rejects_unknown_color() {
        let err = Config::from_toml("[palette]\nmodule = \"9\"\n").unwrap_err();
        assert!(matches!(err, CanvasError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_explicit_file() {
        let err = Config::load_or_default(Some("/nonexistent/codecanvas.toml")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_configured_api_key_wins() {
        let analysis = AnalysisConfig {
            api_key: Some("sk-config".to_string()),
            ..AnalysisConfig::default()
        };
        assert_eq!(analysis.resolve_api_key().as_deref(), Some("sk-config"));
    }
}
