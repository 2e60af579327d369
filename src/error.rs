use std::path::PathBuf;
use thiserror::Error;

/// Main error type for codecanvas operations
#[derive(Error, Debug)]
pub enum CanvasError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error in {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Normalization error in {path}: {reason}")]
    Normalization { path: PathBuf, reason: String },

    #[error("Layout error: {0}")]
    Layout(String),

    #[error("Analysis collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported file type: {0}")]
    UnsupportedLanguage(String),

    #[error("Entrypoint not found: {0}")]
    EntrypointNotFound(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Failures reported by the external flow-analysis service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl CollaboratorError {
    /// Transient failures are worth exactly one retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimit(_) | Self::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, CanvasError>;
