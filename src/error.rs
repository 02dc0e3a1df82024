use thiserror::Error;

/// Main error type for ragchat
#[derive(Error, Debug)]
pub enum RagchatError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document load / extraction errors
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Parse errors (sidecar metadata, service responses)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generation service errors
    #[error("Generation service error: {0}")]
    Generation(String),

    /// Retrieval service errors
    #[error("Retrieval service error: {0}")]
    Retrieval(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using RagchatError
pub type Result<T> = std::result::Result<T, RagchatError>;
