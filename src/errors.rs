//! Error types for kbforge.

/// Alias for Results returning [`KbError`].
pub type Result<T> = std::result::Result<T, KbError>;

/// Top-level error type for the knowledge-base pipeline.
///
/// Configuration errors are fatal and never retried. Transport errors from
/// the embedding and extraction backends are propagated unmodified; retry
/// policy lives inside the clients themselves.
#[derive(Debug, thiserror::Error)]
pub enum KbError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedder error: {0}")]
    Embedder(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
