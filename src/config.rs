//! Configuration loaded from environment variables.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{KbError, Result};
use crate::models::ChunkStrategy;

fn validate_overlap(config: &KbConfig) -> std::result::Result<(), validator::ValidationError> {
    if config.chunk_overlap >= config.chunk_size {
        return Err(validator::ValidationError::new(
            "chunk_overlap must be smaller than chunk_size",
        ));
    }
    Ok(())
}

fn validate_threshold(threshold: f64) -> std::result::Result<(), validator::ValidationError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(validator::ValidationError::new(
            "similarity_threshold must be within [0, 1]",
        ));
    }
    Ok(())
}

/// Central configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_overlap"))]
pub struct KbConfig {
    /// OpenAI (or compatible) API key for the embedding backend.
    #[validate(length(min = 1))]
    pub openai_api_key: String,

    /// Optional OpenAI-compatible base URL; the public API when absent.
    pub embedding_base_url: Option<String>,

    /// Embedding model name.
    pub embedding_model: String,

    /// Extraction service endpoint URL.
    #[validate(length(min = 1))]
    pub extraction_endpoint: String,

    /// Optional bearer token for the extraction service.
    pub extraction_api_key: Option<String>,

    /// Chunking strategy for document builds.
    pub chunk_strategy: ChunkStrategy,

    /// Chunk window size (characters, or tokens with a tokenizer).
    #[validate(range(min = 1))]
    pub chunk_size: usize,

    /// Overlap between consecutive window chunks.
    pub chunk_overlap: usize,

    /// Name-similarity threshold for entity resolution (within [0, 1]).
    #[validate(custom(function = "validate_threshold"))]
    pub similarity_threshold: f64,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            embedding_base_url: None,
            embedding_model: "text-embedding-3-small".to_string(),
            extraction_endpoint: "http://localhost:8010/extract".to_string(),
            extraction_api_key: None,
            chunk_strategy: ChunkStrategy::Window,
            chunk_size: 1_000,
            chunk_overlap: 200,
            similarity_threshold: 0.85,
        }
    }
}

impl KbConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` first (non-fatal if `.env` is absent),
    /// then reads each variable from the process environment. The only
    /// required variable is `OPENAI_API_KEY`; everything else has a default.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| KbError::Validation("OPENAI_API_KEY is required".to_string()))?;

        let embedding_base_url = std::env::var("EMBEDDING_BASE_URL").ok();

        let embedding_model = std::env::var("EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());

        let extraction_endpoint = std::env::var("EXTRACTION_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:8010/extract".to_string());

        let extraction_api_key = std::env::var("EXTRACTION_API_KEY").ok();

        let chunk_strategy = match std::env::var("CHUNK_STRATEGY") {
            Ok(val) => match val.as_str() {
                "window" => ChunkStrategy::Window,
                "structure_aware" => ChunkStrategy::StructureAware,
                "semantic" => ChunkStrategy::Semantic,
                other => {
                    return Err(KbError::Validation(format!(
                        "unknown CHUNK_STRATEGY: {other}"
                    )))
                }
            },
            Err(_) => ChunkStrategy::Window,
        };

        let chunk_size = parse_env_usize("CHUNK_SIZE", 1_000)?;
        let chunk_overlap = parse_env_usize("CHUNK_OVERLAP", 200)?;

        let similarity_threshold = match std::env::var("SIMILARITY_THRESHOLD") {
            Ok(val) => val.parse::<f64>().map_err(|_| {
                KbError::Validation("SIMILARITY_THRESHOLD must be a number".to_string())
            })?,
            Err(_) => 0.85,
        };

        let config = Self {
            openai_api_key,
            embedding_base_url,
            embedding_model,
            extraction_endpoint,
            extraction_api_key,
            chunk_strategy,
            chunk_size,
            chunk_overlap,
            similarity_threshold,
        };

        config
            .validate()
            .map_err(|e| KbError::Validation(e.to_string()))?;

        Ok(config)
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize> {
    match std::env::var(name) {
        Ok(val) => val
            .parse::<usize>()
            .map_err(|_| KbError::Validation(format!("{name} must be a positive integer"))),
        Err(_) => Ok(default),
    }
}
