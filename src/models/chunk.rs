//! Chunk — the atomic unit of text flowing through embedding and extraction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strategy used to cut a document into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Sliding character/token window with delimiter back-off.
    Window,
    /// Whole-section accumulation that never splits mid-section.
    StructureAware,
    /// Embedding-similarity boundary detection. Declared for configuration
    /// compatibility; not implemented by [`crate::ingestion::SplitterFactory`].
    Semantic,
}

impl ChunkStrategy {
    /// Stable string form, matching the serde tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::Window => "window",
            ChunkStrategy::StructureAware => "structure_aware",
            ChunkStrategy::Semantic => "semantic",
        }
    }
}

/// Atomic unit of document content for indexing and processing.
///
/// Created by a splitter, mutated once by the embedding service to attach
/// `embedding`, then immutable. Process-local until committed to a
/// [`crate::store::VectorStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Content hash, stable across re-runs over identical text.
    pub chunk_id: String,
    pub doc_id: String,
    pub kb_id: String,
    /// Section the chunk was cut from, when attributable to a single section.
    pub section_id: Option<String>,
    pub content_text: String,
    /// Token count. Before embedding this is an estimate (character or
    /// tokenizer count); after embedding it is set to the embedding length,
    /// an explicit approximation.
    pub token_count: usize,
    pub embedding: Option<Vec<f32>>,
    pub strategy: ChunkStrategy,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Chunk {
    /// Whether this chunk carries a non-empty embedding vector.
    pub fn is_embedded(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}
