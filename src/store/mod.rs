//! Vector storage backends.

pub mod memory;

pub use memory::InMemoryVectorStore;

use std::collections::BTreeMap;

use crate::errors::Result;
use crate::models::Chunk;

/// Metadata filters for similarity search.
///
/// All present fields must match (conjunction). `metadata` entries are
/// compared for JSON equality against the chunk's metadata map.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub doc_id: Option<String>,
    pub section_id: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl SearchFilter {
    /// Whether `chunk` passes every present criterion.
    pub fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(doc_id) = &self.doc_id {
            if &chunk.doc_id != doc_id {
                return false;
            }
        }
        if let Some(section_id) = &self.section_id {
            if chunk.section_id.as_ref() != Some(section_id) {
                return false;
            }
        }
        self.metadata
            .iter()
            .all(|(key, value)| chunk.metadata.get(key) == Some(value))
    }
}

/// A search result: the matching chunk and its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Contract for chunk vector stores.
#[allow(async_fn_in_trait)]
pub trait VectorStore: Send + Sync {
    /// Commit embedded chunks. Returns the number actually stored.
    async fn add_chunks(&self, chunks: Vec<Chunk>) -> Result<usize>;

    /// Nearest-neighbour search by cosine similarity, best first.
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Remove every chunk belonging to `doc_id`. Returns the removed count.
    async fn delete_by_doc(&self, doc_id: &str) -> Result<usize>;

    /// Number of chunks currently stored.
    async fn count(&self) -> usize;
}
