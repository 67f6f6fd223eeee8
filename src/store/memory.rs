//! In-memory vector store.
//!
//! Chunks and their L2-normalized embeddings live in two parallel arrays
//! behind one lock; cosine similarity reduces to a dot product against the
//! normalized rows.

use ndarray::ArrayView1;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::models::Chunk;
use crate::store::{ScoredChunk, SearchFilter, VectorStore};
use crate::utils::normalize_l2;

#[derive(Default)]
struct Inner {
    chunks: Vec<Chunk>,
    // Row i is the normalized embedding of chunks[i].
    vectors: Vec<Vec<f32>>,
}

/// Process-local [`VectorStore`] backed by parallel arrays.
#[derive(Default)]
pub struct InMemoryVectorStore {
    inner: RwLock<Inner>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorStore for InMemoryVectorStore {
    /// Commit embedded chunks, skipping any without an embedding.
    async fn add_chunks(&self, chunks: Vec<Chunk>) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut stored = 0;

        for chunk in chunks {
            if !chunk.is_embedded() {
                warn!(chunk_id = %chunk.chunk_id, "skipping chunk without embedding");
                continue;
            }
            let normalized = normalize_l2(chunk.embedding.as_deref().unwrap_or(&[]));
            inner.vectors.push(normalized);
            inner.chunks.push(chunk);
            stored += 1;
        }

        debug!(stored, total = inner.chunks.len(), "committed chunks");
        Ok(stored)
    }

    /// Score every stored chunk, keep the global top `top_k`, then apply the
    /// filter to that shortlist.
    ///
    /// Filtering after truncation means a filtered search can return fewer
    /// than `top_k` hits even when more matching chunks exist further down
    /// the ranking. Callers that need `top_k` hits per document should
    /// over-fetch and filter themselves.
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        let inner = self.inner.read().await;
        if inner.chunks.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query = normalize_l2(query);
        let query_view = ArrayView1::from(query.as_slice());

        let mut scored: Vec<(usize, f32)> = inner
            .vectors
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let score = if row.len() == query.len() {
                    query_view.dot(&ArrayView1::from(row.as_slice()))
                } else {
                    0.0
                };
                (i, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        let hits = scored
            .into_iter()
            .map(|(i, score)| ScoredChunk { chunk: inner.chunks[i].clone(), score })
            .filter(|hit| filter.map_or(true, |f| f.matches(&hit.chunk)))
            .collect();

        Ok(hits)
    }

    async fn delete_by_doc(&self, doc_id: &str) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let inner = &mut *inner;
        let before = inner.chunks.len();

        let mut chunks = Vec::with_capacity(before);
        let mut vectors = Vec::with_capacity(before);
        for (chunk, vector) in inner.chunks.drain(..).zip(inner.vectors.drain(..)) {
            if chunk.doc_id != doc_id {
                chunks.push(chunk);
                vectors.push(vector);
            }
        }
        inner.chunks = chunks;
        inner.vectors = vectors;

        let removed = before - inner.chunks.len();
        debug!(doc_id, removed, "deleted document chunks");
        Ok(removed)
    }

    async fn count(&self) -> usize {
        self.inner.read().await.chunks.len()
    }
}
