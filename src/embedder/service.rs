//! Embedding service: applies an [`Embedder`] to chunks and queries.

use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::embedder::{Embedder, Embedding};
use crate::errors::{KbError, Result};
use crate::models::Chunk;
use crate::utils::content_hash;

/// Query-embedding cache defaults: repeated searches for the same text are
/// common enough that a small in-process cache pays for itself.
const QUERY_CACHE_CAPACITY: u64 = 1_000;
const QUERY_CACHE_TTL: Duration = Duration::from_secs(3_600);

/// Service that embeds chunks for indexing and queries for search.
pub struct EmbeddingService<E: Embedder> {
    embedder: E,
    query_cache: Cache<String, Embedding>,
}

impl<E: Embedder> EmbeddingService<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            query_cache: Cache::builder()
                .max_capacity(QUERY_CACHE_CAPACITY)
                .time_to_live(QUERY_CACHE_TTL)
                .build(),
        }
    }

    /// Access to the wrapped embedder (e.g. for its dimension).
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Embed a list of chunks, attaching vectors in input order.
    ///
    /// Each chunk's `token_count` is set to the embedding length — an
    /// explicit approximation, not a real token count.
    ///
    /// # Errors
    /// Propagates transport errors from the embedder; returns
    /// [`KbError::Embedder`] if the backend yields fewer vectors than inputs.
    pub async fn embed_chunks(&self, mut chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
        if chunks.is_empty() {
            return Ok(chunks);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content_text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(KbError::Embedder(format!(
                "embedding backend returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.token_count = embedding.len();
            chunk.embedding = Some(embedding);
        }

        debug!(chunks = chunks.len(), "embedded chunks");
        Ok(chunks)
    }

    /// Embed a query string for similarity search, with caching.
    pub async fn embed_query(&self, query: &str) -> Result<Embedding> {
        let key = content_hash(query, "q-");

        if let Some(cached) = self.query_cache.get(&key).await {
            debug!("query embedding cache hit");
            return Ok(cached);
        }

        let embedding = self.embedder.embed_text(query).await?;
        self.query_cache.insert(key, embedding.clone()).await;
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkStrategy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder: vector = [len, 1.0, 0.0], counts calls.
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    impl Embedder for CountingEmbedder {
        async fn embed_text(&self, text: &str) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    fn chunk(text: &str) -> Chunk {
        Chunk {
            chunk_id: content_hash(text, "chunk-"),
            doc_id: "doc-1".to_string(),
            kb_id: "kb-1".to_string(),
            section_id: None,
            content_text: text.to_string(),
            token_count: text.len(),
            embedding: None,
            strategy: ChunkStrategy::Window,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_embed_chunks_attaches_vectors_in_order() {
        let service = EmbeddingService::new(CountingEmbedder::new());
        let chunks = vec![chunk("ab"), chunk("abcd")];

        let embedded = service.embed_chunks(chunks).await.unwrap();

        assert_eq!(embedded[0].embedding.as_ref().unwrap()[0], 2.0);
        assert_eq!(embedded[1].embedding.as_ref().unwrap()[0], 4.0);
    }

    #[tokio::test]
    async fn test_embed_chunks_sets_token_count_to_embedding_len() {
        let service = EmbeddingService::new(CountingEmbedder::new());
        let embedded = service.embed_chunks(vec![chunk("hello world")]).await.unwrap();
        assert_eq!(embedded[0].token_count, 3);
    }

    #[tokio::test]
    async fn test_embed_chunks_empty_is_noop() {
        let service = EmbeddingService::new(CountingEmbedder::new());
        let embedded = service.embed_chunks(Vec::new()).await.unwrap();
        assert!(embedded.is_empty());
        assert_eq!(service.embedder().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embed_query_hits_cache_on_repeat() {
        let service = EmbeddingService::new(CountingEmbedder::new());

        let a = service.embed_query("same query").await.unwrap();
        let b = service.embed_query("same query").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(service.embedder().calls.load(Ordering::SeqCst), 1);
    }
}
