//! Embedding backend abstraction.
//!
//! Provides the [`Embedder`] contract for turning text into vectors, the
//! OpenAI-compatible implementation, and the [`service::EmbeddingService`]
//! that applies an embedder to chunks.

pub mod openai;
pub mod service;

pub use openai::OpenAiEmbedder;
pub use service::EmbeddingService;

use crate::errors::Result;

/// A vector embedding (f32 components).
pub type Embedding = Vec<f32>;

/// Contract for text-to-vector embedding backends.
///
/// All calls are asynchronous and fallible; transport errors propagate and
/// retry policy, if any, lives inside the implementation.
#[allow(async_fn_in_trait)]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text string.
    async fn embed_text(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for a batch of texts, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Dimensionality of the embeddings this backend produces.
    fn dimension(&self) -> usize;
}
