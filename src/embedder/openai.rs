//! OpenAI-compatible embedding backend.
//!
//! Wraps [`async_openai`] with sub-batching, concurrent dispatch, and
//! exponential-backoff retry on transient transport failures. Works against
//! the real OpenAI API or any OpenAI-compatible endpoint (vLLM, TEI).

use async_openai::{
    config::OpenAIConfig, error::OpenAIError, types::CreateEmbeddingRequestArgs, Client,
};
use backoff::{future::retry, ExponentialBackoffBuilder};
use futures_util::future::try_join_all;
use std::time::Duration;
use tracing::debug;

use crate::embedder::{Embedder, Embedding};
use crate::errors::{KbError, Result};

/// Default embedding model name.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Default number of inputs per embeddings API call.
const DEFAULT_BATCH_SIZE: usize = 100;

/// Embedding dimension for a given model name.
///
/// Falls back to 1536 (the `text-embedding-3-small` dimension) for
/// unrecognised models.
fn model_dimension(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        _ => 1536,
    }
}

/// Classify an [`OpenAIError`] as transient (retry) or permanent.
fn classify_error(err: OpenAIError) -> backoff::Error<KbError> {
    let msg = err.to_string();
    match &err {
        // Network-level failures (timeouts, connection refused) are transient.
        OpenAIError::Reqwest(e) if e.is_timeout() || e.is_connect() => {
            backoff::Error::transient(KbError::Embedder(msg))
        }
        // Everything else (auth errors, bad requests, …) is permanent.
        _ => backoff::Error::permanent(KbError::Embedder(msg)),
    }
}

/// OpenAI embedding backend implementing [`Embedder`].
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    api_key: String,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Create a new embedder for `model` authenticated with `api_key`.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let model = model.into();
        let dimension = model_dimension(&model);
        let config = OpenAIConfig::new().with_api_key(api_key.clone());
        Self {
            client: Client::with_config(config),
            api_key,
            model,
            dimension,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Point the embedder at a custom OpenAI-compatible base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(self.api_key.clone())
            .with_api_base(base_url.into());
        self.client = Client::with_config(config);
        self
    }

    /// Override the per-call batch size (default 100).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Issue a single embeddings API call for up to `batch_size` texts.
    ///
    /// Retries transient network failures with exponential back-off
    /// (initial 500 ms, cap 10 s, total budget 60 s).
    async fn embed_one_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let backoff_policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(10))
            .with_max_elapsed_time(Some(Duration::from_secs(60)))
            .build();

        // Materialise owned data before entering the retry closure.
        let input: Vec<String> = texts.iter().map(|s| (*s).to_owned()).collect();
        let model = self.model.clone();
        let client = self.client.clone();

        retry(backoff_policy, move || {
            let input = input.clone();
            let model = model.clone();
            let client = client.clone();
            async move {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.as_str())
                    .input(input)
                    .build()
                    .map_err(|e| backoff::Error::permanent(KbError::Embedder(e.to_string())))?;

                let response = client
                    .embeddings()
                    .create(request)
                    .await
                    .map_err(classify_error)?;

                let embeddings: Vec<Embedding> = response
                    .data
                    .into_iter()
                    .map(|item| item.embedding.into_iter().map(|x| x as f32).collect())
                    .collect();

                Ok(embeddings)
            }
        })
        .await
    }
}

impl Embedder for OpenAiEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Embedding> {
        let mut embeddings = self.embed_one_batch(&[text]).await?;
        embeddings
            .pop()
            .ok_or_else(|| KbError::Embedder("empty response from embedding API".to_string()))
    }

    /// Embed many texts by splitting into `batch_size` groups dispatched
    /// concurrently. Output order matches input order: `try_join_all`
    /// preserves the order the sub-batches were created in.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<&[&str]> = texts.chunks(self.batch_size).collect();
        debug!(texts = texts.len(), batches = batches.len(), "dispatching embedding batches");

        let results = try_join_all(batches.into_iter().map(|b| self.embed_one_batch(b))).await?;

        Ok(results.into_iter().flatten().collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
