//! HTTP extraction backend.
//!
//! Talks JSON to a remote extraction service: chunks and the entity-type
//! vocabulary go out, attribute-maps come back. Transient transport failures
//! are retried with exponential back-off; HTTP error statuses are not.

use std::collections::BTreeMap;
use std::time::Duration;

use backoff::{future::retry, ExponentialBackoffBuilder};
use serde::Serialize;
use tracing::debug;

use crate::errors::{KbError, Result};
use crate::extraction::{ExtractionClient, ExtractionOutput};
use crate::models::Chunk;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct ChunkPayload<'a> {
    chunk_id: &'a str,
    content_text: &'a str,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    kb_id: &'a str,
    doc_id: &'a str,
    chunks: Vec<ChunkPayload<'a>>,
    entity_types: &'a [String],
    entity_types_des: &'a BTreeMap<String, String>,
}

/// Classify a [`reqwest::Error`] as transient (retry) or permanent.
fn classify_error(err: reqwest::Error) -> backoff::Error<KbError> {
    let msg = err.to_string();
    if err.is_timeout() || err.is_connect() {
        backoff::Error::transient(KbError::Extraction(msg))
    } else {
        backoff::Error::permanent(KbError::Extraction(msg))
    }
}

/// Client for a remote extraction service, implementing [`ExtractionClient`].
pub struct HttpExtractionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpExtractionClient {
    /// Create a client for the extraction endpoint URL.
    ///
    /// # Errors
    /// Returns [`KbError::Config`] if the underlying HTTP client cannot be
    /// built.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| KbError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: None,
        })
    }

    /// Attach a bearer token to every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    async fn post_once(&self, body: &serde_json::Value) -> Result<ExtractionOutput> {
        let backoff_policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(10))
            .with_max_elapsed_time(Some(Duration::from_secs(60)))
            .build();

        retry(backoff_policy, || async {
            let mut request = self.http.post(&self.endpoint).json(body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = request.send().await.map_err(classify_error)?;
            let status = response.status();

            if status.is_server_error() {
                // 5xx: the service may recover, retry.
                return Err(backoff::Error::transient(KbError::Extraction(format!(
                    "extraction service returned {status}"
                ))));
            }
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(backoff::Error::permanent(KbError::Extraction(format!(
                    "extraction service returned {status}: {detail}"
                ))));
            }

            response
                .json::<ExtractionOutput>()
                .await
                .map_err(|e| {
                    backoff::Error::permanent(KbError::Extraction(format!(
                        "malformed extraction response: {e}"
                    )))
                })
        })
        .await
    }
}

impl ExtractionClient for HttpExtractionClient {
    async fn extract(
        &self,
        chunks: &[Chunk],
        doc_id: &str,
        kb_id: &str,
        entity_types: &[String],
        entity_types_des: &BTreeMap<String, String>,
    ) -> Result<ExtractionOutput> {
        let request = ExtractRequest {
            kb_id,
            doc_id,
            chunks: chunks
                .iter()
                .map(|c| ChunkPayload {
                    chunk_id: &c.chunk_id,
                    content_text: &c.content_text,
                })
                .collect(),
            entity_types,
            entity_types_des,
        };
        let body = serde_json::to_value(&request)?;

        debug!(doc_id, chunks = chunks.len(), "requesting extraction");
        self.post_once(&body).await
    }
}
