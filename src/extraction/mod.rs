//! Entity/relation extraction.
//!
//! The natural-language extraction service itself is an external
//! collaborator behind the [`ExtractionClient`] contract: chunks in,
//! attribute-maps out, plus an opaque namespace key. [`GraphExtractor`]
//! drives that contract per chunk with bounded concurrency and converts the
//! raw output into [`Entity`] / [`Relation`] candidates.

pub mod http;

pub use http::HttpExtractionClient;

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use futures_util::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{KbError, Result};
use crate::models::{Chunk, Entity, Relation};

/// Default cap on in-flight extraction calls.
const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// An extracted entity as the service reports it: an id plus attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntity {
    pub id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// An extracted edge as the service reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEdge {
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Full output of one extraction call.
///
/// `namespace` identifies the graph/document combination for downstream
/// storage; the core treats it as an opaque string key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub entities: Vec<RawEntity>,
    pub edges: Vec<RawEdge>,
    pub namespace: String,
}

/// Contract for the external extraction service.
#[allow(async_fn_in_trait)]
pub trait ExtractionClient: Send + Sync {
    /// Extract entities and edges from `chunks`.
    async fn extract(
        &self,
        chunks: &[Chunk],
        doc_id: &str,
        kb_id: &str,
        entity_types: &[String],
        entity_types_des: &BTreeMap<String, String>,
    ) -> Result<ExtractionOutput>;
}

fn attr_str(attrs: &BTreeMap<String, serde_json::Value>, key: &str) -> Option<String> {
    attrs.get(key).and_then(|v| v.as_str()).map(ToOwned::to_owned)
}

/// Extracts graph candidates from chunks via an [`ExtractionClient`].
pub struct GraphExtractor<X: ExtractionClient> {
    client: X,
    entity_types: Vec<String>,
    entity_types_des: BTreeMap<String, String>,
    max_concurrency: usize,
}

impl<X: ExtractionClient> GraphExtractor<X> {
    /// Create an extractor for the given entity-type vocabulary.
    ///
    /// # Errors
    /// Returns [`KbError::Config`] when `entity_types` is empty — the
    /// extraction contract requires a type list, and this is a fatal
    /// configuration error rather than something to retry.
    pub fn new(
        client: X,
        entity_types: Vec<String>,
        entity_types_des: BTreeMap<String, String>,
    ) -> Result<Self> {
        if entity_types.is_empty() {
            return Err(KbError::Config("entity_types must not be empty".to_string()));
        }
        Ok(Self {
            client,
            entity_types,
            entity_types_des,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        })
    }

    /// Cap the number of concurrently outstanding extraction calls.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Extract entities and relations from a single chunk.
    pub async fn extract_from_chunk(
        &self,
        chunk: &Chunk,
    ) -> Result<(Vec<Entity>, Vec<Relation>)> {
        let output = self
            .client
            .extract(
                std::slice::from_ref(chunk),
                &chunk.doc_id,
                &chunk.kb_id,
                &self.entity_types,
                &self.entity_types_des,
            )
            .await?;

        Ok(Self::convert(output, &chunk.chunk_id))
    }

    /// Extract from many chunks with a bounded, order-preserving fan-out.
    ///
    /// Up to `max_concurrency` extraction calls run at a time; results are
    /// aggregated in chunk order. The first failing task fails the whole
    /// batch and cancels the in-flight remainder — partial aggregates are
    /// never returned.
    pub async fn extract_batch(
        &self,
        chunks: &[Chunk],
    ) -> Result<(Vec<Entity>, Vec<Relation>)> {
        let results: Vec<(Vec<Entity>, Vec<Relation>)> = stream::iter(chunks)
            .map(|chunk| self.extract_from_chunk(chunk))
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        let mut entities = Vec::new();
        let mut relations = Vec::new();
        for (mut e, mut r) in results {
            entities.append(&mut e);
            relations.append(&mut r);
        }

        debug!(
            chunks = chunks.len(),
            entities = entities.len(),
            relations = relations.len(),
            "extraction batch complete"
        );
        Ok((entities, relations))
    }

    /// Convert the service's attribute-maps into typed graph candidates.
    fn convert(output: ExtractionOutput, chunk_id: &str) -> (Vec<Entity>, Vec<Relation>) {
        let now = Utc::now();
        let sources = BTreeSet::from([chunk_id.to_string()]);

        let entities = output
            .entities
            .into_iter()
            .map(|raw| {
                let name = attr_str(&raw.attributes, "entity_name").unwrap_or_else(|| raw.id.clone());
                Entity {
                    id: raw.id,
                    name,
                    entity_type: attr_str(&raw.attributes, "entity_type")
                        .unwrap_or_else(|| "Unknown".to_string()),
                    description: attr_str(&raw.attributes, "description").unwrap_or_default(),
                    source_chunk_ids: sources.clone(),
                    created_at: now,
                }
            })
            .collect();

        let relations = output
            .edges
            .into_iter()
            .map(|raw| Relation {
                id: format!("rel-{}", Uuid::new_v4().simple()),
                source: raw.source_id,
                target: raw.target_id,
                relation_type: attr_str(&raw.attributes, "relation_type")
                    .unwrap_or_else(|| "RELATED_TO".to_string()),
                description: attr_str(&raw.attributes, "description").unwrap_or_default(),
                weight: raw
                    .attributes
                    .get("weight")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(1.0),
                source_chunk_ids: sources.clone(),
                created_at: now,
            })
            .collect();

        (entities, relations)
    }
}
