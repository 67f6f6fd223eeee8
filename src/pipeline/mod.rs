//! Build pipeline: parse → chunk → (embed ∥ extract) → resolve → commit.
//!
//! [`PipelineManager`] owns the collaborators for one knowledge base and
//! drives a document through the full build. Embedding and extraction run
//! concurrently over the same chunks; the vector store is only touched after
//! both branches succeed, so a failed build never leaves partial state
//! behind.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::embedder::{Embedder, EmbeddingService};
use crate::errors::Result;
use crate::extraction::{ExtractionClient, GraphExtractor};
use crate::ingestion::{MarkdownParser, SplitterFactory, SplitterOptions, Tokenizer};
use crate::models::{ChunkStrategy, Entity, Relation};
use crate::resolver::EntityResolver;
use crate::store::{ScoredChunk, SearchFilter, VectorStore};

/// Per-build tuning knobs.
#[derive(Clone)]
pub struct BuildConfiguration {
    pub chunk_strategy: ChunkStrategy,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Structure-aware flush boundary; falls back to `chunk_size` when zero.
    pub max_chunk_size: usize,
    /// Optional tokenizer; sizes are characters when absent.
    pub tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl Default for BuildConfiguration {
    fn default() -> Self {
        Self {
            chunk_strategy: ChunkStrategy::Window,
            chunk_size: 1_000,
            chunk_overlap: 200,
            max_chunk_size: 0,
            tokenizer: None,
        }
    }
}

/// Progress stages, reported through tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Parsed,
    Chunked,
    Indexed,
    Committed,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStage::Parsed => "parsed",
            BuildStage::Chunked => "chunked",
            BuildStage::Indexed => "indexed",
            BuildStage::Committed => "committed",
        };
        f.write_str(s)
    }
}

/// Secondary counters attached to a [`BuildResult`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildStats {
    pub sections: usize,
    pub embedding_dimension: usize,
    pub chunk_strategy: ChunkStrategy,
}

/// Outcome of a completed document build.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildResult {
    pub kb_id: String,
    pub doc_id: String,
    pub total_chunks: usize,
    pub total_entities: usize,
    pub total_edges: usize,
    /// Resolved knowledge-graph candidates for this document.
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    pub stats: BuildStats,
}

/// Drives documents through the build pipeline for one knowledge base.
pub struct PipelineManager<E, X, S>
where
    E: Embedder,
    X: ExtractionClient,
    S: VectorStore,
{
    kb_id: String,
    embedding: EmbeddingService<E>,
    extractor: GraphExtractor<X>,
    resolver: EntityResolver,
    store: S,
    config: BuildConfiguration,
}

impl<E, X, S> PipelineManager<E, X, S>
where
    E: Embedder,
    X: ExtractionClient,
    S: VectorStore,
{
    /// Create a manager for the knowledge base `kb_id`.
    ///
    /// # Errors
    /// Returns [`crate::errors::KbError::Config`] when the chunking
    /// configuration is invalid (zero sizes, overlap ≥ size, or an
    /// unimplemented strategy) — validated up front so misconfiguration
    /// fails at construction, not mid-build.
    pub fn new(
        kb_id: impl Into<String>,
        embedding: EmbeddingService<E>,
        extractor: GraphExtractor<X>,
        resolver: EntityResolver,
        store: S,
        config: BuildConfiguration,
    ) -> Result<Self> {
        // Probe the factory to surface bad chunking options immediately.
        SplitterFactory::create(config.chunk_strategy, Self::splitter_options(&config))?;
        Ok(Self {
            kb_id: kb_id.into(),
            embedding,
            extractor,
            resolver,
            store,
            config,
        })
    }

    fn splitter_options(config: &BuildConfiguration) -> SplitterOptions {
        SplitterOptions {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            max_chunk_size: config.max_chunk_size,
            tokenizer: config.tokenizer.clone(),
        }
    }

    /// Access the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Build a document into the knowledge base.
    ///
    /// Parsing and chunking are synchronous. Embedding and extraction then
    /// run concurrently over the same chunks; if either branch fails, the
    /// other is cancelled and the error propagates — nothing is committed.
    /// Only after both succeed are the embedded chunks committed and the
    /// extracted graph resolved.
    pub async fn build_document(
        &self,
        content: &str,
        doc_id: Option<&str>,
        title: Option<&str>,
        metadata: Option<BTreeMap<String, serde_json::Value>>,
    ) -> Result<BuildResult> {
        let document = MarkdownParser::parse(content, &self.kb_id, doc_id, title, metadata);
        let sections = document.sections.len();
        info!(stage = %BuildStage::Parsed, doc_id = %document.doc_id, sections, "document parsed");

        let splitter =
            SplitterFactory::create(self.config.chunk_strategy, Self::splitter_options(&self.config))?;
        let chunks = splitter.split(&document, &self.kb_id);
        info!(stage = %BuildStage::Chunked, doc_id = %document.doc_id, chunks = chunks.len(), "document chunked");

        if chunks.is_empty() {
            return Ok(BuildResult {
                kb_id: self.kb_id.clone(),
                doc_id: document.doc_id,
                total_chunks: 0,
                total_entities: 0,
                total_edges: 0,
                entities: Vec::new(),
                relations: Vec::new(),
                stats: BuildStats {
                    sections,
                    embedding_dimension: self.embedding.embedder().dimension(),
                    chunk_strategy: self.config.chunk_strategy,
                },
            });
        }

        // Fan out: embedding and extraction race over the same chunks. The
        // first error cancels the sibling branch.
        let (embedded, (entities, relations)) = tokio::try_join!(
            self.embedding.embed_chunks(chunks.clone()),
            self.extractor.extract_batch(&chunks),
        )?;
        info!(
            stage = %BuildStage::Indexed,
            doc_id = %document.doc_id,
            entities = entities.len(),
            relations = relations.len(),
            "embedding and extraction complete"
        );

        let (entities, relations) = self.resolver.resolve(entities, relations)?;
        let total_chunks = self.store.add_chunks(embedded).await?;
        info!(
            stage = %BuildStage::Committed,
            doc_id = %document.doc_id,
            chunks = total_chunks,
            entities = entities.len(),
            relations = relations.len(),
            "build committed"
        );

        Ok(BuildResult {
            kb_id: self.kb_id.clone(),
            doc_id: document.doc_id,
            total_chunks,
            total_entities: entities.len(),
            total_edges: relations.len(),
            entities,
            relations,
            stats: BuildStats {
                sections,
                embedding_dimension: self.embedding.embedder().dimension(),
                chunk_strategy: self.config.chunk_strategy,
            },
        })
    }

    /// Similarity search over committed chunks.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        let embedding = self.embedding.embed_query(query).await?;
        self.store.search(&embedding, top_k, filter).await
    }

    /// Remove a document's chunks from the store.
    pub async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        self.store.delete_by_doc(doc_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::KbError;
    use crate::extraction::{ExtractionOutput, RawEdge, RawEntity};
    use crate::store::InMemoryVectorStore;

    /// Embedder mapping text length onto a 3-vector.
    struct StubEmbedder;

    impl Embedder for StubEmbedder {
        async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    /// Extraction stub producing one entity per chunk.
    struct StubExtraction;

    impl ExtractionClient for StubExtraction {
        async fn extract(
            &self,
            chunks: &[crate::models::Chunk],
            doc_id: &str,
            kb_id: &str,
            _entity_types: &[String],
            _entity_types_des: &BTreeMap<String, String>,
        ) -> Result<ExtractionOutput> {
            let chunk = &chunks[0];
            Ok(ExtractionOutput {
                entities: vec![RawEntity {
                    id: format!("ent-{}", chunk.chunk_id),
                    attributes: BTreeMap::from([(
                        "entity_name".to_string(),
                        serde_json::json!(format!("Entity {}", chunk.chunk_id)),
                    )]),
                }],
                edges: vec![RawEdge {
                    source_id: format!("ent-{}", chunk.chunk_id),
                    target_id: "ent-hub".to_string(),
                    attributes: BTreeMap::new(),
                }],
                namespace: format!("{kb_id}/{doc_id}"),
            })
        }
    }

    fn manager(
        config: BuildConfiguration,
    ) -> PipelineManager<StubEmbedder, StubExtraction, InMemoryVectorStore> {
        PipelineManager::new(
            "kb-test",
            EmbeddingService::new(StubEmbedder),
            GraphExtractor::new(StubExtraction, vec!["Person".to_string()], BTreeMap::new())
                .unwrap(),
            EntityResolver::default(),
            InMemoryVectorStore::new(),
            config,
        )
        .unwrap()
    }

    const DOC: &str = "# Title\n\nIntro text about Alice.\n\n## Detail\n\nMore text about Bob.";

    #[tokio::test]
    async fn test_build_document_commits_chunks() {
        let m = manager(BuildConfiguration::default());
        let result = m.build_document(DOC, Some("doc-1"), None, None).await.unwrap();

        assert_eq!(result.kb_id, "kb-test");
        assert_eq!(result.doc_id, "doc-1");
        assert!(result.total_chunks > 0);
        assert_eq!(result.total_chunks, m.store().count().await);
        assert_eq!(result.stats.embedding_dimension, 3);
    }

    #[tokio::test]
    async fn test_build_result_counts_resolved_graph() {
        let m = manager(BuildConfiguration::default());
        let result = m.build_document(DOC, Some("doc-1"), None, None).await.unwrap();

        assert_eq!(result.total_entities, result.entities.len());
        assert_eq!(result.total_edges, result.relations.len());
        assert!(result.total_entities > 0);
    }

    #[tokio::test]
    async fn test_empty_document_builds_nothing() {
        let m = manager(BuildConfiguration::default());
        let result = m.build_document("", Some("doc-e"), None, None).await.unwrap();

        assert_eq!(result.total_chunks, 0);
        assert_eq!(result.total_entities, 0);
        assert_eq!(m.store().count().await, 0);
    }

    #[tokio::test]
    async fn test_search_returns_committed_chunks() {
        let m = manager(BuildConfiguration::default());
        m.build_document(DOC, Some("doc-1"), None, None).await.unwrap();

        let hits = m.search("Alice", 5, None).await.unwrap();
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn test_delete_document_empties_store() {
        let m = manager(BuildConfiguration::default());
        m.build_document(DOC, Some("doc-1"), None, None).await.unwrap();

        let removed = m.delete_document("doc-1").await.unwrap();
        assert!(removed > 0);
        assert_eq!(m.store().count().await, 0);
    }

    #[test]
    fn test_build_stats_serializes_to_map() {
        let stats = BuildStats {
            sections: 3,
            embedding_dimension: 1536,
            chunk_strategy: ChunkStrategy::Window,
        };
        let v = serde_json::to_value(&stats).unwrap();
        assert_eq!(v["sections"], 3);
        assert_eq!(v["embedding_dimension"], 1536);
        assert_eq!(v["chunk_strategy"], "window");
    }

    #[test]
    fn test_semantic_strategy_rejected_at_construction() {
        let config = BuildConfiguration {
            chunk_strategy: ChunkStrategy::Semantic,
            ..Default::default()
        };
        let result = PipelineManager::new(
            "kb-test",
            EmbeddingService::new(StubEmbedder),
            GraphExtractor::new(StubExtraction, vec!["Person".to_string()], BTreeMap::new())
                .unwrap(),
            EntityResolver::default(),
            InMemoryVectorStore::new(),
            config,
        );
        assert!(matches!(result, Err(KbError::Config(_))));
    }
}
