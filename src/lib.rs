//! # kbforge
//!
//! Knowledge-base construction pipeline: turns raw markdown into searchable,
//! graph-annotated knowledge.
//!
//! ## Architecture
//!
//! - **Structure-preserving ingestion**: heading hierarchy survives parsing and chunking
//! - **Concurrent indexing**: embedding and entity extraction fan out over the same chunks
//! - **Greedy entity resolution**: name-similarity clustering with seed-anchored merging
//! - **In-memory vector search**: cosine similarity over normalized embeddings

pub mod config;
pub mod errors;
pub mod models;

pub mod embedder;
pub mod extraction;
pub mod ingestion;

pub mod pipeline;
pub mod resolver;
pub mod store;
pub mod utils;

pub use config::KbConfig;
pub use errors::{KbError, Result};
pub use pipeline::{BuildConfiguration, BuildResult, PipelineManager};
