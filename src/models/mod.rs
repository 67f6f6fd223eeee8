//! Core data model: documents, sections, chunks, and graph candidates.

pub mod chunk;
pub mod document;
pub mod graph;

pub use chunk::{Chunk, ChunkStrategy};
pub use document::{ContentType, Document, Section};
pub use graph::{Entity, Relation};
