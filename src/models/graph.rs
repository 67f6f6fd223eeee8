//! Entity and Relation — graph node/edge candidates extracted from chunks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A real-world entity (person, organization, amount, …) extracted from a chunk.
///
/// Entities are created per chunk by the extractor and may later be merged by
/// the resolver, with a single surviving entity per similarity cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub description: String,
    /// Chunks this entity was observed in.
    pub source_chunk_ids: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

/// A directed relationship between two entities.
///
/// Relations are rewritten (not destroyed) when their endpoints are remapped
/// during resolution, and dropped only when remapping collapses them into a
/// self-loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,
    /// Id of the source entity.
    pub source: String,
    /// Id of the target entity.
    pub target: String,
    pub relation_type: String,
    pub description: String,
    pub weight: f64,
    pub source_chunk_ids: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}
