//! Entity resolution: deduplicating extracted entities and rewriting edges.
//!
//! Clustering is greedy and seed-anchored: each unclaimed entity seeds a
//! cluster and claims every later entity whose name is similar to the SEED
//! (not to other members). Similarity is deliberately not transitive here;
//! chaining members would let "A ~ B, B ~ C" collapse A and C even when
//! their names share nothing.

use std::collections::HashMap;

use tracing::debug;

use crate::errors::Result;
use crate::models::{Entity, Relation};
use crate::utils::names_similar;

/// Default name-similarity threshold for clustering.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Resolves duplicate entities and rewrites relations onto the survivors.
pub struct EntityResolver {
    similarity_threshold: f64,
}

impl Default for EntityResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl EntityResolver {
    pub fn new(similarity_threshold: f64) -> Self {
        Self { similarity_threshold }
    }

    /// Resolve a batch of extracted entities and relations.
    ///
    /// Returns the merged entities and the relations rewritten onto the
    /// merged ids, with self-loops dropped and parallel edges of the same
    /// type collapsed.
    pub fn resolve(
        &self,
        entities: Vec<Entity>,
        relations: Vec<Relation>,
    ) -> Result<(Vec<Entity>, Vec<Relation>)> {
        let before_entities = entities.len();
        let before_relations = relations.len();

        let (merged, id_map) = self.cluster_and_merge(entities);
        let rewritten = Self::rewrite_relations(relations, &id_map);

        debug!(
            entities_in = before_entities,
            entities_out = merged.len(),
            relations_in = before_relations,
            relations_out = rewritten.len(),
            "entity resolution complete"
        );
        Ok((merged, rewritten))
    }

    /// Greedily cluster entities by name similarity and merge each cluster.
    ///
    /// Only entities of the same type are candidates for the same cluster;
    /// "Paris" the person never merges with "Paris" the city.
    ///
    /// Returns the merged entities (in seed order) and a map from every
    /// original entity id to its surviving entity id.
    fn cluster_and_merge(&self, entities: Vec<Entity>) -> (Vec<Entity>, HashMap<String, String>) {
        let mut claimed = vec![false; entities.len()];
        let mut merged = Vec::new();
        let mut id_map = HashMap::new();

        for i in 0..entities.len() {
            if claimed[i] {
                continue;
            }
            claimed[i] = true;

            let mut cluster = vec![&entities[i]];
            for j in (i + 1)..entities.len() {
                if claimed[j] {
                    continue;
                }
                if entities[j].entity_type == entities[i].entity_type
                    && names_similar(&entities[i].name, &entities[j].name, self.similarity_threshold)
                {
                    claimed[j] = true;
                    cluster.push(&entities[j]);
                }
            }

            let survivor = Self::merge_cluster(&cluster);
            for member in &cluster {
                id_map.insert(member.id.clone(), survivor.id.clone());
            }
            merged.push(survivor);
        }

        (merged, id_map)
    }

    /// Merge a cluster into one entity.
    ///
    /// The member with the most source chunks supplies the identity (id,
    /// name, type) and its description leads; distinct descriptions from the
    /// other members are appended in cluster order, and source chunk ids are
    /// unioned.
    fn merge_cluster(cluster: &[&Entity]) -> Entity {
        // First member wins ties, so the seed survives when counts are equal.
        let mut survivor = cluster[0];
        for &member in &cluster[1..] {
            if member.source_chunk_ids.len() > survivor.source_chunk_ids.len() {
                survivor = member;
            }
        }

        let mut merged = survivor.clone();

        let mut descriptions: Vec<&str> = Vec::new();
        let lead = survivor.description.trim();
        if !lead.is_empty() {
            descriptions.push(lead);
        }
        for member in cluster {
            let desc = member.description.trim();
            if !desc.is_empty() && !descriptions.contains(&desc) {
                descriptions.push(desc);
            }
        }
        merged.description = descriptions.join(" | ");

        for member in cluster {
            merged
                .source_chunk_ids
                .extend(member.source_chunk_ids.iter().cloned());
        }

        merged
    }

    /// Rewrite relations onto merged entity ids.
    ///
    /// Endpoints are mapped through `id_map` (unknown ids pass through
    /// unchanged), relations whose endpoints collapse to the same entity are
    /// dropped, and duplicates on (source, target, type) are collapsed with
    /// their source chunk ids unioned. First occurrence wins on everything
    /// else.
    fn rewrite_relations(
        relations: Vec<Relation>,
        id_map: &HashMap<String, String>,
    ) -> Vec<Relation> {
        let mut deduped: Vec<Relation> = Vec::new();
        let mut index: HashMap<(String, String, String), usize> = HashMap::new();

        for mut relation in relations {
            if let Some(mapped) = id_map.get(&relation.source) {
                relation.source = mapped.clone();
            }
            if let Some(mapped) = id_map.get(&relation.target) {
                relation.target = mapped.clone();
            }

            if relation.source == relation.target {
                continue;
            }

            let key = (
                relation.source.clone(),
                relation.target.clone(),
                relation.relation_type.clone(),
            );
            match index.get(&key) {
                Some(&pos) => {
                    deduped[pos]
                        .source_chunk_ids
                        .extend(relation.source_chunk_ids.iter().cloned());
                }
                None => {
                    index.insert(key, deduped.len());
                    deduped.push(relation);
                }
            }
        }

        deduped
    }
}
