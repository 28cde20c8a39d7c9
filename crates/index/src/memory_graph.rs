use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

use extract::Entity;
use ingest::{Chunk, Document};

use crate::graph_store::{GraphStats, GraphStore, ScoredChunk};

#[derive(Debug, Clone)]
struct ChunkNode {
    id: String,
    doc_id: String,
    text: String,
    language: String,
}

#[derive(Debug, Default)]
struct GraphState {
    documents: HashSet<String>,
    chunks: Vec<ChunkNode>,
    chunk_index: HashMap<String, usize>,
    entities: Vec<Entity>,
    entity_index: HashMap<String, usize>,
    /// (chunk_id, entity_id) -> confidence, in insertion order
    mentions: Vec<(String, String, f64)>,
    mention_index: HashMap<(String, String), usize>,
}

/// Process-local graph store with the same semantics as the Neo4j store.
/// Ties are broken by insertion order.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    state: RwLock<GraphState>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn add_document(&self, document: &Document) -> Result<()> {
        self.state.write().await.documents.insert(document.id.clone());
        Ok(())
    }

    async fn add_chunk(&self, chunk: &Chunk) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.documents.contains(chunk.doc_id()) {
            debug!(chunk_id = %chunk.id, "Parent document missing, chunk not added");
            return Ok(());
        }

        let node = ChunkNode {
            id: chunk.id.clone(),
            doc_id: chunk.doc_id().to_string(),
            text: chunk.text.clone(),
            language: chunk.language.clone(),
        };
        match state.chunk_index.get(&chunk.id).copied() {
            Some(i) => state.chunks[i] = node,
            None => {
                let i = state.chunks.len();
                state.chunk_index.insert(chunk.id.clone(), i);
                state.chunks.push(node);
            }
        }
        Ok(())
    }

    async fn add_entity(&self, entity: &Entity) -> Result<()> {
        let mut state = self.state.write().await;
        match state.entity_index.get(&entity.id).copied() {
            Some(i) => state.entities[i] = entity.clone(),
            None => {
                let i = state.entities.len();
                state.entity_index.insert(entity.id.clone(), i);
                state.entities.push(entity.clone());
            }
        }
        Ok(())
    }

    async fn link_chunk_to_entity(
        &self,
        chunk_id: &str,
        entity_id: &str,
        confidence: f64,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.chunk_index.contains_key(chunk_id) || !state.entity_index.contains_key(entity_id) {
            debug!(chunk_id, entity_id, "Mention endpoint missing, link skipped");
            return Ok(());
        }

        let key = (chunk_id.to_string(), entity_id.to_string());
        match state.mention_index.get(&key).copied() {
            Some(i) => state.mentions[i].2 = confidence,
            None => {
                let i = state.mentions.len();
                state.mention_index.insert(key, i);
                state
                    .mentions
                    .push((chunk_id.to_string(), entity_id.to_string(), confidence));
            }
        }
        Ok(())
    }

    async fn find_entities_by_name(
        &self,
        name: &str,
        language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Entity>> {
        let state = self.state.read().await;
        let mut matches: Vec<Entity> = state
            .entities
            .iter()
            .filter(|e| e.name.contains(name))
            .filter(|e| language.is_none_or(|lang| e.language == lang))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn find_chunks_by_entities(
        &self,
        entity_ids: &[String],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let state = self.state.read().await;
        let wanted: HashSet<&str> = entity_ids.iter().map(String::as_str).collect();

        let mut order: Vec<&str> = Vec::new();
        let mut scores: HashMap<&str, f64> = HashMap::new();
        for (chunk_id, entity_id, confidence) in &state.mentions {
            if !wanted.contains(entity_id.as_str()) {
                continue;
            }
            let Some(&e) = state.entity_index.get(entity_id) else {
                continue;
            };
            let contribution = confidence * state.entities[e].confidence;
            let total = scores.entry(chunk_id.as_str()).or_insert_with(|| {
                order.push(chunk_id.as_str());
                0.0
            });
            *total += contribution;
        }

        let mut results: Vec<ScoredChunk> = order
            .into_iter()
            .filter_map(|chunk_id| {
                let node = &state.chunks[*state.chunk_index.get(chunk_id)?];
                Some(ScoredChunk {
                    id: node.id.clone(),
                    doc_id: node.doc_id.clone(),
                    text: node.text.clone(),
                    language: node.language.clone(),
                    score: scores[chunk_id],
                })
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        Ok(results)
    }

    async fn stats(&self) -> Result<GraphStats> {
        let state = self.state.read().await;
        Ok(GraphStats {
            documents: state.documents.len(),
            chunks: state.chunks.len(),
            entities: state.entities.len(),
            mentions: state.mentions.len(),
        })
    }

    async fn clear(&self) -> Result<()> {
        *self.state.write().await = GraphState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::{EntityType, generate_entity_id};

    fn entity(name: &str, language: &str, confidence: f64) -> Entity {
        Entity {
            id: generate_entity_id(name, language),
            name: name.to_string(),
            entity_type: EntityType::Concept,
            language: language.to_string(),
            confidence,
        }
    }

    async fn seeded() -> (InMemoryGraphStore, Vec<Chunk>) {
        let store = InMemoryGraphStore::new();
        let doc = Document::with_id(
            "doc1",
            "Neo4j stores graphs\n\nQdrant stores vectors\n\nNeo4j and Qdrant".to_string(),
            "en".to_string(),
        );
        store.add_document(&doc).await.unwrap();

        let chunks = ingest::chunk_document(&doc);
        for chunk in &chunks {
            store.add_chunk(chunk).await.unwrap();
        }

        let neo = entity("Neo4j", "en", 0.9);
        let qdrant = entity("Qdrant", "en", 0.5);
        store.add_entity(&neo).await.unwrap();
        store.add_entity(&qdrant).await.unwrap();

        store.link_chunk_to_entity(&chunks[0].id, &neo.id, 1.0).await.unwrap();
        store.link_chunk_to_entity(&chunks[1].id, &qdrant.id, 1.0).await.unwrap();
        store.link_chunk_to_entity(&chunks[2].id, &neo.id, 0.5).await.unwrap();
        store.link_chunk_to_entity(&chunks[2].id, &qdrant.id, 0.8).await.unwrap();
        (store, chunks)
    }

    #[tokio::test]
    async fn test_find_chunks_aggregates_mentions() {
        let (store, chunks) = seeded().await;
        let ids = vec![
            generate_entity_id("Neo4j", "en"),
            generate_entity_id("Qdrant", "en"),
        ];

        let hits = store.find_chunks_by_entities(&ids, 10).await.unwrap();
        assert_eq!(hits.len(), 3);
        // chunk 0: 1.0*0.9, chunk 2: 0.5*0.9 + 0.8*0.5, chunk 1: 1.0*0.5
        assert_eq!(hits[0].id, chunks[0].id);
        assert!((hits[0].score - 0.9).abs() < 1e-9);
        assert_eq!(hits[1].id, chunks[2].id);
        assert!((hits[1].score - 0.85).abs() < 1e-9);
        assert_eq!(hits[2].id, chunks[1].id);
        assert_eq!(hits[0].doc_id, "doc1");
    }

    #[tokio::test]
    async fn test_duplicate_entity_ids_count_edges_once() {
        let (store, chunks) = seeded().await;
        let neo = generate_entity_id("Neo4j", "en");
        let hits = store
            .find_chunks_by_entities(&[neo.clone(), neo], 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, chunks[0].id);
        assert!((hits[0].score - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_find_entities_by_name_is_substring_and_language_scoped() {
        let (store, _) = seeded().await;
        store.add_entity(&entity("Neo4j Aura", "en", 0.95)).await.unwrap();
        store.add_entity(&entity("Neo4j", "es", 0.99)).await.unwrap();

        let found = store.find_entities_by_name("Neo4j", Some("en"), 3).await.unwrap();
        let names: Vec<&str> = found.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Neo4j Aura", "Neo4j"]);

        assert_eq!(store.find_entities_by_name("Neo4j", None, 10).await.unwrap().len(), 3);
        // case-sensitive
        assert!(store.find_entities_by_name("neo4j", Some("en"), 3).await.unwrap().is_empty());
        assert_eq!(store.find_entities_by_name("Neo", None, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_relink_overwrites_confidence() {
        let (store, chunks) = seeded().await;
        let neo = generate_entity_id("Neo4j", "en");
        store.link_chunk_to_entity(&chunks[0].id, &neo, 0.1).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.mentions, 4);

        let hits = store.find_chunks_by_entities(&[neo], 10).await.unwrap();
        let first = hits.iter().find(|h| h.id == chunks[0].id).unwrap();
        assert!((first.score - 0.09).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_orphans_are_not_attached() {
        let store = InMemoryGraphStore::new();
        let orphan = Chunk::new("nodoc", 0, "text".into(), "en".into(), "s".into());
        store.add_chunk(&orphan).await.unwrap();
        store.add_entity(&entity("Rust", "en", 0.7)).await.unwrap();
        store
            .link_chunk_to_entity(&orphan.id, &generate_entity_id("Rust", "en"), 1.0)
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            GraphStats { documents: 0, chunks: 0, entities: 1, mentions: 0 }
        );
    }

    #[tokio::test]
    async fn test_clear_empties_everything() {
        let (store, _) = seeded().await;
        assert_eq!(store.stats().await.unwrap().chunks, 3);

        store.clear().await.unwrap();
        assert_eq!(store.stats().await.unwrap(), GraphStats::default());
        assert!(store.find_entities_by_name("Neo4j", None, 3).await.unwrap().is_empty());
    }
}
