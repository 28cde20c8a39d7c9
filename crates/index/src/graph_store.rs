use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use extract::Entity;
use ingest::{Chunk, Document};

/// Chunk reached through mention edges, scored by
/// `Σ mention.confidence × entity.confidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub doc_id: String,
    pub text: String,
    pub language: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub documents: usize,
    pub chunks: usize,
    pub entities: usize,
    pub mentions: usize,
}

/// Knowledge graph of documents, chunks and entities.
///
/// Schema:
/// ```text
/// (:Document)-[:CONTAINS]->(:Chunk)-[:MENTIONS {confidence}]->(:Entity)
/// ```
/// A chunk is only attached when its document exists, and a mention only
/// when both ends exist. Re-linking a chunk to an entity overwrites the
/// mention confidence.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn add_document(&self, document: &Document) -> Result<()>;

    async fn add_chunk(&self, chunk: &Chunk) -> Result<()>;

    /// Insert or update an entity (matched by id).
    async fn add_entity(&self, entity: &Entity) -> Result<()>;

    async fn link_chunk_to_entity(
        &self,
        chunk_id: &str,
        entity_id: &str,
        confidence: f64,
    ) -> Result<()>;

    /// Entities whose name contains `name` (case-sensitive), optionally
    /// restricted to one language, highest confidence first.
    async fn find_entities_by_name(
        &self,
        name: &str,
        language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Entity>>;

    /// Chunks mentioning any of `entity_ids`, best aggregated score first.
    async fn find_chunks_by_entities(
        &self,
        entity_ids: &[String],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>>;

    async fn stats(&self) -> Result<GraphStats>;

    /// Remove every node and edge.
    async fn clear(&self) -> Result<()>;
}
