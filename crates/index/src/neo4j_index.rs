use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{Graph, Query, Row};
use tracing::{debug, info, warn};

use extract::{Entity, EntityType};
use ingest::{Chunk, Document};

use crate::graph_store::{GraphStats, GraphStore, ScoredChunk};

pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .with_context(|| format!("Failed to connect to Neo4j at {}", uri))?;
        info!(uri, "Connected to Neo4j");
        Ok(Self::new(graph))
    }

    /// Create uniqueness constraints and lookup indexes
    pub async fn init_schema(&self) -> Result<()> {
        let statements = [
            "CREATE CONSTRAINT IF NOT EXISTS FOR (d:Document) REQUIRE d.id IS UNIQUE",
            "CREATE CONSTRAINT IF NOT EXISTS FOR (c:Chunk) REQUIRE c.id IS UNIQUE",
            "CREATE CONSTRAINT IF NOT EXISTS FOR (e:Entity) REQUIRE e.id IS UNIQUE",
            "CREATE INDEX IF NOT EXISTS FOR (e:Entity) ON (e.name)",
            "CREATE INDEX IF NOT EXISTS FOR (e:Entity) ON (e.type)",
            "CREATE INDEX IF NOT EXISTS FOR (e:Entity) ON (e.language)",
            "CREATE INDEX IF NOT EXISTS FOR (c:Chunk) ON (c.doc_id)",
        ];

        for statement in statements {
            if let Err(e) = self.graph.run(Query::new(statement.to_string())).await {
                warn!(statement, error = %e, "Schema statement failed");
            }
        }

        info!("Neo4j schema ready");
        Ok(())
    }

    async fn count(&self, cypher: &str) -> Result<usize> {
        let mut result = self.graph.execute(Query::new(cypher.to_string())).await?;
        let count = if let Some(row) = result.next().await? {
            row.get::<i64>("count").unwrap_or(0) as usize
        } else {
            0
        };
        Ok(count)
    }
}

fn entity_from_row(row: &Row) -> Result<Entity> {
    let entity_type: String = row.get("type").unwrap_or_default();
    Ok(Entity {
        id: row.get("id").context("Entity row without id")?,
        name: row.get("name").context("Entity row without name")?,
        entity_type: EntityType::from_label(&entity_type),
        language: row.get("language").unwrap_or_default(),
        confidence: row.get("confidence").unwrap_or(0.0),
    })
}

fn scored_chunk_from_row(row: &Row) -> Result<ScoredChunk> {
    Ok(ScoredChunk {
        id: row.get("id").context("Chunk row without id")?,
        doc_id: row.get("doc_id").unwrap_or_default(),
        text: row.get("text").unwrap_or_default(),
        language: row.get("language").unwrap_or_default(),
        score: row.get("score").context("Chunk row without score")?,
    })
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn add_document(&self, document: &Document) -> Result<()> {
        let query = Query::new(
            r#"
            MERGE (d:Document {id: $doc_id})
            SET d.title = $title,
                d.language = $language,
                d.created_at = datetime()
            "#
            .to_string(),
        )
        .param("doc_id", document.id.clone())
        .param("title", document.source().to_string())
        .param("language", document.language.clone());

        self.graph.run(query).await
            .context("Failed to add document")?;

        debug!(doc_id = %document.id, "Added document");
        Ok(())
    }

    async fn add_chunk(&self, chunk: &Chunk) -> Result<()> {
        let query = Query::new(
            r#"
            MATCH (d:Document {id: $doc_id})
            MERGE (c:Chunk {id: $chunk_id})
            SET c.text = $text,
                c.language = $language,
                c.doc_id = $doc_id,
                c.chunk_index = $chunk_index
            MERGE (d)-[:CONTAINS]->(c)
            "#
            .to_string(),
        )
        .param("doc_id", chunk.doc_id().to_string())
        .param("chunk_id", chunk.id.clone())
        .param("text", chunk.text.clone())
        .param("language", chunk.language.clone())
        .param("chunk_index", chunk.metadata.chunk_index as i64);

        self.graph.run(query).await
            .context("Failed to add chunk")?;

        Ok(())
    }

    async fn add_entity(&self, entity: &Entity) -> Result<()> {
        let query = Query::new(
            r#"
            MERGE (e:Entity {id: $id})
            SET e.name = $name,
                e.type = $type,
                e.language = $language,
                e.confidence = $confidence,
                e.updated_at = datetime()
            "#
            .to_string(),
        )
        .param("id", entity.id.clone())
        .param("name", entity.name.clone())
        .param("type", entity.entity_type.as_str())
        .param("language", entity.language.clone())
        .param("confidence", entity.confidence);

        self.graph.run(query).await
            .context("Failed to add entity")?;

        Ok(())
    }

    async fn link_chunk_to_entity(
        &self,
        chunk_id: &str,
        entity_id: &str,
        confidence: f64,
    ) -> Result<()> {
        let query = Query::new(
            r#"
            MATCH (c:Chunk {id: $chunk_id})
            MATCH (e:Entity {id: $entity_id})
            MERGE (c)-[m:MENTIONS]->(e)
            SET m.confidence = $confidence
            "#
            .to_string(),
        )
        .param("chunk_id", chunk_id.to_string())
        .param("entity_id", entity_id.to_string())
        .param("confidence", confidence);

        self.graph.run(query).await
            .context("Failed to link chunk to entity")?;

        Ok(())
    }

    async fn find_entities_by_name(
        &self,
        name: &str,
        language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Entity>> {
        let language_filter = if language.is_some() {
            "AND e.language = $language"
        } else {
            ""
        };
        let cypher = format!(
            r#"
            MATCH (e:Entity)
            WHERE e.name CONTAINS $name {}
            RETURN e.id AS id, e.name AS name, e.type AS type,
                   e.language AS language, e.confidence AS confidence
            ORDER BY e.confidence DESC
            LIMIT $limit
            "#,
            language_filter
        );

        let mut query = Query::new(cypher)
            .param("name", name.to_string())
            .param("limit", limit as i64);
        if let Some(language) = language {
            query = query.param("language", language.to_string());
        }

        let mut result = self.graph.execute(query).await
            .context("Failed to search entities by name")?;

        let mut entities = Vec::new();
        while let Some(row) = result.next().await? {
            entities.push(entity_from_row(&row)?);
        }
        Ok(entities)
    }

    async fn find_chunks_by_entities(
        &self,
        entity_ids: &[String],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = Query::new(
            r#"
            MATCH (c:Chunk)-[m:MENTIONS]->(e:Entity)
            WHERE e.id IN $entity_ids
            WITH c, sum(m.confidence * e.confidence) AS score
            ORDER BY score DESC
            LIMIT $top_k
            RETURN c.id AS id, c.doc_id AS doc_id, c.text AS text,
                   c.language AS language, score
            "#
            .to_string(),
        )
        .param("entity_ids", entity_ids.to_vec())
        .param("top_k", top_k as i64);

        let mut result = self.graph.execute(query).await
            .context("Failed to find chunks by entities")?;

        let mut chunks = Vec::new();
        while let Some(row) = result.next().await? {
            chunks.push(scored_chunk_from_row(&row)?);
        }
        Ok(chunks)
    }

    async fn stats(&self) -> Result<GraphStats> {
        // Counted separately to avoid a cross product
        Ok(GraphStats {
            documents: self.count("MATCH (d:Document) RETURN count(d) AS count").await?,
            chunks: self.count("MATCH (c:Chunk) RETURN count(c) AS count").await?,
            entities: self.count("MATCH (e:Entity) RETURN count(e) AS count").await?,
            mentions: self
                .count("MATCH ()-[m:MENTIONS]->() RETURN count(m) AS count")
                .await?,
        })
    }

    async fn clear(&self) -> Result<()> {
        self.graph
            .run(Query::new("MATCH (n) DETACH DELETE n".to_string()))
            .await
            .context("Failed to clear graph")?;

        info!("Cleared all nodes and relationships from Neo4j");
        Ok(())
    }
}
