use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, info};

use ingest::Chunk;

use crate::dense::DenseIndex;
use crate::embeddings::EmbeddingClient;
use crate::types::MethodResult;

pub struct QdrantIndexer {
    base_url: String,
    client: reqwest::Client,
    embedding_client: EmbeddingClient,
    collection_name: String,
}

#[derive(Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: String,
}

#[derive(Serialize)]
struct UpsertPoints {
    points: Vec<Point>,
}

#[derive(Serialize)]
struct Point {
    id: u64,
    vector: Vec<f32>,
    payload: HashMap<String, Value>,
}

#[derive(Serialize)]
struct SearchRequest {
    vector: Vec<f32>,
    limit: usize,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f64,
    #[serde(default)]
    payload: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct CollectionInfo {
    result: CollectionResult,
}

#[derive(Deserialize)]
struct CollectionResult {
    collections: Vec<Collection>,
}

#[derive(Deserialize)]
struct Collection {
    name: String,
}

impl QdrantIndexer {
    pub fn new(
        base_url: String,
        embedding_client: EmbeddingClient,
        collection_name: String,
    ) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
            embedding_client,
            collection_name,
        }
    }

    /// Initialize collection with proper schema
    pub async fn init_collection(&self) -> Result<()> {
        // Check if collection exists
        let url = format!("{}/collections", self.base_url);
        let response = self.client.get(&url).send().await
            .context("Failed to reach Qdrant")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to list collections: {}", response.status());
        }

        let info: CollectionInfo = response.json().await?;
        let exists = info.result.collections.iter()
            .any(|c| c.name == self.collection_name);

        if exists {
            debug!(collection = %self.collection_name, "Collection already exists");
            return Ok(());
        }

        // Get embedding dimension
        let dimension = self.embedding_client.get_dimension().await?;

        let url = format!("{}/collections/{}", self.base_url, self.collection_name);
        let create_req = CreateCollection {
            vectors: VectorParams {
                size: dimension,
                distance: "Cosine".to_string(),
            },
        };

        let response = self.client
            .put(&url)
            .json(&create_req)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            anyhow::bail!("Failed to create collection: {}", error_text);
        }

        info!(collection = %self.collection_name, dimension, "Qdrant collection created");
        Ok(())
    }

    async fn delete_collection(&self) -> Result<()> {
        let url = format!("{}/collections/{}", self.base_url, self.collection_name);
        let response = self.client.delete(&url).send().await
            .context("Failed to delete collection")?;

        // 404 means it was already gone
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            let error_text = response.text().await?;
            anyhow::bail!("Failed to delete collection: {}", error_text);
        }
        Ok(())
    }
}

/// Stable point id derived from a chunk id (first 8 bytes of SHA-256).
pub fn point_id(chunk_id: &str) -> u64 {
    let digest = Sha256::digest(chunk_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

fn chunk_payload(chunk: &Chunk) -> HashMap<String, Value> {
    HashMap::from([
        ("chunk_id".to_string(), json!(chunk.id)),
        ("doc_id".to_string(), json!(chunk.doc_id())),
        ("text".to_string(), json!(chunk.text)),
        ("language".to_string(), json!(chunk.language)),
        ("chunk_index".to_string(), json!(chunk.metadata.chunk_index)),
        ("source".to_string(), json!(chunk.metadata.source)),
    ])
}

fn language_filter(language: &str) -> Option<Value> {
    if language.is_empty() {
        return None;
    }
    Some(json!({
        "must": [{"key": "language", "match": {"value": language}}]
    }))
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Points without a `chunk_id` are skipped so they never fuse under one id.
fn to_method_results(points: Vec<ScoredPoint>) -> Vec<MethodResult> {
    points
        .into_iter()
        .filter_map(|point| {
            let id = point.payload.get("chunk_id").and_then(Value::as_str)?;
            if id.is_empty() {
                return None;
            }
            Some((id.to_string(), point))
        })
        .enumerate()
        .map(|(i, (id, point))| MethodResult {
            id,
            score: point.score,
            rank: i + 1,
            text: payload_str(&point.payload, "text"),
            language: payload_str(&point.payload, "language"),
        })
        .collect()
}

#[async_trait]
impl DenseIndex for QdrantIndexer {
    async fn search(&self, query: &str, top_k: usize, language: &str) -> Result<Vec<MethodResult>> {
        let vector = self.embedding_client
            .embed(query)
            .await
            .context("Failed to embed query")?;

        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection_name
        );
        let request = SearchRequest {
            vector,
            limit: top_k,
            with_payload: true,
            filter: language_filter(language),
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send search request")?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            anyhow::bail!("Qdrant search failed: {}", error_text);
        }

        let search: SearchResponse = response
            .json()
            .await
            .context("Failed to parse search response")?;

        Ok(to_method_results(search.result))
    }

    async fn index_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = self.embedding_client
                .embed(&chunk.text)
                .await
                .context("Failed to generate embedding")?;

            points.push(Point {
                id: point_id(&chunk.id),
                vector: embedding,
                payload: chunk_payload(chunk),
            });
        }

        let url = format!(
            "{}/collections/{}/points?wait=true",
            self.base_url, self.collection_name
        );

        let response = self.client
            .put(&url)
            .json(&UpsertPoints { points })
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            anyhow::bail!("Failed to upsert points: {}", error_text);
        }

        debug!(count = chunks.len(), "Upserted chunks into Qdrant");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.delete_collection().await?;
        self.init_collection().await?;
        info!(collection = %self.collection_name, "Qdrant collection reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_stable() {
        assert_eq!(point_id("doc_chunk_0"), point_id("doc_chunk_0"));
        assert_ne!(point_id("doc_chunk_0"), point_id("doc_chunk_1"));
    }

    #[test]
    fn test_payload_carries_chunk_fields() {
        let chunk = Chunk::new("doc", 2, "hola".into(), "es".into(), "a.txt".into());
        let payload = chunk_payload(&chunk);
        assert_eq!(payload_str(&payload, "chunk_id"), "doc_chunk_2");
        assert_eq!(payload_str(&payload, "doc_id"), "doc");
        assert_eq!(payload_str(&payload, "language"), "es");
        assert_eq!(payload["chunk_index"], json!(2));
    }

    #[test]
    fn test_language_filter() {
        assert!(language_filter("").is_none());
        let filter = language_filter("ar").unwrap();
        assert_eq!(filter["must"][0]["match"]["value"], "ar");
    }

    #[test]
    fn test_points_without_chunk_id_are_skipped() {
        let response: SearchResponse = serde_json::from_value(json!({
            "result": [
                {"score": 0.9, "payload": {"text": "orphan"}},
                {"score": 0.8, "payload": {"chunk_id": "doc_chunk_1", "text": "kept", "language": "en"}},
                {"score": 0.7},
                {"score": 0.6, "payload": {"chunk_id": "", "text": "blank"}},
                {"score": 0.5, "payload": {"chunk_id": "doc_chunk_4", "text": "also kept", "language": "en"}}
            ]
        }))
        .unwrap();

        let results = to_method_results(response.result);
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["doc_chunk_1", "doc_chunk_4"]);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].rank, 2);
        assert_eq!(results[1].score, 0.5);
    }
}
