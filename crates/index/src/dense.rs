use anyhow::Result;
use async_trait::async_trait;

use ingest::Chunk;

use crate::types::MethodResult;

/// Semantic (embedding similarity) retrieval over chunks.
#[async_trait]
pub trait DenseIndex: Send + Sync {
    /// Nearest chunks to `query`. An empty `language` searches every language.
    async fn search(&self, query: &str, top_k: usize, language: &str) -> Result<Vec<MethodResult>>;

    /// Upsert chunks, keyed by chunk id.
    async fn index_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}
