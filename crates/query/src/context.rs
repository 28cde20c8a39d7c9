use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use extract::{Entity, EntityExtractor, LlmEntityExtractor, OllamaClient};
use index::{
    Bm25Index, DenseIndex, EmbeddingClient, GraphStats, GraphStore, Neo4jGraphStore, QdrantIndexer,
};
use ingest::{Chunk, Chunker, Document};

use crate::chat::{ChatMessage, ChatService};
use crate::config::SearchConfig;
use crate::error::RetrievalError;
use crate::graph_retriever::GraphRetriever;
use crate::llm::{QueryLLM, TextGenerator};
use crate::metrics::{MetricsSnapshot, QueryMetrics, TimedOperation};
use crate::orchestrator::Orchestrator;
use crate::types::{FusedResult, RetrievalMethod, SearchRequest, SearchResponse};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: String,
    pub chunks_created: usize,
    pub entities_extracted: usize,
    pub mentions_linked: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub chunks_indexed: usize,
    pub bm25_avgdl: f64,
    pub graph: Option<GraphStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub request_id: String,
    pub answer: String,
    pub sources: Vec<FusedResult>,
    pub methods_used: Vec<RetrievalMethod>,
    pub total_time_ms: f64,
}

/// Everything a request needs: the corpus, the retrievers and the
/// optional answer generator.
///
/// Searches only take read locks. Writers (ingest, clear) are serialized
/// through `writer` and swap the BM25 index wholesale.
pub struct ServiceContext {
    orchestrator: Orchestrator,
    corpus: RwLock<Vec<Chunk>>,
    writer: Mutex<()>,
    chunker: Chunker,
    chat: Option<ChatService>,
}

impl ServiceContext {
    /// Lexical-only context; add collaborators with the `with_*` builders.
    pub fn new(config: SearchConfig) -> Self {
        let bm25 = Bm25Index::new(config.bm25.k1, config.bm25.b);
        Self {
            orchestrator: Orchestrator::new(Arc::new(RwLock::new(bm25)), config),
            corpus: RwLock::new(Vec::new()),
            writer: Mutex::new(()),
            chunker: Chunker::default(),
            chat: None,
        }
    }

    pub fn with_dense(mut self, dense: Arc<dyn DenseIndex>) -> Self {
        self.orchestrator = self.orchestrator.with_dense(dense);
        self
    }

    pub fn with_graph(
        mut self,
        store: Arc<dyn GraphStore>,
        extractor: Arc<dyn EntityExtractor>,
    ) -> Self {
        let limit = self.orchestrator.config().graph.entity_match_limit;
        let retriever = GraphRetriever::new(store, extractor).with_entity_match_limit(limit);
        self.orchestrator = self.orchestrator.with_graph(retriever);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        let answer = &self.orchestrator.config().answer;
        self.chat = Some(
            ChatService::new(generator).with_limits(answer.context_chunks, answer.history_messages),
        );
        self
    }

    /// Build the full stack from `config.endpoints`. A collaborator that
    /// cannot be reached is left out and its method abstains.
    pub async fn connect(config: SearchConfig) -> Self {
        let endpoints = config.endpoints.clone();
        let mut context = Self::new(config);

        match Neo4jGraphStore::connect(
            &endpoints.neo4j_uri,
            &endpoints.neo4j_user,
            &endpoints.neo4j_password,
        )
        .await
        {
            Ok(store) => {
                if let Err(e) = store.init_schema().await {
                    warn!(error = %e, "Neo4j schema setup failed");
                }
                let extractor = LlmEntityExtractor::new(OllamaClient::new(
                    endpoints.ollama_url.clone(),
                    endpoints.llm_model.clone(),
                ));
                context = context.with_graph(Arc::new(store), Arc::new(extractor));
            }
            Err(e) => warn!(error = %format!("{:#}", e), "Graph retrieval disabled"),
        }

        let embeddings = EmbeddingClient::new(
            endpoints.ollama_url.clone(),
            endpoints.embedding_model.clone(),
        );
        let qdrant = QdrantIndexer::new(
            endpoints.qdrant_url.clone(),
            embeddings,
            endpoints.qdrant_collection.clone(),
        );
        match qdrant.init_collection().await {
            Ok(()) => context = context.with_dense(Arc::new(qdrant)),
            Err(e) => warn!(error = %format!("{:#}", e), "Dense retrieval disabled"),
        }

        context.with_generator(Arc::new(QueryLLM::from_endpoints(&endpoints)))
    }

    pub fn config(&self) -> &SearchConfig {
        self.orchestrator.config()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.orchestrator.metrics().snapshot()
    }

    pub fn query_metrics(&self) -> &Arc<QueryMetrics> {
        self.orchestrator.metrics()
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, RetrievalError> {
        self.orchestrator.search(request).await
    }

    /// Chunk a document, populate the graph, and reindex.
    pub async fn ingest_document(&self, document: &Document) -> Result<IngestReport> {
        let _writer = self.writer.lock().await;
        let timer = TimedOperation::start();

        let chunks = self.chunker.chunk_document(document);
        let mut report = IngestReport {
            document_id: document.id.clone(),
            chunks_created: chunks.len(),
            entities_extracted: 0,
            mentions_linked: 0,
        };
        if chunks.is_empty() {
            warn!(doc_id = %document.id, "Document produced no chunks");
            return Ok(report);
        }

        if let Some(graph) = self.orchestrator.graph() {
            self.populate_graph(graph, document, &chunks, &mut report).await;
        }

        {
            let mut corpus = self.corpus.write().await;
            for chunk in &chunks {
                match corpus.iter_mut().find(|c| c.id == chunk.id) {
                    Some(existing) => *existing = chunk.clone(),
                    None => corpus.push(chunk.clone()),
                }
            }
            self.orchestrator.bm25().write().await.index(&corpus);
        }

        if let Some(dense) = self.orchestrator.dense() {
            if let Err(e) = dense.index_chunks(&chunks).await {
                warn!(doc_id = %document.id, error = %format!("{:#}", e), "Dense indexing failed");
            }
        }

        info!(
            doc_id = %document.id,
            chunks = report.chunks_created,
            entities = report.entities_extracted,
            mentions = report.mentions_linked,
            elapsed_ms = timer.elapsed_ms(),
            "Document ingested"
        );
        Ok(report)
    }

    async fn populate_graph(
        &self,
        graph: &GraphRetriever,
        document: &Document,
        chunks: &[Chunk],
        report: &mut IngestReport,
    ) {
        let store = graph.store();
        if let Err(e) = store.add_document(document).await {
            warn!(doc_id = %document.id, error = %format!("{:#}", e), "Graph document insert failed");
            return;
        }

        for chunk in chunks {
            if let Err(e) = store.add_chunk(chunk).await {
                warn!(chunk_id = %chunk.id, error = %format!("{:#}", e), "Graph chunk insert failed");
                continue;
            }

            let extracted = match graph.extractor().extract(&chunk.text, &chunk.language).await {
                Ok(entities) => entities,
                Err(e) => {
                    warn!(chunk_id = %chunk.id, error = %format!("{:#}", e), "Entity extraction failed");
                    continue;
                }
            };

            for extracted_entity in &extracted {
                let entity = Entity::from(extracted_entity);
                if let Err(e) = store.add_entity(&entity).await {
                    warn!(entity = %entity.name, error = %format!("{:#}", e), "Entity insert failed");
                    continue;
                }
                report.entities_extracted += 1;

                match store
                    .link_chunk_to_entity(&chunk.id, &entity.id, entity.confidence)
                    .await
                {
                    Ok(()) => report.mentions_linked += 1,
                    Err(e) => {
                        warn!(chunk_id = %chunk.id, entity = %entity.name, error = %format!("{:#}", e), "Mention link failed")
                    }
                }
            }
        }
    }

    /// Drop every indexed chunk from all stores.
    pub async fn clear(&self) {
        let _writer = self.writer.lock().await;

        self.corpus.write().await.clear();
        self.orchestrator.bm25().write().await.clear();

        if let Some(dense) = self.orchestrator.dense() {
            if let Err(e) = dense.clear().await {
                warn!(error = %format!("{:#}", e), "Dense index clear failed");
            }
        }
        if let Some(graph) = self.orchestrator.graph() {
            if let Err(e) = graph.store().clear().await {
                warn!(error = %format!("{:#}", e), "Graph clear failed");
            }
        }

        info!("All indexes cleared");
    }

    pub async fn stats(&self) -> ServiceStats {
        let chunks_indexed = self.corpus.read().await.len();
        let bm25_avgdl = self.orchestrator.bm25().read().await.avgdl();

        let graph = match self.orchestrator.graph() {
            Some(graph) => match graph.store().stats().await {
                Ok(stats) => Some(stats),
                Err(e) => {
                    warn!(error = %format!("{:#}", e), "Graph stats unavailable");
                    None
                }
            },
            None => None,
        };

        ServiceStats {
            chunks_indexed,
            bm25_avgdl,
            graph,
        }
    }

    /// Retrieve, then synthesize an answer from the top fused chunks.
    pub async fn answer(
        &self,
        request: &SearchRequest,
        history: &[ChatMessage],
    ) -> Result<AnswerResponse> {
        let timer = TimedOperation::start();
        let chat = self.chat.as_ref().context("No text generator configured")?;

        let response = self.search(request).await?;
        let sources: Vec<FusedResult> = response
            .results
            .into_iter()
            .take(self.config().answer.context_chunks)
            .collect();

        let answer = chat
            .respond(&response.query, &sources, history, &response.language)
            .await?;

        Ok(AnswerResponse {
            request_id: response.request_id,
            answer,
            sources,
            methods_used: response.methods_used,
            total_time_ms: timer.elapsed_ms(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use extract::{EntityType, GazetteerEntry, GazetteerExtractor};
    use index::InMemoryGraphStore;

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("  {} chars of prompt  ", prompt.len()))
        }
    }

    fn offline_context() -> ServiceContext {
        let extractor = GazetteerExtractor::new(
            vec![
                GazetteerEntry::new("Rust", EntityType::Product),
                GazetteerEntry::new("Mozilla", EntityType::Organization),
                GazetteerEntry::new("Madrid", EntityType::Location).in_language("es"),
            ],
            0.9,
        )
        .unwrap();

        ServiceContext::new(SearchConfig::default())
            .with_graph(Arc::new(InMemoryGraphStore::new()), Arc::new(extractor))
            .with_generator(Arc::new(EchoGenerator))
    }

    fn rust_doc() -> Document {
        Document::with_id(
            "rustdoc",
            "Rust was started at Mozilla\n\nRust has no garbage collector\n\nPasta recipes from Italy",
            "en",
        )
    }

    #[tokio::test]
    async fn test_ingest_populates_every_index() {
        let context = offline_context();
        let report = context.ingest_document(&rust_doc()).await.unwrap();

        assert_eq!(report.document_id, "rustdoc");
        assert_eq!(report.chunks_created, 3);
        // chunk 0: Rust, Mozilla; chunk 1: Rust
        assert_eq!(report.entities_extracted, 3);
        assert_eq!(report.mentions_linked, 3);

        let stats = context.stats().await;
        assert_eq!(stats.chunks_indexed, 3);
        assert!(stats.bm25_avgdl > 0.0);
        assert_eq!(
            stats.graph,
            Some(GraphStats { documents: 1, chunks: 3, entities: 2, mentions: 3 })
        );
    }

    #[tokio::test]
    async fn test_hybrid_search_fuses_bm25_and_graph() {
        let context = offline_context();
        context.ingest_document(&rust_doc()).await.unwrap();

        let request = SearchRequest::new("Who started Rust at Mozilla?");
        let response = context.search(&request).await.unwrap();

        assert_eq!(response.results[0].id, "rustdoc_chunk_0");
        assert!(response.results[0].method_scores.contains_key("bm25"));
        assert!(response.results[0].method_scores.contains_key("graph"));
        assert_eq!(
            response.abstained.iter().map(|a| a.method).collect::<Vec<_>>(),
            vec![RetrievalMethod::Dense]
        );
    }

    #[tokio::test]
    async fn test_reingest_replaces_chunks_by_id() {
        let context = offline_context();
        context.ingest_document(&rust_doc()).await.unwrap();
        context.ingest_document(&rust_doc()).await.unwrap();
        assert_eq!(context.stats().await.chunks_indexed, 3);

        let spanish = Document::with_id("esdoc", "Vivo en Madrid", "es");
        context.ingest_document(&spanish).await.unwrap();
        assert_eq!(context.stats().await.chunks_indexed, 4);
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let context = offline_context();
        context.ingest_document(&rust_doc()).await.unwrap();
        context.clear().await;

        let stats = context.stats().await;
        assert_eq!(stats.chunks_indexed, 0);
        assert_eq!(stats.bm25_avgdl, 0.0);
        assert_eq!(stats.graph, Some(GraphStats::default()));

        let err = context.search(&SearchRequest::new("Rust")).await.unwrap_err();
        assert_eq!(
            err,
            RetrievalError::NoResults {
                ran: vec![RetrievalMethod::Bm25, RetrievalMethod::Graph],
                abstained: vec![RetrievalMethod::Dense],
            }
        );
    }

    #[tokio::test]
    async fn test_answer_uses_fused_sources() {
        let context = offline_context();
        context.ingest_document(&rust_doc()).await.unwrap();

        let answer = context
            .answer(
                &SearchRequest::new("garbage collector"),
                &[ChatMessage::user("hello")],
            )
            .await
            .unwrap();

        assert!(answer.answer.ends_with("chars of prompt"));
        assert_eq!(answer.sources[0].id, "rustdoc_chunk_1");
        assert!(answer.sources.len() <= 5);
    }

    #[tokio::test]
    async fn test_answer_without_generator_fails() {
        let context = ServiceContext::new(SearchConfig::lexical_only());
        let err = context
            .answer(&SearchRequest::new("anything"), &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No text generator"));
    }

    #[tokio::test]
    async fn test_empty_document_creates_nothing() {
        let context = offline_context();
        let report = context
            .ingest_document(&Document::with_id("blank", "\n\n  \n\n", "en"))
            .await
            .unwrap();
        assert_eq!(report.chunks_created, 0);
        assert_eq!(context.stats().await.chunks_indexed, 0);
    }
}
