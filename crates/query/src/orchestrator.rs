use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use index::{Bm25Index, DenseIndex, MethodResult};

use crate::config::SearchConfig;
use crate::error::RetrievalError;
use crate::fusion;
use crate::graph_retriever::GraphRetriever;
use crate::metrics::{QueryMetrics, TimedOperation};
use crate::types::{
    Abstention, MethodOutcome, RetrievalMethod, SearchRequest, SearchResponse, dedup_methods,
};

const NO_RESULTS: &str = "no results";

/// Runs the requested retrieval methods concurrently and fuses whatever
/// contributed.
///
/// A method that is not configured, fails, or returns nothing abstains: it
/// is logged and reported in the response but never aborts the query. Only
/// methods with a non-empty list count as `methods_used`.
pub struct Orchestrator {
    bm25: Arc<RwLock<Bm25Index>>,
    dense: Option<Arc<dyn DenseIndex>>,
    graph: Option<GraphRetriever>,
    config: SearchConfig,
    metrics: Arc<QueryMetrics>,
}

impl Orchestrator {
    pub fn new(bm25: Arc<RwLock<Bm25Index>>, config: SearchConfig) -> Self {
        Self {
            bm25,
            dense: None,
            graph: None,
            config,
            metrics: Arc::new(QueryMetrics::new()),
        }
    }

    pub fn with_dense(mut self, dense: Arc<dyn DenseIndex>) -> Self {
        self.dense = Some(dense);
        self
    }

    pub fn with_graph(mut self, graph: GraphRetriever) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<QueryMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn bm25(&self) -> &Arc<RwLock<Bm25Index>> {
        &self.bm25
    }

    pub fn dense(&self) -> Option<&Arc<dyn DenseIndex>> {
        self.dense.as_ref()
    }

    pub fn graph(&self) -> Option<&GraphRetriever> {
        self.graph.as_ref()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<QueryMetrics> {
        &self.metrics
    }

    async fn run_bm25(
        &self,
        requested: bool,
        query: &str,
        top_k: usize,
        language: &str,
        min_score: f64,
    ) -> Option<MethodOutcome> {
        if !requested {
            return None;
        }
        let index = self.bm25.read().await;
        Some(MethodOutcome::Ran(index.search(query, top_k, language, min_score)))
    }

    async fn run_dense(
        &self,
        requested: bool,
        query: &str,
        top_k: usize,
        language: &str,
    ) -> Option<MethodOutcome> {
        if !requested {
            return None;
        }
        let Some(dense) = &self.dense else {
            return Some(MethodOutcome::Unavailable);
        };
        Some(match dense.search(query, top_k, language).await {
            Ok(results) => MethodOutcome::Ran(results),
            Err(e) => MethodOutcome::Failed(format!("{:#}", e)),
        })
    }

    async fn run_graph(
        &self,
        requested: bool,
        query: &str,
        top_k: usize,
        language: &str,
    ) -> Option<MethodOutcome> {
        if !requested {
            return None;
        }
        let Some(graph) = &self.graph else {
            return Some(MethodOutcome::Unavailable);
        };
        Some(match graph.search(query, top_k, language).await {
            Ok(results) => MethodOutcome::Ran(results.into_iter().map(|r| r.result).collect()),
            Err(e) => MethodOutcome::Failed(format!("{:#}", e)),
        })
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, RetrievalError> {
        let total_timer = TimedOperation::start();
        let request_id = Uuid::new_v4().to_string();

        let query = request.query.trim();
        if query.is_empty() {
            self.metrics.record_query(false, 0);
            return Err(RetrievalError::EmptyQuery);
        }

        let language = request
            .language
            .clone()
            .unwrap_or_else(|| self.config.retrieval.language.clone());
        let methods = dedup_methods(
            request
                .methods
                .as_deref()
                .unwrap_or(&self.config.retrieval.methods),
        );
        let top_k = request.top_k.unwrap_or(self.config.retrieval.top_k);
        let min_score = request.min_score.unwrap_or(self.config.bm25.min_score);

        info!(
            request_id = %request_id,
            language = %language,
            methods = ?methods,
            top_k,
            "Search request"
        );

        let retrieval_timer = TimedOperation::start();
        let (bm25, dense, graph) = tokio::join!(
            self.run_bm25(methods.contains(&RetrievalMethod::Bm25), query, top_k, &language, min_score),
            self.run_dense(methods.contains(&RetrievalMethod::Dense), query, top_k, &language),
            self.run_graph(methods.contains(&RetrievalMethod::Graph), query, top_k, &language),
        );
        let retrieval_time = retrieval_timer.elapsed();

        let mut outcomes = [
            (RetrievalMethod::Bm25, bm25),
            (RetrievalMethod::Dense, dense),
            (RetrievalMethod::Graph, graph),
        ];

        let mut named_lists: Vec<(String, Vec<MethodResult>)> = Vec::new();
        let mut methods_used = Vec::new();
        let mut ran_empty = Vec::new();
        let mut abstained = Vec::new();

        // Requested order decides fusion tie-breaks
        for method in &methods {
            let Some(outcome) = outcomes
                .iter_mut()
                .find(|(m, _)| m == method)
                .and_then(|(_, outcome)| outcome.take())
            else {
                continue;
            };

            match outcome {
                MethodOutcome::Ran(results) if results.is_empty() => {
                    debug!(request_id = %request_id, method = %method, "Method ran with no results");
                    self.metrics.record_method(*method, true);
                    ran_empty.push(*method);
                    abstained.push(Abstention {
                        method: *method,
                        reason: NO_RESULTS.to_string(),
                    });
                }
                MethodOutcome::Ran(results) => {
                    debug!(request_id = %request_id, method = %method, results = results.len(), "Method ran");
                    self.metrics.record_method(*method, true);
                    methods_used.push(*method);
                    named_lists.push((method.to_string(), results));
                }
                MethodOutcome::Unavailable => {
                    warn!(request_id = %request_id, method = %method, "Method not configured, skipping");
                    self.metrics.record_method(*method, false);
                    abstained.push(Abstention {
                        method: *method,
                        reason: "not configured".to_string(),
                    });
                }
                MethodOutcome::Failed(reason) => {
                    warn!(request_id = %request_id, method = %method, error = %reason, "Method failed, skipping");
                    self.metrics.record_method(*method, false);
                    abstained.push(Abstention {
                        method: *method,
                        reason,
                    });
                }
            }
        }

        if methods_used.is_empty() {
            self.metrics.record_query(false, 0);
            let failed: Vec<RetrievalMethod> = abstained
                .into_iter()
                .map(|a| a.method)
                .filter(|m| !ran_empty.contains(m))
                .collect();
            if ran_empty.is_empty() {
                warn!(request_id = %request_id, "No retrieval method ran");
                return Err(RetrievalError::NoMethodAvailable { abstained: failed });
            }
            warn!(request_id = %request_id, ran = ?ran_empty, "No retrieval method returned results");
            return Err(RetrievalError::NoResults {
                ran: ran_empty,
                abstained: failed,
            });
        }

        let fusion_timer = TimedOperation::start();
        let strategy = self.config.fusion.strategy(request.rrf_k);
        let results = fusion::fuse(&named_lists, &strategy, top_k);
        let fusion_time = fusion_timer.elapsed();

        self.metrics.record_timings(retrieval_time, fusion_time);
        self.metrics.record_query(true, results.len());

        info!(
            request_id = %request_id,
            results = results.len(),
            methods_used = ?methods_used,
            "Search complete"
        );

        Ok(SearchResponse {
            request_id,
            query: query.to_string(),
            language,
            total_results: results.len(),
            results,
            methods_used,
            abstained,
            retrieval_time_ms: retrieval_time.as_secs_f64() * 1000.0,
            fusion_time_ms: fusion_time.as_secs_f64() * 1000.0,
            total_time_ms: total_timer.elapsed_ms(),
        })
    }
}
