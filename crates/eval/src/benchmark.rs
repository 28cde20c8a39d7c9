use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use query::{RetrievalMethod, SearchRequest, ServiceContext, TimedOperation};

use crate::metrics::{RankedRun, mean_reciprocal_rank, ndcg_at_k, recall_at_k};
use crate::test_set::LabelledQuery;

/// A named combination of retrieval methods to evaluate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSet {
    pub name: String,
    pub methods: Vec<RetrievalMethod>,
}

impl MethodSet {
    pub fn new(name: impl Into<String>, methods: &[RetrievalMethod]) -> Self {
        Self {
            name: name.into(),
            methods: methods.to_vec(),
        }
    }

    pub fn is_hybrid(&self) -> bool {
        self.methods.len() > 1
    }
}

pub fn default_method_sets() -> Vec<MethodSet> {
    vec![
        MethodSet::new("bm25", &[RetrievalMethod::Bm25]),
        MethodSet::new("graph", &[RetrievalMethod::Graph]),
        MethodSet::new("hybrid", &RetrievalMethod::ALL),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub methods: Vec<MethodResults>,
    pub comparison: Option<Comparison>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodResults {
    pub method: String,
    pub total_queries: usize,
    pub failed_queries: usize,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub mrr: f64,
    pub ndcg_at_5: f64,
    pub ndcg_at_10: f64,
    pub recall_at_5: f64,
    pub recall_at_10: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub hybrid_method: String,
    pub best_single_method: String,
    pub hybrid_ndcg_at_10: f64,
    pub best_single_ndcg_at_10: f64,
    pub hybrid_improvement_pct: f64,
}

pub struct Benchmarker {
    context: Arc<ServiceContext>,
    method_sets: Vec<MethodSet>,
    top_k: usize,
}

impl Benchmarker {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        Self {
            context,
            method_sets: default_method_sets(),
            top_k: 10,
        }
    }

    pub fn with_method_sets(mut self, method_sets: Vec<MethodSet>) -> Self {
        self.method_sets = method_sets;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub async fn run_benchmark(&self, queries: &[LabelledQuery]) -> Result<BenchmarkResults> {
        info!(queries = queries.len(), method_sets = self.method_sets.len(), "Running benchmark");

        let mut methods = Vec::with_capacity(self.method_sets.len());
        for set in &self.method_sets {
            info!(method = %set.name, "Evaluating method set");
            methods.push(self.evaluate(set, queries).await);
        }

        let comparison = compare(&self.method_sets, &methods);
        Ok(BenchmarkResults { methods, comparison })
    }

    async fn evaluate(&self, set: &MethodSet, queries: &[LabelledQuery]) -> MethodResults {
        let mut latencies = Vec::with_capacity(queries.len());
        let mut runs = Vec::with_capacity(queries.len());
        let mut failed = 0;

        for labelled in queries {
            let request = SearchRequest::new(labelled.query.clone())
                .with_language(labelled.language.clone())
                .with_methods(&set.methods)
                .with_top_k(self.top_k);

            let timer = TimedOperation::start();
            let ranked = match self.context.search(&request).await {
                Ok(response) => response.results.into_iter().map(|r| r.id).collect(),
                Err(e) => {
                    warn!(method = %set.name, query = %labelled.id, error = %e, "Query failed");
                    failed += 1;
                    Vec::new()
                }
            };
            latencies.push(timer.elapsed_ms());
            runs.push(RankedRun::new(ranked, labelled.relevance.clone()));
        }

        compute_results(set.name.clone(), latencies, &runs, failed)
    }
}

fn compute_results(
    method: String,
    mut latencies: Vec<f64>,
    runs: &[RankedRun],
    failed_queries: usize,
) -> MethodResults {
    latencies.sort_by(|a, b| a.total_cmp(b));

    let avg_latency = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<f64>() / latencies.len() as f64
    };

    MethodResults {
        method,
        total_queries: runs.len(),
        failed_queries,
        avg_latency_ms: avg_latency,
        p50_latency_ms: percentile(&latencies, 50),
        p95_latency_ms: percentile(&latencies, 95),
        mrr: mean_reciprocal_rank(runs),
        ndcg_at_5: ndcg_at_k(runs, 5),
        ndcg_at_10: ndcg_at_k(runs, 10),
        recall_at_5: recall_at_k(runs, 5),
        recall_at_10: recall_at_k(runs, 10),
    }
}

/// Hybrid nDCG@10 against the best single-method set. `None` without a
/// hybrid set, without a single-method set, or when the best single
/// method scored zero.
fn compare(sets: &[MethodSet], results: &[MethodResults]) -> Option<Comparison> {
    let (hybrid, single): (Vec<_>, Vec<_>) = sets
        .iter()
        .zip(results)
        .partition(|(set, _)| set.is_hybrid());

    let (_, hybrid) = hybrid.first()?;
    let (_, best) = single
        .into_iter()
        .max_by(|(_, a), (_, b)| a.ndcg_at_10.total_cmp(&b.ndcg_at_10))?;

    if best.ndcg_at_10 <= 0.0 {
        return None;
    }

    Some(Comparison {
        hybrid_method: hybrid.method.clone(),
        best_single_method: best.method.clone(),
        hybrid_ndcg_at_10: hybrid.ndcg_at_10,
        best_single_ndcg_at_10: best.ndcg_at_10,
        hybrid_improvement_pct: (hybrid.ndcg_at_10 - best.ndcg_at_10) / best.ndcg_at_10 * 100.0,
    })
}

fn percentile(sorted_data: &[f64], p: usize) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }
    let index = (p as f64 / 100.0 * sorted_data.len() as f64) as usize;
    sorted_data[index.min(sorted_data.len() - 1)]
}
