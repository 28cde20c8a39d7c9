//! Rank fusion over named result lists.
//!
//! Both strategies share one aggregation pass: each method's list is walked
//! in order, every hit adds a contribution to its chunk's total, and the
//! totals are sorted (stable, so ties keep first-seen order) and re-ranked.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use index::MethodResult;

use crate::types::FusedResult;

/// Standard RRF constant (Cormack, Clarke and Buettcher, SIGIR 2009).
pub const DEFAULT_RRF_K: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FusionStrategy {
    /// `Σ 1 / (k + position)`
    Reciprocal { k: f64 },
    /// `Σ weight[method] × score`, missing weights count as 1.0
    Weighted { weights: HashMap<String, f64> },
}

impl Default for FusionStrategy {
    fn default() -> Self {
        Self::Reciprocal { k: DEFAULT_RRF_K }
    }
}

impl FusionStrategy {
    fn contribution(&self, method: &str, position: usize, score: f64) -> f64 {
        match self {
            Self::Reciprocal { k } => 1.0 / (k + position as f64),
            Self::Weighted { weights } => weights.get(method).copied().unwrap_or(1.0) * score,
        }
    }
}

struct Accumulator<'a> {
    first: &'a MethodResult,
    total: f64,
    method_scores: HashMap<String, f64>,
    method_ranks: HashMap<String, usize>,
}

/// Merge `named_lists` into one ranking of at most `top_k` results.
///
/// Positions are 1-based and taken from list order, not from the `rank`
/// field of the input. A chunk repeated within one list counts once.
pub fn fuse(
    named_lists: &[(String, Vec<MethodResult>)],
    strategy: &FusionStrategy,
    top_k: usize,
) -> Vec<FusedResult> {
    let mut order: Vec<&str> = Vec::new();
    let mut acc: HashMap<&str, Accumulator<'_>> = HashMap::new();

    for (method, results) in named_lists {
        let mut seen: HashSet<&str> = HashSet::new();

        for (i, result) in results.iter().enumerate() {
            if !seen.insert(result.id.as_str()) {
                continue;
            }
            let position = i + 1;

            let entry = acc.entry(result.id.as_str()).or_insert_with(|| {
                order.push(result.id.as_str());
                Accumulator {
                    first: result,
                    total: 0.0,
                    method_scores: HashMap::new(),
                    method_ranks: HashMap::new(),
                }
            });
            entry.total += strategy.contribution(method, position, result.score);
            entry.method_scores.insert(method.clone(), result.score);
            entry.method_ranks.insert(method.clone(), position);
        }
    }

    let mut fused: Vec<FusedResult> = order
        .into_iter()
        .filter_map(|id| acc.remove(id))
        .map(|a| FusedResult {
            id: a.first.id.clone(),
            rrf_score: a.total,
            rank: 0,
            text: a.first.text.clone(),
            language: a.first.language.clone(),
            method_scores: a.method_scores,
            method_ranks: a.method_ranks,
        })
        .collect();

    fused.sort_by(|a, b| b.rrf_score.total_cmp(&a.rrf_score));
    fused.truncate(top_k);
    for (i, result) in fused.iter_mut().enumerate() {
        result.rank = i + 1;
    }
    fused
}

pub fn reciprocal_rank_fusion(
    named_lists: &[(String, Vec<MethodResult>)],
    k: f64,
    top_k: usize,
) -> Vec<FusedResult> {
    fuse(named_lists, &FusionStrategy::Reciprocal { k }, top_k)
}
