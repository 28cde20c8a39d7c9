//! Ranking quality metrics over ranked chunk id lists.
//!
//! Every function averages over the supplied runs; a run pairs the ids a
//! method returned (best first) with the graded relevance judgments for
//! its query. Ids absent from the judgments have relevance 0.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct RankedRun {
    pub ranked: Vec<String>,
    pub relevance: HashMap<String, f64>,
}

impl RankedRun {
    pub fn new(ranked: Vec<String>, relevance: HashMap<String, f64>) -> Self {
        Self { ranked, relevance }
    }

    fn relevant_ids(&self) -> HashSet<&str> {
        self.relevance
            .iter()
            .filter(|(_, rel)| **rel > 0.0)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn dcg(relevances: impl Iterator<Item = f64>) -> f64 {
    relevances
        .enumerate()
        .map(|(idx, rel)| rel / ((idx + 2) as f64).log2())
        .sum()
}

/// Reciprocal of the first relevant position, 0 when nothing relevant came back.
pub fn mean_reciprocal_rank(runs: &[RankedRun]) -> f64 {
    let reciprocal_ranks: Vec<f64> = runs
        .iter()
        .map(|run| {
            let relevant = run.relevant_ids();
            run.ranked
                .iter()
                .position(|id| relevant.contains(id.as_str()))
                .map_or(0.0, |pos| 1.0 / (pos + 1) as f64)
        })
        .collect();
    mean(&reciprocal_ranks)
}

/// `DCG@k / IDCG@k` with `rel / log2(position + 1)` gains. A query whose
/// judgments are all zero scores 0.
pub fn ndcg_at_k(runs: &[RankedRun], k: usize) -> f64 {
    let scores: Vec<f64> = runs
        .iter()
        .map(|run| {
            let dcg_score = dcg(
                run.ranked
                    .iter()
                    .take(k)
                    .map(|id| run.relevance.get(id).copied().unwrap_or(0.0)),
            );

            let mut ideal: Vec<f64> = run.relevance.values().copied().collect();
            ideal.sort_by(|a, b| b.total_cmp(a));
            let idcg_score = dcg(ideal.into_iter().take(k));

            if idcg_score > 0.0 { dcg_score / idcg_score } else { 0.0 }
        })
        .collect();
    mean(&scores)
}

/// Share of relevant ids found in the first `k`. Queries without any
/// relevant id are left out of the average.
pub fn recall_at_k(runs: &[RankedRun], k: usize) -> f64 {
    let scores: Vec<f64> = runs
        .iter()
        .filter_map(|run| {
            let relevant = run.relevant_ids();
            if relevant.is_empty() {
                return None;
            }
            let retrieved: HashSet<&str> = run.ranked.iter().take(k).map(String::as_str).collect();
            Some(retrieved.intersection(&relevant).count() as f64 / relevant.len() as f64)
        })
        .collect();
    mean(&scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ranked: &[&str], relevance: &[(&str, f64)]) -> RankedRun {
        RankedRun::new(
            ranked.iter().map(|s| s.to_string()).collect(),
            relevance.iter().map(|(id, rel)| (id.to_string(), *rel)).collect(),
        )
    }

    #[test]
    fn test_mrr() {
        let runs = vec![
            run(&["a", "b", "c"], &[("a", 1.0)]),
            run(&["x", "b", "c"], &[("c", 1.0)]),
            run(&["x", "y"], &[("c", 1.0)]),
        ];
        let expected = (1.0 + 1.0 / 3.0 + 0.0) / 3.0;
        assert!((mean_reciprocal_rank(&runs) - expected).abs() < 1e-12);
        assert_eq!(mean_reciprocal_rank(&[]), 0.0);
    }

    #[test]
    fn test_ndcg_perfect_and_reversed() {
        let judgments = [("a", 2.0), ("b", 1.0)];
        assert!((ndcg_at_k(&[run(&["a", "b"], &judgments)], 10) - 1.0).abs() < 1e-12);

        let reversed = ndcg_at_k(&[run(&["b", "a"], &judgments)], 10);
        let expected = (1.0 + 2.0 / 3f64.log2()) / (2.0 + 1.0 / 3f64.log2());
        assert!((reversed - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ndcg_cutoff_and_empty_judgments() {
        // relevant hit sits at position 3, outside k = 2
        assert_eq!(ndcg_at_k(&[run(&["x", "y", "a"], &[("a", 1.0)])], 2), 0.0);
        assert_eq!(ndcg_at_k(&[run(&["a"], &[])], 10), 0.0);
    }

    #[test]
    fn test_recall_skips_queries_without_judgments() {
        let runs = vec![
            run(&["a", "x"], &[("a", 1.0), ("b", 1.0)]),
            run(&["a"], &[]),
        ];
        assert_eq!(recall_at_k(&runs, 10), 0.5);
        assert_eq!(recall_at_k(&runs, 0), 0.0);
    }

    #[test]
    fn test_zero_grade_is_not_relevant() {
        let runs = vec![run(&["a", "b"], &[("a", 0.0), ("b", 1.0)])];
        assert_eq!(mean_reciprocal_rank(&runs), 0.5);
        assert_eq!(recall_at_k(&runs, 1), 0.0);
    }
}
