//! Offline retrieval evaluation: labelled multilingual queries, ranking
//! metrics and a method-by-method benchmark.

pub mod benchmark;
pub mod metrics;
pub mod plots;
pub mod test_set;

pub use benchmark::{BenchmarkResults, Benchmarker, MethodResults, MethodSet, default_method_sets};
pub use metrics::{RankedRun, mean_reciprocal_rank, ndcg_at_k, recall_at_k};
pub use plots::generate_plots;
pub use test_set::{LabelledQuery, QuestionType, TestSet, get_test_set};
