use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use eval::{BenchmarkResults, Benchmarker, MethodResults, generate_plots, get_test_set};
use extract::GazetteerExtractor;
use index::InMemoryGraphStore;
use query::{SearchConfig, ServiceContext};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Hybrid Retrieval Benchmark ===\n");

    let set = get_test_set();
    let extractor = GazetteerExtractor::new(set.gazetteer, 0.9)?;

    // Offline stack: no Qdrant, so dense abstains in the hybrid run
    let context = ServiceContext::new(SearchConfig::default().with_env_overrides())
        .with_graph(Arc::new(InMemoryGraphStore::new()), Arc::new(extractor));

    for document in &set.documents {
        let report = context
            .ingest_document(document)
            .await
            .with_context(|| format!("Failed to ingest {}", document.id))?;
        info!(
            doc_id = %report.document_id,
            chunks = report.chunks_created,
            entities = report.entities_extracted,
            "Ingested"
        );
    }

    println!(
        "Corpus: {} documents, {} queries\n",
        set.documents.len(),
        set.queries.len()
    );

    let benchmarker = Benchmarker::new(Arc::new(context));
    let results = benchmarker.run_benchmark(&set.queries).await?;

    print_results(&results);

    let results_json = serde_json::to_string_pretty(&results)?;
    std::fs::write("benchmark_results.json", results_json)?;
    println!("\nResults saved to benchmark_results.json");

    generate_plots(&results, "plots")?;
    println!("Plots saved to plots/");

    Ok(())
}

fn print_results(results: &BenchmarkResults) {
    println!(
        "{:<10} {:>6} {:>8} {:>8} {:>9} {:>9} {:>10} {:>9} {:>9}",
        "method", "MRR", "nDCG@5", "nDCG@10", "R@5", "R@10", "avg ms", "p50 ms", "p95 ms"
    );
    println!("{}", "-".repeat(86));
    for method in &results.methods {
        print_method_results(method);
    }

    match &results.comparison {
        Some(comparison) => println!(
            "\n{} changes nDCG@10 by {:+.1}% over the best single method ({})",
            comparison.hybrid_method,
            comparison.hybrid_improvement_pct,
            comparison.best_single_method
        ),
        None => println!("\nNo hybrid comparison available"),
    }
}

fn print_method_results(results: &MethodResults) {
    println!(
        "{:<10} {:>6.3} {:>8.3} {:>8.3} {:>9.3} {:>9.3} {:>10.2} {:>9.2} {:>9.2}",
        results.method,
        results.mrr,
        results.ndcg_at_5,
        results.ndcg_at_10,
        results.recall_at_5,
        results.recall_at_10,
        results.avg_latency_ms,
        results.p50_latency_ms,
        results.p95_latency_ms,
    );
    if results.failed_queries > 0 {
        println!("{:<10} {} queries failed", "", results.failed_queries);
    }
}
