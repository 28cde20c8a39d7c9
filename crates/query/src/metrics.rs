use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::types::RetrievalMethod;

#[derive(Default)]
struct MethodCounters {
    ran: AtomicUsize,
    abstained: AtomicUsize,
}

/// Process-wide query counters.
#[derive(Default)]
pub struct QueryMetrics {
    total_queries: AtomicUsize,
    failed_queries: AtomicUsize,
    empty_results: AtomicUsize,

    // Timing (in microseconds)
    total_retrieval_time_us: AtomicU64,
    total_fusion_time_us: AtomicU64,

    bm25: MethodCounters,
    dense: MethodCounters,
    graph: MethodCounters,
}

impl QueryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, method: RetrievalMethod) -> &MethodCounters {
        match method {
            RetrievalMethod::Bm25 => &self.bm25,
            RetrievalMethod::Dense => &self.dense,
            RetrievalMethod::Graph => &self.graph,
        }
    }

    pub fn record_query(&self, success: bool, results: usize) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_queries.fetch_add(1, Ordering::Relaxed);
        } else if results == 0 {
            self.empty_results.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_method(&self, method: RetrievalMethod, ran: bool) {
        let counters = self.counters(method);
        if ran {
            counters.ran.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.abstained.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_timings(&self, retrieval: Duration, fusion: Duration) {
        self.total_retrieval_time_us.fetch_add(retrieval.as_micros() as u64, Ordering::Relaxed);
        self.total_fusion_time_us.fetch_add(fusion.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_queries.load(Ordering::Relaxed);
        let method = |m: RetrievalMethod| {
            let c = self.counters(m);
            MethodSnapshot {
                ran: c.ran.load(Ordering::Relaxed),
                abstained: c.abstained.load(Ordering::Relaxed),
            }
        };
        MetricsSnapshot {
            total_queries: total,
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            empty_results: self.empty_results.load(Ordering::Relaxed),
            avg_retrieval_time_ms: avg_time_ms(&self.total_retrieval_time_us, total),
            avg_fusion_time_ms: avg_time_ms(&self.total_fusion_time_us, total),
            bm25: method(RetrievalMethod::Bm25),
            dense: method(RetrievalMethod::Dense),
            graph: method(RetrievalMethod::Graph),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total_us.load(Ordering::Relaxed) as f64 / count as f64 / 1000.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodSnapshot {
    pub ran: usize,
    pub abstained: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_queries: usize,
    pub failed_queries: usize,
    pub empty_results: usize,
    pub avg_retrieval_time_ms: f64,
    pub avg_fusion_time_ms: f64,
    pub bm25: MethodSnapshot,
    pub dense: MethodSnapshot,
    pub graph: MethodSnapshot,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}
