//! Hybrid retrieval: BM25, dense and entity-graph signals fused by rank.

pub mod chat;
pub mod config;
pub mod context;
pub mod error;
pub mod fusion;
pub mod graph_retriever;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod types;

pub use chat::{ChatMessage, ChatService};
pub use config::SearchConfig;
pub use context::{AnswerResponse, IngestReport, ServiceContext, ServiceStats};
pub use error::RetrievalError;
pub use fusion::{FusionStrategy, fuse, reciprocal_rank_fusion};
pub use graph_retriever::{GraphResult, GraphRetriever};
pub use llm::{GenerationOptions, QueryLLM, TextGenerator};
pub use metrics::{MetricsSnapshot, QueryMetrics, TimedOperation};
pub use orchestrator::Orchestrator;
pub use types::{FusedResult, MethodOutcome, RetrievalMethod, SearchRequest, SearchResponse};
