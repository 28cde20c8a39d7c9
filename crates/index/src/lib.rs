pub mod bm25;
pub mod cache;
pub mod dense;
pub mod embeddings;
pub mod graph_store;
pub mod memory_graph;
pub mod neo4j_index;
pub mod qdrant_index;
pub mod tokenizer;
pub mod types;

pub use bm25::Bm25Index;
pub use cache::EmbeddingCache;
pub use dense::DenseIndex;
pub use embeddings::EmbeddingClient;
pub use graph_store::{GraphStats, GraphStore, ScoredChunk};
pub use memory_graph::InMemoryGraphStore;
pub use neo4j_index::Neo4jGraphStore;
pub use qdrant_index::QdrantIndexer;
pub use tokenizer::{MultilingualTokenizer, Segmenter};
pub use types::MethodResult;
