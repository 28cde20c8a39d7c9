use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::fusion::{DEFAULT_RRF_K, FusionStrategy};
use crate::types::RetrievalMethod;

/// Small corpora push common terms to negative IDF, so the default keeps
/// negative BM25 scores.
pub const DEFAULT_MIN_SCORE: f64 = -999.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub bm25: Bm25Config,
    pub fusion: FusionConfig,
    pub graph: GraphConfig,
    pub retrieval: RetrievalConfig,
    pub answer: AnswerConfig,
    pub endpoints: EndpointConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Config {
    pub k1: f64,
    pub b: f64,
    /// Results must score strictly above this
    pub min_score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FusionKind {
    Rrf,
    Weighted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub strategy: FusionKind,
    pub rrf_k: f64,
    /// Per-method weights for the weighted strategy
    pub weights: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub entity_match_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub language: String,
    pub methods: Vec<RetrievalMethod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    pub context_chunks: usize,
    pub history_messages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub ollama_url: String,
    pub embedding_model: String,
    pub llm_model: String,
    pub qdrant_url: String,
    pub qdrant_collection: String,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: index::bm25::DEFAULT_K1,
            b: index::bm25::DEFAULT_B,
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            strategy: FusionKind::Rrf,
            rrf_k: DEFAULT_RRF_K,
            weights: HashMap::new(),
        }
    }
}

impl FusionConfig {
    /// Strategy for one request; `rrf_k` overrides the configured constant.
    pub fn strategy(&self, rrf_k: Option<f64>) -> FusionStrategy {
        match self.strategy {
            FusionKind::Rrf => FusionStrategy::Reciprocal {
                k: rrf_k.unwrap_or(self.rrf_k),
            },
            FusionKind::Weighted => FusionStrategy::Weighted {
                weights: self.weights.clone(),
            },
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            entity_match_limit: crate::graph_retriever::DEFAULT_ENTITY_MATCH_LIMIT,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            language: "en".to_string(),
            methods: RetrievalMethod::ALL.to_vec(),
        }
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            context_chunks: 5,
            history_messages: 5,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            llm_model: "llama3".to_string(),
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_collection: "chunks".to_string(),
            neo4j_uri: "bolt://localhost:7687".to_string(),
            neo4j_user: "neo4j".to_string(),
            neo4j_password: "password".to_string(),
        }
    }
}

impl SearchConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Apply connection settings from the environment
    pub fn with_env_overrides(mut self) -> Self {
        let overrides = [
            ("OLLAMA_URL", &mut self.endpoints.ollama_url),
            ("QDRANT_URL", &mut self.endpoints.qdrant_url),
            ("NEO4J_URI", &mut self.endpoints.neo4j_uri),
            ("NEO4J_USER", &mut self.endpoints.neo4j_user),
            ("NEO4J_PASSWORD", &mut self.endpoints.neo4j_password),
        ];
        for (var, field) in overrides {
            if let Ok(value) = std::env::var(var) {
                *field = value;
            }
        }
        self
    }

    /// BM25 only, no external services needed
    pub fn lexical_only() -> Self {
        let mut config = Self::default();
        config.retrieval.methods = vec![RetrievalMethod::Bm25];
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.bm25.k1, 1.5);
        assert_eq!(config.bm25.b, 0.75);
        assert_eq!(config.bm25.min_score, DEFAULT_MIN_SCORE);
        assert_eq!(config.fusion.rrf_k, 60.0);
        assert_eq!(config.graph.entity_match_limit, 3);
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.retrieval.methods.len(), 3);
        assert_eq!(config.answer.context_chunks, 5);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"bm25": {{"min_score": 0.0}}, "retrieval": {{"methods": ["bm25", "colbert"]}}}}"#
        )
        .unwrap();

        let config = SearchConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bm25.min_score, 0.0);
        assert_eq!(config.bm25.k1, 1.5);
        assert_eq!(
            config.retrieval.methods,
            vec![RetrievalMethod::Bm25, RetrievalMethod::Dense]
        );
        assert_eq!(config.retrieval.top_k, 10);
    }

    #[test]
    fn test_strategy_selection() {
        let mut fusion = FusionConfig::default();
        assert_eq!(fusion.strategy(None), FusionStrategy::Reciprocal { k: 60.0 });
        assert_eq!(fusion.strategy(Some(10.0)), FusionStrategy::Reciprocal { k: 10.0 });

        fusion.strategy = FusionKind::Weighted;
        fusion.weights.insert("graph".to_string(), 2.0);
        assert!(matches!(fusion.strategy(Some(10.0)), FusionStrategy::Weighted { .. }));
    }

    #[test]
    fn test_lexical_only() {
        assert_eq!(SearchConfig::lexical_only().retrieval.methods, vec![RetrievalMethod::Bm25]);
    }

    #[test]
    fn test_env_overrides_endpoints() {
        unsafe { std::env::set_var("QDRANT_URL", "http://qdrant.internal:6333") };
        let config = SearchConfig::default().with_env_overrides();
        unsafe { std::env::remove_var("QDRANT_URL") };

        assert_eq!(config.endpoints.qdrant_url, "http://qdrant.internal:6333");
        assert_eq!(config.endpoints.qdrant_collection, "chunks");

        let restored = SearchConfig::default().with_env_overrides();
        assert_eq!(restored.endpoints.qdrant_url, "http://localhost:6333");
    }
}
