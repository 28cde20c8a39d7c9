use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use index::MethodResult;

use crate::error::RetrievalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMethod {
    Bm25,
    #[serde(alias = "colbert")]
    Dense,
    Graph,
}

/// Accepted method names, including legacy aliases.
const METHOD_ALIASES: &[(&str, RetrievalMethod)] = &[
    ("bm25", RetrievalMethod::Bm25),
    ("dense", RetrievalMethod::Dense),
    ("colbert", RetrievalMethod::Dense),
    ("graph", RetrievalMethod::Graph),
];

impl RetrievalMethod {
    pub const ALL: [RetrievalMethod; 3] = [Self::Bm25, Self::Dense, Self::Graph];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bm25 => "bm25",
            Self::Dense => "dense",
            Self::Graph => "graph",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        METHOD_ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, method)| *method)
    }

    /// Resolve names through the alias table, keeping the first occurrence
    /// of each method.
    pub fn resolve_all<S: AsRef<str>>(names: &[S]) -> Result<Vec<Self>, RetrievalError> {
        let methods = names
            .iter()
            .map(|name| {
                Self::parse(name.as_ref())
                    .ok_or_else(|| RetrievalError::UnknownMethod(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(dedup_methods(&methods))
    }
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMethod {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| RetrievalError::UnknownMethod(s.to_string()))
    }
}

pub fn dedup_methods(methods: &[RetrievalMethod]) -> Vec<RetrievalMethod> {
    let mut unique = Vec::with_capacity(methods.len());
    for method in methods {
        if !unique.contains(method) {
            unique.push(*method);
        }
    }
    unique
}

/// What happened to one requested method.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodOutcome {
    Ran(Vec<MethodResult>),
    /// Not configured in this context
    Unavailable,
    Failed(String),
}

/// Search parameters. Unset fields fall back to the service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub methods: Option<Vec<RetrievalMethod>>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub rrf_k: Option<f64>,
    #[serde(default)]
    pub min_score: Option<f64>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_methods(mut self, methods: &[RetrievalMethod]) -> Self {
        self.methods = Some(methods.to_vec());
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_rrf_k(mut self, rrf_k: f64) -> Self {
        self.rrf_k = Some(rrf_k);
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }
}

/// One hit after fusion, with each contributing method's score and rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub id: String,
    pub rrf_score: f64,
    pub rank: usize,
    pub text: String,
    pub language: String,
    pub method_scores: HashMap<String, f64>,
    pub method_ranks: HashMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Abstention {
    pub method: RetrievalMethod,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub request_id: String,
    pub query: String,
    pub language: String,
    pub results: Vec<FusedResult>,
    pub total_results: usize,
    pub methods_used: Vec<RetrievalMethod>,
    pub abstained: Vec<Abstention>,
    pub retrieval_time_ms: f64,
    pub fusion_time_ms: f64,
    pub total_time_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colbert_is_dense() {
        assert_eq!(RetrievalMethod::parse("colbert"), Some(RetrievalMethod::Dense));
        assert_eq!(RetrievalMethod::parse(" BM25 "), Some(RetrievalMethod::Bm25));
        assert_eq!(RetrievalMethod::parse("splade"), None);

        let parsed: Vec<RetrievalMethod> =
            serde_json::from_str(r#"["colbert", "graph"]"#).unwrap();
        assert_eq!(parsed, vec![RetrievalMethod::Dense, RetrievalMethod::Graph]);
        assert_eq!(serde_json::to_string(&RetrievalMethod::Dense).unwrap(), "\"dense\"");
    }

    #[test]
    fn test_resolve_collapses_aliases() {
        let methods = RetrievalMethod::resolve_all(&["dense", "bm25", "colbert"]).unwrap();
        assert_eq!(methods, vec![RetrievalMethod::Dense, RetrievalMethod::Bm25]);

        let err = RetrievalMethod::resolve_all(&["bm25", "tfidf"]).unwrap_err();
        assert_eq!(err, RetrievalError::UnknownMethod("tfidf".to_string()));
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"query": "hola", "methods": ["colbert"]}"#).unwrap();
        assert_eq!(request.query, "hola");
        assert_eq!(request.methods, Some(vec![RetrievalMethod::Dense]));
        assert!(request.language.is_none());
        assert!(request.top_k.is_none());
    }
}
