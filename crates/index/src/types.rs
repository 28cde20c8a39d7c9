use serde::{Deserialize, Serialize};

/// One hit from a single retrieval method. Every retriever produces this
/// shape so fusion can treat them uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    /// Chunk id, shared across the lexical, dense and graph indexes
    pub id: String,
    pub score: f64,
    /// 1-based position in the method's own ranking
    pub rank: usize,
    pub text: String,
    pub language: String,
}

impl MethodResult {
    pub fn new(
        id: impl Into<String>,
        score: f64,
        rank: usize,
        text: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            score,
            rank,
            text: text.into(),
            language: language.into(),
        }
    }
}
