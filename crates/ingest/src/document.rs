use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::generate_doc_id;

/// Unit of ingestion before chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub language: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Document {
    /// Build a document whose id is derived from its content.
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: generate_doc_id(text.as_bytes()),
            text,
            language: language.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_id(
        id: impl Into<String>,
        text: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            language: language.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata
            .insert("source".to_string(), Value::String(source.into()));
        self
    }

    /// Source path or title, empty when unknown
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }
}
