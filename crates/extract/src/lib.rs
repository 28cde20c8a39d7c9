pub mod gazetteer;
pub mod llm;
pub mod prompt;
pub mod schema;

pub use gazetteer::{GazetteerEntry, GazetteerExtractor};
pub use llm::OllamaClient;
pub use schema::{Entity, EntityType, ExtractedEntity, generate_entity_id};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Confidence assigned when the model omits one
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Named-entity extraction collaborator.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str, language: &str) -> Result<Vec<ExtractedEntity>>;
}

#[derive(Deserialize)]
struct RawExtraction {
    #[serde(default)]
    entities: Vec<RawEntity>,
}

#[derive(Deserialize)]
struct RawEntity {
    name: String,
    #[serde(rename = "type", default)]
    entity_type: String,
    confidence: Option<f64>,
}

/// Parse the model's JSON answer into entities for `language`.
///
/// Blank names are dropped, labels are mapped onto [`EntityType`] and
/// confidences are clamped to `[0, 1]`.
pub fn parse_extraction(json: &str, language: &str) -> Result<Vec<ExtractedEntity>> {
    let raw: RawExtraction =
        serde_json::from_str(json).context("Failed to parse extraction result")?;

    Ok(raw
        .entities
        .into_iter()
        .filter_map(|e| {
            let name = e.name.split_whitespace().collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                return None;
            }
            Some(ExtractedEntity {
                name,
                entity_type: EntityType::from_label(&e.entity_type),
                language: language.to_string(),
                confidence: e.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0),
            })
        })
        .collect())
}

/// LLM-backed extractor using a local Ollama model.
pub struct LlmEntityExtractor {
    llm_client: OllamaClient,
    max_attempts: usize,
}

impl LlmEntityExtractor {
    pub fn new(llm_client: OllamaClient) -> Self {
        Self {
            llm_client,
            max_attempts: 3,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl Default for LlmEntityExtractor {
    fn default() -> Self {
        Self::new(OllamaClient::default())
    }
}

#[async_trait]
impl EntityExtractor for LlmEntityExtractor {
    async fn extract(&self, text: &str, language: &str) -> Result<Vec<ExtractedEntity>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let prompt = prompt::build_extraction_prompt(text, language);

        let entities = self.llm_client
            .generate_parsed(&prompt, self.max_attempts, |json| parse_extraction(json, language))
            .await
            .context("Failed to extract entities after retries")?;

        debug!(count = entities.len(), language, "Extracted entities");
        Ok(entities)
    }
}
