use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use extract::EntityExtractor;
use index::{GraphStore, MethodResult};

pub const DEFAULT_ENTITY_MATCH_LIMIT: usize = 3;

/// Graph hit annotated with its document and the query's entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphResult {
    #[serde(flatten)]
    pub result: MethodResult,
    pub doc_id: String,
    pub entities: Vec<String>,
}

/// Turns a query into graph hits: query entities are matched against stored
/// entities by name, and chunks mentioning the matches are scored by
/// aggregated mention confidence.
#[derive(Clone)]
pub struct GraphRetriever {
    store: Arc<dyn GraphStore>,
    extractor: Arc<dyn EntityExtractor>,
    entity_match_limit: usize,
}

impl GraphRetriever {
    pub fn new(store: Arc<dyn GraphStore>, extractor: Arc<dyn EntityExtractor>) -> Self {
        Self {
            store,
            extractor,
            entity_match_limit: DEFAULT_ENTITY_MATCH_LIMIT,
        }
    }

    pub fn with_entity_match_limit(mut self, limit: usize) -> Self {
        self.entity_match_limit = limit;
        self
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn extractor(&self) -> &Arc<dyn EntityExtractor> {
        &self.extractor
    }

    pub async fn search(&self, query: &str, top_k: usize, language: &str) -> Result<Vec<GraphResult>> {
        let query_entities = self.extractor
            .extract(query, language)
            .await
            .context("Failed to extract query entities")?;

        if query_entities.is_empty() {
            warn!("No entities extracted from query");
            return Ok(Vec::new());
        }

        let language_filter = (!language.is_empty()).then_some(language);
        let mut entity_ids = Vec::new();
        for entity in &query_entities {
            let matches = self.store
                .find_entities_by_name(&entity.name, language_filter, self.entity_match_limit)
                .await
                .context("Failed to match query entities")?;
            entity_ids.extend(matches.into_iter().map(|m| m.id));
        }

        if entity_ids.is_empty() {
            warn!(query_entities = query_entities.len(), "No matching entities found in graph");
            return Ok(Vec::new());
        }

        info!(
            query_entities = query_entities.len(),
            matched = entity_ids.len(),
            "Graph entities matched"
        );

        let chunks = self.store
            .find_chunks_by_entities(&entity_ids, top_k)
            .await
            .context("Failed to traverse mentions")?;

        let names: Vec<String> = query_entities.into_iter().map(|e| e.name).collect();

        Ok(chunks
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, chunk)| GraphResult {
                result: MethodResult {
                    id: chunk.id,
                    score: chunk.score,
                    rank: i + 1,
                    text: chunk.text,
                    language: if chunk.language.is_empty() {
                        language.to_string()
                    } else {
                        chunk.language
                    },
                },
                doc_id: chunk.doc_id,
                entities: names.clone(),
            })
            .collect())
    }
}
