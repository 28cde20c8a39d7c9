use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::EntityExtractor;
use crate::schema::{EntityType, ExtractedEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GazetteerEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// `None` matches text in any language
    #[serde(default)]
    pub language: Option<String>,
}

impl GazetteerEntry {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
            language: None,
        }
    }

    pub fn in_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Dictionary extractor: reports every known name that occurs in the text
/// as a whole word, case-insensitively, in order of first occurrence.
pub struct GazetteerExtractor {
    entries: Vec<(GazetteerEntry, Regex)>,
    confidence: f64,
}

impl GazetteerExtractor {
    pub fn new(entries: Vec<GazetteerEntry>, confidence: f64) -> Result<Self> {
        let entries = entries
            .into_iter()
            .map(|entry| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(&entry.name));
                let re = Regex::new(&pattern)
                    .with_context(|| format!("Invalid gazetteer entry: {}", entry.name))?;
                Ok((entry, re))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            entries,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, text: &str, language: &str) -> Vec<ExtractedEntity> {
        let mut hits: Vec<(usize, &GazetteerEntry)> = self
            .entries
            .iter()
            .filter(|(entry, _)| entry.language.as_deref().is_none_or(|l| l == language))
            .filter_map(|(entry, re)| re.find(text).map(|m| (m.start(), entry)))
            .collect();
        hits.sort_by_key(|(pos, _)| *pos);

        hits.into_iter()
            .map(|(_, entry)| ExtractedEntity {
                name: entry.name.clone(),
                entity_type: entry.entity_type,
                language: language.to_string(),
                confidence: self.confidence,
            })
            .collect()
    }
}

#[async_trait]
impl EntityExtractor for GazetteerExtractor {
    async fn extract(&self, text: &str, language: &str) -> Result<Vec<ExtractedEntity>> {
        Ok(self.find(text, language))
    }
}
