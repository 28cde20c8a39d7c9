use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Closed set of entity categories stored in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Person,
    Organization,
    Location,
    Product,
    Event,
    Concept,
    Date,
    Time,
    Money,
    Quantity,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::Organization => "ORGANIZATION",
            Self::Location => "LOCATION",
            Self::Product => "PRODUCT",
            Self::Event => "EVENT",
            Self::Concept => "CONCEPT",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Money => "MONEY",
            Self::Quantity => "QUANTITY",
        }
    }

    /// Map a free-form or NER-style label onto the closed set.
    /// Unknown labels become `Concept`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "PERSON" | "PER" => Self::Person,
            "ORGANIZATION" | "ORGANISATION" | "ORG" => Self::Organization,
            "LOCATION" | "GPE" | "LOC" => Self::Location,
            "PRODUCT" => Self::Product,
            "EVENT" => Self::Event,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "MONEY" => Self::Money,
            "QUANTITY" => Self::Quantity,
            _ => Self::Concept,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity as returned by an extractor, before it gets an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub language: String,
    pub confidence: f64,
}

/// Entity node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub language: String,
    pub confidence: f64,
}

impl From<&ExtractedEntity> for Entity {
    fn from(extracted: &ExtractedEntity) -> Self {
        Self {
            id: generate_entity_id(&extracted.name, &extracted.language),
            name: extracted.name.clone(),
            entity_type: extracted.entity_type,
            language: extracted.language.clone(),
            confidence: extracted.confidence,
        }
    }
}

/// Deterministic entity id from `(name.to_lowercase(), language)`.
///
/// The same surface form in the same language always maps to the same node,
/// which is what lets ingestion merge mentions across chunks.
pub fn generate_entity_id(name: &str, language: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}", name.to_lowercase(), language).as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}
