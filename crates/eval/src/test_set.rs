use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use extract::{EntityType, GazetteerEntry};
use ingest::Document;

/// A query with graded relevance judgments over chunk ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelledQuery {
    pub id: String,
    pub query: String,
    pub language: String,
    pub category: QuestionType,
    pub relevance: HashMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum QuestionType {
    Factual,     // Simple fact lookup
    Relational,  // Links two named entities
    Keyword,     // No named entity in the query
}

impl LabelledQuery {
    fn new(
        id: &str,
        query: &str,
        language: &str,
        category: QuestionType,
        relevance: &[(&str, f64)],
    ) -> Self {
        Self {
            id: id.to_string(),
            query: query.to_string(),
            language: language.to_string(),
            category,
            relevance: relevance
                .iter()
                .map(|(chunk_id, rel)| (chunk_id.to_string(), *rel))
                .collect(),
        }
    }
}

pub struct TestSet {
    pub documents: Vec<Document>,
    pub gazetteer: Vec<GazetteerEntry>,
    pub queries: Vec<LabelledQuery>,
}

pub fn get_test_set() -> TestSet {
    TestSet {
        documents: corpus(),
        gazetteer: gazetteer(),
        queries: queries(),
    }
}

fn corpus() -> Vec<Document> {
    vec![
        Document::with_id(
            "en_rust",
            "Rust is a systems programming language that was started at Mozilla.\n\n\
             The Rust compiler enforces memory safety without a garbage collector.\n\n\
             Cargo is the package manager and build tool that ships with Rust.",
            "en",
        )
        .with_source("rust.md"),
        Document::with_id(
            "en_stores",
            "Qdrant is a vector database that stores embeddings for similarity search.\n\n\
             Neo4j is a graph database that stores nodes and relationships.\n\n\
             Tantivy is a full text search library inspired by Lucene.",
            "en",
        )
        .with_source("stores.md"),
        Document::with_id(
            "es_madrid",
            "Madrid es la capital de España y su ciudad más poblada.\n\n\
             El Museo del Prado está en Madrid y guarda obras de Velázquez.\n\n\
             Barcelona es conocida por la arquitectura de Gaudí.",
            "es",
        )
        .with_source("madrid.md"),
        Document::with_id(
            "ar_cairo",
            "القاهرة هي عاصمة مصر وأكبر مدنها.\n\n\
             يمر نهر النيل عبر القاهرة من الجنوب إلى الشمال.\n\n\
             الإسكندرية مدينة ساحلية على البحر المتوسط.",
            "ar",
        )
        .with_source("cairo.md"),
    ]
}

fn gazetteer() -> Vec<GazetteerEntry> {
    vec![
        GazetteerEntry::new("Rust", EntityType::Product),
        GazetteerEntry::new("Mozilla", EntityType::Organization),
        GazetteerEntry::new("Cargo", EntityType::Product),
        GazetteerEntry::new("Qdrant", EntityType::Product),
        GazetteerEntry::new("Neo4j", EntityType::Product),
        GazetteerEntry::new("Lucene", EntityType::Product),
        GazetteerEntry::new("Madrid", EntityType::Location).in_language("es"),
        GazetteerEntry::new("Museo del Prado", EntityType::Location).in_language("es"),
        GazetteerEntry::new("Velázquez", EntityType::Person).in_language("es"),
        GazetteerEntry::new("Barcelona", EntityType::Location).in_language("es"),
        GazetteerEntry::new("Gaudí", EntityType::Person).in_language("es"),
        GazetteerEntry::new("القاهرة", EntityType::Location).in_language("ar"),
        GazetteerEntry::new("النيل", EntityType::Location).in_language("ar"),
        GazetteerEntry::new("الإسكندرية", EntityType::Location).in_language("ar"),
    ]
}

fn queries() -> Vec<LabelledQuery> {
    use QuestionType::*;

    vec![
        LabelledQuery::new(
            "en-1",
            "Who started Rust?",
            "en",
            Factual,
            &[("en_rust_chunk_0", 2.0), ("en_rust_chunk_1", 1.0), ("en_rust_chunk_2", 1.0)],
        ),
        LabelledQuery::new(
            "en-2",
            "How does Cargo build Rust code?",
            "en",
            Relational,
            &[("en_rust_chunk_2", 2.0), ("en_rust_chunk_0", 1.0)],
        ),
        LabelledQuery::new(
            "en-3",
            "Which database stores embeddings?",
            "en",
            Keyword,
            &[("en_stores_chunk_0", 2.0), ("en_stores_chunk_1", 1.0)],
        ),
        LabelledQuery::new(
            "en-4",
            "What is Neo4j used for?",
            "en",
            Factual,
            &[("en_stores_chunk_1", 2.0)],
        ),
        LabelledQuery::new(
            "en-5",
            "memory safety without garbage collection",
            "en",
            Keyword,
            &[("en_rust_chunk_1", 2.0)],
        ),
        LabelledQuery::new(
            "es-1",
            "¿Cuál es la capital de España?",
            "es",
            Keyword,
            &[("es_madrid_chunk_0", 2.0)],
        ),
        LabelledQuery::new(
            "es-2",
            "¿Qué obras de Velázquez hay en el Museo del Prado?",
            "es",
            Relational,
            &[("es_madrid_chunk_1", 2.0)],
        ),
        LabelledQuery::new(
            "es-3",
            "Gaudí y Barcelona",
            "es",
            Relational,
            &[("es_madrid_chunk_2", 2.0)],
        ),
        LabelledQuery::new(
            "ar-1",
            "ما هي عاصمة مصر؟",
            "ar",
            Keyword,
            &[("ar_cairo_chunk_0", 2.0)],
        ),
        LabelledQuery::new(
            "ar-2",
            "أين يمر نهر النيل؟",
            "ar",
            Factual,
            &[("ar_cairo_chunk_1", 2.0), ("ar_cairo_chunk_0", 1.0)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest::Chunker;
    use std::collections::HashSet;

    #[test]
    fn test_judgments_point_at_real_chunks() {
        let set = get_test_set();
        let chunker = Chunker::default();
        let chunk_ids: HashSet<String> = set
            .documents
            .iter()
            .flat_map(|doc| chunker.chunk_document(doc))
            .map(|chunk| chunk.id)
            .collect();

        assert_eq!(chunk_ids.len(), 12);
        for query in &set.queries {
            assert!(!query.relevance.is_empty(), "{} has no judgments", query.id);
            for chunk_id in query.relevance.keys() {
                assert!(chunk_ids.contains(chunk_id), "{} -> {}", query.id, chunk_id);
            }
        }
    }

    #[test]
    fn test_every_language_is_covered() {
        let set = get_test_set();
        let languages: HashSet<&str> = set.queries.iter().map(|q| q.language.as_str()).collect();
        assert_eq!(languages, HashSet::from(["en", "es", "ar"]));
    }
}
