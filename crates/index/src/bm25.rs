//! Okapi BM25 over a mixed-language chunk corpus.
//!
//! IDF uses the smoothed Robertson-Sparck-Jones form
//! `ln(N - n + 0.5) - ln(n + 0.5)`. Terms that come out negative (present in
//! more than half the corpus) are floored at `epsilon * mean_idf`.
//! Length normalization uses one corpus-wide `avgdl`, regardless of language.

use std::collections::{BTreeMap, HashMap};

use ingest::Chunk;
use tracing::debug;

use crate::tokenizer::MultilingualTokenizer;
use crate::types::MethodResult;

pub const DEFAULT_K1: f64 = 1.5;
pub const DEFAULT_B: f64 = 0.75;
pub const DEFAULT_EPSILON: f64 = 0.25;

#[derive(Debug, Clone)]
struct IndexedDoc {
    id: String,
    text: String,
    language: String,
    term_freqs: HashMap<String, usize>,
    len: usize,
}

#[derive(Debug, Clone)]
pub struct Bm25Index {
    k1: f64,
    b: f64,
    epsilon: f64,
    tokenizer: MultilingualTokenizer,
    docs: Vec<IndexedDoc>,
    idf: HashMap<String, f64>,
    avgdl: f64,
}

impl Bm25Index {
    pub fn new(k1: f64, b: f64) -> Self {
        Self::with_tokenizer(k1, b, MultilingualTokenizer::new())
    }

    pub fn with_tokenizer(k1: f64, b: f64, tokenizer: MultilingualTokenizer) -> Self {
        Self {
            k1,
            b,
            epsilon: DEFAULT_EPSILON,
            tokenizer,
            docs: Vec::new(),
            idf: HashMap::new(),
            avgdl: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn avgdl(&self) -> f64 {
        self.avgdl
    }

    /// Rebuild the index from scratch over `chunks`.
    pub fn index(&mut self, chunks: &[Chunk]) {
        self.docs = chunks
            .iter()
            .map(|chunk| {
                let tokens = self.tokenizer.tokenize(&chunk.text, &chunk.language);
                let mut term_freqs = HashMap::new();
                for token in &tokens {
                    *term_freqs.entry(token.clone()).or_insert(0) += 1;
                }
                IndexedDoc {
                    id: chunk.id.clone(),
                    text: chunk.text.clone(),
                    language: chunk.language.clone(),
                    term_freqs,
                    len: tokens.len(),
                }
            })
            .collect();

        let total_len: usize = self.docs.iter().map(|d| d.len).sum();
        self.avgdl = if self.docs.is_empty() {
            0.0
        } else {
            total_len as f64 / self.docs.len() as f64
        };

        self.compute_idf();
        debug!(
            documents = self.docs.len(),
            vocabulary = self.idf.len(),
            avgdl = self.avgdl,
            "BM25 index rebuilt"
        );
    }

    fn compute_idf(&mut self) {
        // Sorted, so the floor sums in the same order on every rebuild
        let mut doc_freqs: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in &self.docs {
            for term in doc.term_freqs.keys() {
                *doc_freqs.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let n = self.docs.len() as f64;
        let mut idf = HashMap::with_capacity(doc_freqs.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();

        for (term, freq) in doc_freqs {
            let freq = freq as f64;
            let value = (n - freq + 0.5).ln() - (freq + 0.5).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.to_string());
            }
            idf.insert(term.to_string(), value);
        }

        if !idf.is_empty() {
            let floor = self.epsilon * (idf_sum / idf.len() as f64);
            for term in negative {
                idf.insert(term, floor);
            }
        }

        self.idf = idf;
    }

    pub fn clear(&mut self) {
        self.docs.clear();
        self.idf.clear();
        self.avgdl = 0.0;
    }

    fn score_tokens(&self, tokens: &[String], doc: &IndexedDoc) -> f64 {
        let length_ratio = if self.avgdl > 0.0 {
            doc.len as f64 / self.avgdl
        } else {
            0.0
        };
        let norm = self.k1 * (1.0 - self.b + self.b * length_ratio);

        tokens
            .iter()
            .map(|token| {
                let idf = self.idf.get(token).copied().unwrap_or(0.0);
                let tf = doc.term_freqs.get(token).copied().unwrap_or(0) as f64;
                idf * (tf * (self.k1 + 1.0)) / (tf + norm)
            })
            .sum()
    }

    /// Score a query against every document and return the top `top_k`.
    ///
    /// Ranks are assigned over the unfiltered top-k list; the `min_score`
    /// and language filters are applied afterwards, so surviving ranks may
    /// have gaps. An empty `language` disables the language filter.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        language: &str,
        min_score: f64,
    ) -> Vec<MethodResult> {
        if self.docs.is_empty() {
            return Vec::new();
        }

        let tokens = self.tokenizer.tokenize(query, language);
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = self
            .docs
            .iter()
            .enumerate()
            .map(|(i, doc)| (i, self.score_tokens(&tokens, doc)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(pos, (i, score))| (pos + 1, &self.docs[i], score))
            .filter(|(_, doc, score)| {
                *score > min_score && (language.is_empty() || doc.language == language)
            })
            .map(|(rank, doc, score)| {
                MethodResult::new(&doc.id, score, rank, &doc.text, &doc.language)
            })
            .collect()
    }

    /// Score one indexed document, `None` if the id is unknown.
    pub fn score_document(&self, query: &str, doc_id: &str, language: &str) -> Option<f64> {
        let doc = self.docs.iter().find(|d| d.id == doc_id)?;
        let tokens = self.tokenizer.tokenize(query, language);
        Some(self.score_tokens(&tokens, doc))
    }
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new(DEFAULT_K1, DEFAULT_B)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str, language: &str) -> Chunk {
        let mut chunk = Chunk::new(id, 0, text.to_string(), language.to_string(), "test".to_string());
        chunk.id = id.to_string();
        chunk
    }

    fn mixed_corpus() -> Vec<Chunk> {
        vec![
            chunk("en1", "python python programming language", "en"),
            chunk("en2", "python data science", "en"),
            chunk("en3", "cooking recipes pasta", "en"),
            chunk(
                "es1",
                "python es un lenguaje de programación popular en ciencia de datos y muchas otras cosas",
                "es",
            ),
            chunk("ar1", "الذكاء الاصطناعي يغير العالم", "ar"),
        ]
    }

    #[test]
    fn test_empty_corpus_returns_nothing() {
        let index = Bm25Index::default();
        assert!(index.search("python", 10, "en", 0.0).is_empty());
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let mut index = Bm25Index::default();
        index.index(&mixed_corpus());
        // only stopwords
        assert!(index.search("the of and", 10, "en", -999.0).is_empty());
        assert!(index.search("", 10, "", -999.0).is_empty());
    }

    #[test]
    fn test_deterministic_scores_and_order() {
        let mut index = Bm25Index::default();
        index.index(&mixed_corpus());

        let first = index.search("python programming", 10, "", -999.0);
        let second = index.search("python programming", 10, "", -999.0);
        assert_eq!(first, second);
        assert_eq!(first[0].id, "en1");
    }

    #[test]
    fn test_more_occurrences_never_lower_score() {
        let corpus = vec![
            chunk("d1", "rust fast safe", "en"),
            chunk("d2", "rust rust safe", "en"),
            chunk("d3", "cooking pasta tomato", "en"),
            chunk("d4", "music guitar drums", "en"),
            chunk("d5", "garden flowers trees", "en"),
        ];
        let mut index = Bm25Index::default();
        index.index(&corpus);

        let once = index.score_document("rust", "d1", "en").unwrap();
        let twice = index.score_document("rust", "d2", "en").unwrap();
        assert!(once > 0.0);
        assert!(twice >= once);
    }

    #[test]
    fn test_language_filter_keeps_unfiltered_ranks() {
        let mut index = Bm25Index::default();
        index.index(&mixed_corpus());

        let unfiltered = index.search("python", 10, "", -999.0);
        assert_eq!(unfiltered.len(), 5);
        let ranks: Vec<usize> = unfiltered.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);

        let spanish = index.search("python", 10, "es", -999.0);
        assert_eq!(spanish.len(), 1);
        assert_eq!(spanish[0].id, "es1");
        assert_eq!(spanish[0].language, "es");

        // rank is the position in the unfiltered top-k, not renumbered
        let expected = unfiltered.iter().find(|r| r.id == "es1").unwrap();
        assert_eq!(spanish[0].rank, expected.rank);
        assert_eq!(spanish[0].rank, 3);
    }

    #[test]
    fn test_min_score_is_strict() {
        let mut index = Bm25Index::default();
        index.index(&mixed_corpus());

        let results = index.search("python", 10, "", 0.0);
        assert!(results.iter().all(|r| r.score > 0.0));
        assert!(!results.iter().any(|r| r.id == "en3" || r.id == "ar1"));
    }

    #[test]
    fn test_negative_idf_is_floored() {
        let corpus = vec![
            chunk("c1", "machine learning is great", "en"),
            chunk("c2", "deep learning uses neural networks", "en"),
            chunk("c3", "cats are animals", "en"),
        ];
        let mut index = Bm25Index::default();
        index.index(&corpus);

        // "learning" appears in 2 of 3 docs; raw idf is negative
        let c2 = index.score_document("learning", "c2", "en").unwrap();
        assert!(c2 > 0.0);
        assert_eq!(index.score_document("learning", "c3", "en"), Some(0.0));
        assert_eq!(index.score_document("learning", "missing", "en"), None);
    }

    #[test]
    fn test_top_k_truncates_before_filtering() {
        let mut index = Bm25Index::default();
        index.index(&mixed_corpus());

        // es1 sits at rank 3, outside a top-2 window
        assert!(index.search("python", 2, "es", -999.0).is_empty());
        assert_eq!(index.search("python", 2, "", -999.0).len(), 2);
    }

    #[test]
    fn test_reindex_replaces_state() {
        let mut index = Bm25Index::default();
        index.index(&mixed_corpus());
        index.index(&[chunk("new", "graph databases", "en")]);

        assert_eq!(index.len(), 1);
        let results = index.search("python", 10, "", -999.0);
        assert!(results.iter().all(|r| r.id == "new"));
        assert_eq!(index.search("graph", 10, "en", -999.0)[0].id, "new");

        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.avgdl(), 0.0);
    }

    #[test]
    fn test_avgdl_is_corpus_wide() {
        let mut index = Bm25Index::default();
        index.index(&mixed_corpus());
        // 4 + 3 + 3 + 10 + 4 tokens
        assert!((index.avgdl() - 4.8).abs() < 1e-9);
    }

    #[test]
    fn test_rebuilds_score_bit_identically() {
        let corpus = mixed_corpus();
        let mut reversed = corpus.clone();
        reversed.reverse();

        let mut first = Bm25Index::default();
        first.index(&corpus);
        let mut second = Bm25Index::default();
        second.index(&reversed);

        for (query, id) in [("python programming", "en1"), ("ciencia datos", "es1"), ("cooking", "en2")] {
            let a = first.score_document(query, id, "").unwrap();
            let b = second.score_document(query, id, "").unwrap();
            assert_eq!(a.to_bits(), b.to_bits(), "{query} on {id}");
        }
    }
}
