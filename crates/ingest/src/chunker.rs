use crate::chunk::Chunk;
use crate::document::Document;

pub struct ChunkerConfig {
    /// Paragraph separator
    pub separator: String,
    /// Paragraphs shorter than this (in chars, after trimming) are dropped
    pub min_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            separator: "\n\n".to_string(),
            min_chars: 1,
        }
    }
}

/// Paragraph chunker: one chunk per blank-line delimited paragraph.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.split_by_paragraphs(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, para)| {
                Chunk::new(
                    &document.id,
                    i,
                    para,
                    document.language.clone(),
                    document.source().to_string(),
                )
            })
            .collect()
    }

    fn split_by_paragraphs(&self, text: &str) -> Vec<String> {
        text.split(self.config.separator.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| s.chars().count() >= self.config.min_chars.max(1))
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}
