use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub chunk_index: usize,
    pub source: String,
}

/// Smallest retrievable unit. The id is shared by the BM25 index, the dense
/// index and the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub language: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(
        doc_id: &str,
        chunk_index: usize,
        text: String,
        language: String,
        source: String,
    ) -> Self {
        Self {
            id: Self::generate_chunk_id(doc_id, chunk_index),
            text,
            language,
            metadata: ChunkMetadata {
                document_id: doc_id.to_string(),
                chunk_index,
                source,
            },
        }
    }

    pub fn generate_chunk_id(doc_id: &str, chunk_index: usize) -> String {
        format!("{}_chunk_{}", doc_id, chunk_index)
    }

    pub fn doc_id(&self) -> &str {
        &self.metadata.document_id
    }
}
