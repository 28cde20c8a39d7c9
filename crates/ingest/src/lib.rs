pub mod chunk;
pub mod chunker;
pub mod document;
pub mod reader;

pub use chunk::{Chunk, ChunkMetadata};
pub use chunker::{Chunker, ChunkerConfig};
pub use document::Document;
pub use reader::FileReader;

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// Generate a stable document ID from raw content (16 hex chars)
pub fn generate_doc_id(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Split a document into paragraph chunks with the default chunker
pub fn chunk_document(document: &Document) -> Vec<Chunk> {
    Chunker::default().chunk_document(document)
}

/// Read a text file into a document
pub async fn ingest_file(file_path: &Path, language: &str) -> Result<Document> {
    let content = FileReader::read_file(file_path).await?;
    let path_str = file_path.to_string_lossy().to_string();

    Ok(Document::new(content, language).with_source(path_str))
}

/// Read every text file below a directory
pub async fn ingest_directory(dir_path: &Path, language: &str) -> Result<Vec<Document>> {
    let files = FileReader::read_directory(dir_path).await?;
    info!(files = files.len(), dir = %dir_path.display(), "Read documents");

    Ok(files
        .into_iter()
        .map(|(path, content)| Document::new(content, language).with_source(path))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_is_deterministic() {
        assert_eq!(generate_doc_id(b"hello"), generate_doc_id(b"hello"));
        assert_ne!(generate_doc_id(b"hello"), generate_doc_id(b"world"));
    }

    #[tokio::test]
    async fn test_ingest_file_sets_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "one\n\ntwo").unwrap();

        let doc = ingest_file(&path, "en").await.unwrap();
        assert_eq!(doc.language, "en");
        assert!(doc.source().ends_with("notes.txt"));
        assert_eq!(chunk_document(&doc).len(), 2);
    }

    #[tokio::test]
    async fn test_ingest_directory_reads_text_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "bravo").unwrap();
        std::fs::write(dir.path().join("a.md"), "# alpha").unwrap();
        std::fs::write(dir.path().join("notes.csv"), "x,y").unwrap();
        std::fs::write(dir.path().join("scan.pdf"), "binary").unwrap();

        let docs = ingest_directory(dir.path(), "es").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].source().ends_with("a.md"));
        assert!(docs[1].source().ends_with("b.txt"));
        assert_eq!(docs[1].text, "bravo");
        assert!(docs.iter().all(|d| d.language == "es"));
        assert_ne!(docs[0].id, docs[1].id);
    }
}
