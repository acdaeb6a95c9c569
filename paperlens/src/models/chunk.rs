use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Build the vector-store key of a chunk: `{document_id}_chunk_{index}`.
pub fn chunk_id(document_id: &str, chunk_index: usize) -> String {
    format!("{document_id}_chunk_{chunk_index}")
}

/// Represents a raw chunk from parsing (before embedding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Chunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Convert to a DocumentChunk owned by `document_id`, stamping the
    /// `chunk_index` and `document_id` metadata fields.
    pub fn to_document_chunk(
        self,
        document_id: &str,
        chunk_index: usize,
        embedding: Vec<f32>,
    ) -> DocumentChunk {
        let mut metadata = self.metadata;
        metadata.insert("chunk_index".to_string(), serde_json::json!(chunk_index));
        metadata.insert("document_id".to_string(), serde_json::json!(document_id));

        DocumentChunk {
            id: chunk_id(document_id, chunk_index),
            document_id: document_id.to_string(),
            chunk_index,
            content: self.content,
            embedding,
            metadata,
        }
    }
}

/// Represents a chunk stored in a VectorStore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A chunk returned by a similarity query, best match first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    /// Similarity score (higher is closer).
    pub score: f32,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RetrievedChunk {
    /// Page label recorded at chunking time, if any.
    pub fn page(&self) -> Option<&str> {
        self.metadata.get("page").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_to_document_chunk() {
        let chunk = Chunk::new("Hello world");
        let doc_chunk = chunk.to_document_chunk("doc1", 3, vec![1.0, 2.0, 3.0]);
        assert_eq!(doc_chunk.id, "doc1_chunk_3");
        assert_eq!(doc_chunk.document_id, "doc1");
        assert_eq!(doc_chunk.chunk_index, 3);
        assert_eq!(doc_chunk.embedding.len(), 3);
        assert_eq!(doc_chunk.metadata["chunk_index"], 3);
        assert_eq!(doc_chunk.metadata["document_id"], "doc1");
    }

    #[test]
    fn test_to_document_chunk_keeps_page_metadata() {
        let mut chunk = Chunk::new("text");
        chunk
            .metadata
            .insert("page".to_string(), serde_json::json!("Page 2"));
        let doc_chunk = chunk.to_document_chunk("doc1", 0, vec![]);
        assert_eq!(doc_chunk.metadata["page"], "Page 2");
    }

    #[test]
    fn test_retrieved_chunk_page() {
        let mut metadata = HashMap::new();
        metadata.insert("page".to_string(), serde_json::json!("Pages 1-2"));
        let chunk = RetrievedChunk {
            content: "x".to_string(),
            score: 0.5,
            metadata,
        };
        assert_eq!(chunk.page(), Some("Pages 1-2"));

        let bare = RetrievedChunk {
            content: "x".to_string(),
            score: 0.5,
            metadata: HashMap::new(),
        };
        assert_eq!(bare.page(), None);
    }
}
