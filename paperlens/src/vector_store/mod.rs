pub mod index;
pub mod lance;
pub mod qdrant;

use async_trait::async_trait;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::models::chunk::{DocumentChunk, RetrievedChunk};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error("{backend} vector store error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
    #[error("Vector store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Vector store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Abstract vector store interface. Every document owns one collection,
/// named after its id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, name: &str) -> Result<bool, IndexError>;

    /// Create a collection for vectors of `dimensions` length. A no-op when
    /// it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), IndexError>;

    /// Insert chunks, replacing any stored chunk with the same id.
    async fn add(&self, name: &str, chunks: &[DocumentChunk]) -> Result<(), IndexError>;

    /// Number of stored chunks; 0 for a missing collection.
    async fn count(&self, name: &str) -> Result<usize, IndexError>;

    /// The `k` nearest chunks by cosine similarity, best first. A missing
    /// collection yields no results.
    async fn query(
        &self,
        name: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError>;

    /// Drop a collection. Returns whether it existed.
    async fn delete_collection(&self, name: &str) -> Result<bool, IndexError>;

    /// Return the backend name for logging.
    fn backend_name(&self) -> &'static str;
}
