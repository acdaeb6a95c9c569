pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Embedding API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("Embedding count mismatch: sent {sent} texts, received {received} embeddings")]
    CountMismatch { sent: usize, received: usize },
}

/// Abstract embedding model interface.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed a list of text chunks for ingestion. Returns one embedding per text, in order.
    async fn embed_for_ingestion(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single query string.
    async fn embed_for_query(&self, query: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Return the embedding dimensions.
    fn dimensions(&self) -> usize;
}
