use std::sync::Arc;
use tracing::{info, warn};

use super::{IndexError, VectorStore};
use crate::embedding::{EmbeddingError, EmbeddingModel};
use crate::models::chunk::{Chunk, DocumentChunk, RetrievedChunk};

const MAX_DOCUMENT_ID_LEN: usize = 128;

/// Per-document vector index: embeds chunks and queries, and keeps every
/// document in its own collection so searches never cross documents.
#[derive(Clone)]
pub struct DocumentIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingModel>,
}

impl DocumentIndex {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingModel>) -> Self {
        Self { store, embedder }
    }

    /// Embed and store all chunks of a document in one batch. Returns the
    /// number of chunks indexed.
    ///
    /// On failure after the collection was touched, the collection is
    /// dropped so no partially indexed document stays queryable.
    pub async fn upsert(&self, document_id: &str, chunks: Vec<Chunk>) -> Result<usize, IndexError> {
        if !is_valid_document_id(document_id) {
            return Err(IndexError::Backend {
                backend: self.store.backend_name(),
                message: format!("invalid collection name: {document_id:?}"),
            });
        }
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_for_ingestion(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(EmbeddingError::CountMismatch {
                sent: chunks.len(),
                received: embeddings.len(),
            }
            .into());
        }

        let document_chunks: Vec<_> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (chunk, embedding))| chunk.to_document_chunk(document_id, i, embedding))
            .collect();

        if let Err(e) = self.store_batch(document_id, &document_chunks).await {
            match self.store.delete_collection(document_id).await {
                Ok(_) => warn!("Indexing {document_id} failed, removed its collection: {e}"),
                Err(cleanup) => {
                    warn!("Indexing {document_id} failed ({e}); cleanup also failed: {cleanup}")
                }
            }
            return Err(e);
        }

        info!(
            "Indexed {} chunks for document {document_id} in {} store",
            document_chunks.len(),
            self.store.backend_name()
        );
        Ok(document_chunks.len())
    }

    async fn store_batch(
        &self,
        document_id: &str,
        chunks: &[DocumentChunk],
    ) -> Result<(), IndexError> {
        self.store
            .create_collection(document_id, self.embedder.dimensions())
            .await?;
        self.store.add(document_id, chunks).await
    }

    /// The `min(top_k, collection size)` chunks nearest to `query_text`.
    ///
    /// An unknown document, an invalid id, or an empty collection yields no
    /// results rather than an error. Querying never creates a collection.
    pub async fn query(
        &self,
        document_id: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        if !is_valid_document_id(document_id) || top_k == 0 {
            return Ok(vec![]);
        }

        let count = match self.store.count(document_id).await {
            Ok(count) => count,
            Err(e) => return self.vanished_or(document_id, e).await,
        };
        if count == 0 {
            return Ok(vec![]);
        }

        let embedding = self.embedder.embed_for_query(query_text).await?;
        match self
            .store
            .query(document_id, &embedding, top_k.min(count))
            .await
        {
            Ok(results) => {
                let best = results.first().map_or(0.0, |c| c.score);
                info!(
                    "Retrieved {} chunks for document {document_id} (best score {best:.3})",
                    results.len()
                );
                Ok(results)
            }
            Err(e) => self.vanished_or(document_id, e).await,
        }
    }

    /// A store error on a collection that was deleted mid-query reads as
    /// "document not found".
    async fn vanished_or(
        &self,
        document_id: &str,
        e: IndexError,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        if self.store.collection_exists(document_id).await.unwrap_or(true) {
            return Err(e);
        }
        warn!("Collection {document_id} vanished during query: {e}");
        Ok(vec![])
    }

    /// Drop a document's collection. Returns false when it does not exist.
    pub async fn delete_collection(&self, document_id: &str) -> Result<bool, IndexError> {
        if !is_valid_document_id(document_id) {
            return Ok(false);
        }
        let deleted = self.store.delete_collection(document_id).await?;
        if deleted {
            info!("Deleted collection for document {document_id}");
        }
        Ok(deleted)
    }
}

/// Collection names are restricted to ASCII alphanumerics, `-` and `_`.
pub fn is_valid_document_id(document_id: &str) -> bool {
    !document_id.is_empty()
        && document_id.len() <= MAX_DOCUMENT_ID_LEN
        && document_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
