pub mod generator;
pub mod prompt;

use thiserror::Error;
use tracing::info;

use crate::models::api::{ChatMessage, ExplanationLevel};
use crate::models::chunk::Chunk;
use crate::vector_store::IndexError;
use crate::vector_store::index::DocumentIndex;
use generator::{GenerationError, Generator};

#[derive(Debug, Error)]
pub enum RagError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Answer plus citation snippets for one question.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<String>,
}

/// Retrieval-augmented question answering over per-document indexes.
#[derive(Clone)]
pub struct RagService {
    index: DocumentIndex,
    generator: Generator,
    top_k: usize,
}

impl RagService {
    pub fn new(index: DocumentIndex, generator: Generator, top_k: usize) -> Self {
        Self {
            index,
            generator,
            top_k,
        }
    }

    pub async fn add_document(&self, document_id: &str, chunks: Vec<Chunk>) -> Result<usize, RagError> {
        info!("Adding document {document_id} to RAG system");
        Ok(self.index.upsert(document_id, chunks).await?)
    }

    /// Retrieve the nearest chunks and generate a grounded answer. Nothing
    /// retrieved means a fixed answer and no model call.
    pub async fn query(
        &self,
        document_id: &str,
        question: &str,
        level: ExplanationLevel,
        history: &[ChatMessage],
    ) -> Result<QueryAnswer, RagError> {
        info!("Processing query for document {document_id}");

        let chunks = self.index.query(document_id, question, self.top_k).await?;
        if chunks.is_empty() {
            info!("No relevant chunks for document {document_id}");
            return Ok(QueryAnswer {
                answer: prompt::NO_RELEVANT_INFORMATION.to_string(),
                sources: vec![],
            });
        }

        let messages = prompt::build_messages(question, &chunks, level, history);
        let answer = self.generator.generate(&messages).await?;

        Ok(QueryAnswer {
            answer,
            sources: prompt::source_snippets(&chunks),
        })
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<bool, RagError> {
        Ok(self.index.delete_collection(document_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionParams;
    use crate::testing::{FailingCompletion, KeywordEmbedding, RecordingCompletion};
    use crate::vector_store::lance::LanceVectorStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn service(dir: &TempDir, model: Arc<RecordingCompletion>) -> RagService {
        let index = DocumentIndex::new(
            Arc::new(LanceVectorStore::connect(dir.path()).await.unwrap()),
            Arc::new(KeywordEmbedding),
        );
        RagService::new(
            index,
            Generator::new(model, None, CompletionParams::default()),
            5,
        )
    }

    fn paper_chunks() -> Vec<Chunk> {
        [
            "[Page 1]\nWe introduce a transformer built on attention.",
            "[Page 2]\nThe dataset has ten thousand labeled samples.",
            "[Page 3]\nResults beat the convolution baseline.",
        ]
        .iter()
        .map(|t| Chunk::new(*t))
        .collect()
    }

    #[tokio::test]
    async fn test_empty_document_short_circuits() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(RecordingCompletion::new("llm", "should not be used"));
        let rag = service(&dir, model.clone()).await;

        let answer = rag
            .query("unknown", "What is this?", ExplanationLevel::Student, &[])
            .await
            .unwrap();

        assert_eq!(answer.answer, prompt::NO_RELEVANT_INFORMATION);
        assert!(answer.sources.is_empty());
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn test_query_builds_grounded_request() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(RecordingCompletion::new("llm", "It uses attention."));
        let rag = service(&dir, model.clone()).await;
        assert_eq!(rag.add_document("doc1", paper_chunks()).await.unwrap(), 3);

        let answer = rag
            .query(
                "doc1",
                "How does attention work?",
                ExplanationLevel::Researcher,
                &[],
            )
            .await
            .unwrap();

        assert_eq!(answer.answer, "It uses attention.");
        assert_eq!(answer.sources.len(), 3);
        assert!(answer.sources[0].contains("attention"));
        assert!(answer.sources.iter().all(|s| s.ends_with("...")));

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        let (messages, params) = &calls[0];
        assert!(messages[0].content.contains("RESEARCHER LEVEL"));
        assert!(messages.last().unwrap().content.contains("[Context 1]"));
        assert_eq!(*params, CompletionParams::default());
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let index = DocumentIndex::new(
            Arc::new(LanceVectorStore::connect(dir.path()).await.unwrap()),
            Arc::new(KeywordEmbedding),
        );
        let rag = RagService::new(
            index,
            Generator::new(
                Arc::new(FailingCompletion::new("a")),
                Some(Arc::new(FailingCompletion::new("b"))),
                CompletionParams::default(),
            ),
            5,
        );
        rag.add_document("doc1", paper_chunks()).await.unwrap();

        let result = rag
            .query("doc1", "attention?", ExplanationLevel::Student, &[])
            .await;
        assert!(matches!(result, Err(RagError::Generation(_))));
    }

    #[tokio::test]
    async fn test_delete_document() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(RecordingCompletion::new("llm", "answer"));
        let rag = service(&dir, model.clone()).await;
        rag.add_document("doc1", paper_chunks()).await.unwrap();

        assert!(rag.delete_document("doc1").await.unwrap());
        assert!(!rag.delete_document("doc1").await.unwrap());

        let answer = rag
            .query("doc1", "attention", ExplanationLevel::Student, &[])
            .await
            .unwrap();
        assert_eq!(answer.answer, prompt::NO_RELEVANT_INFORMATION);
        assert!(model.calls().is_empty());
    }
}
