//! Deterministic collaborators shared by the unit tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::app::AppState;
use crate::completion::{
    CompletionError, CompletionModel, CompletionParams, CompletionResult, Message,
};
use crate::config::{Settings, TomlConfig, resolve_settings};
use crate::embedding::{EmbeddingError, EmbeddingModel};
use crate::models::chunk::{DocumentChunk, RetrievedChunk};
use crate::parser::pdf::{ExtractedText, ExtractionError, TextExtractor};
use crate::rag::RagService;
use crate::rag::generator::Generator;
use crate::vector_store::index::DocumentIndex;
use crate::vector_store::lance::LanceVectorStore;
use crate::vector_store::{IndexError, VectorStore};

const VOCABULARY: [&str; 7] = [
    "attention",
    "transformer",
    "convolution",
    "dataset",
    "results",
    "method",
    "abstract",
];

/// Bag-of-keywords embedding: one dimension per vocabulary word plus a
/// constant bias so no vector is all zeros.
pub struct KeywordEmbedding;

impl KeywordEmbedding {
    fn embed(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect();
        vector.push(1.0);
        vector
    }
}

#[async_trait]
impl EmbeddingModel for KeywordEmbedding {
    async fn embed_for_ingestion(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| Self::embed(t)).collect())
    }

    async fn embed_for_query(&self, query: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(Self::embed(query))
    }

    fn dimensions(&self) -> usize {
        VOCABULARY.len() + 1
    }
}

/// Returns a fixed answer and records every request.
pub struct RecordingCompletion {
    name: String,
    answer: String,
    calls: Mutex<Vec<(Vec<Message>, CompletionParams)>>,
}

impl RecordingCompletion {
    pub fn new(name: &str, answer: &str) -> Self {
        Self {
            name: name.to_string(),
            answer: answer.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Vec<Message>, CompletionParams)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for RecordingCompletion {
    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<CompletionResult, CompletionError> {
        self.calls
            .lock()
            .unwrap()
            .push((messages.to_vec(), *params));
        Ok(CompletionResult {
            content: self.answer.clone(),
            usage: None,
        })
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// Always fails as if the provider were down.
pub struct FailingCompletion {
    name: String,
}

impl FailingCompletion {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl CompletionModel for FailingCompletion {
    async fn complete(
        &self,
        _messages: &[Message],
        _params: &CompletionParams,
    ) -> Result<CompletionResult, CompletionError> {
        Err(CompletionError::Api {
            status: 503,
            body: format!("{} unavailable", self.name),
        })
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// LanceDB store whose `add` always fails.
pub struct FailingAddStore {
    inner: LanceVectorStore,
    _dir: TempDir,
}

impl FailingAddStore {
    pub async fn collection_names(&self) -> Vec<String> {
        self.inner.collection_names().await.unwrap()
    }
}

pub async fn failing_store() -> Arc<FailingAddStore> {
    let dir = TempDir::new().unwrap();
    Arc::new(FailingAddStore {
        inner: LanceVectorStore::connect(dir.path()).await.unwrap(),
        _dir: dir,
    })
}

#[async_trait]
impl VectorStore for FailingAddStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, IndexError> {
        self.inner.collection_exists(name).await
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), IndexError> {
        self.inner.create_collection(name, dimensions).await
    }

    async fn add(&self, _name: &str, _chunks: &[DocumentChunk]) -> Result<(), IndexError> {
        Err(IndexError::Backend {
            backend: "lancedb",
            message: "disk full".to_string(),
        })
    }

    async fn count(&self, name: &str) -> Result<usize, IndexError> {
        self.inner.count(name).await
    }

    async fn query(
        &self,
        name: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        self.inner.query(name, embedding, k).await
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, IndexError> {
        self.inner.delete_collection(name).await
    }

    fn backend_name(&self) -> &'static str {
        "lancedb"
    }
}

/// A store whose collection is always gone by the time it is read: every
/// read fails and `collection_exists` reports false.
pub struct VanishingStore;

#[async_trait]
impl VectorStore for VanishingStore {
    async fn collection_exists(&self, _name: &str) -> Result<bool, IndexError> {
        Ok(false)
    }

    async fn create_collection(&self, _name: &str, _dimensions: usize) -> Result<(), IndexError> {
        Ok(())
    }

    async fn add(&self, _name: &str, _chunks: &[DocumentChunk]) -> Result<(), IndexError> {
        Ok(())
    }

    async fn count(&self, name: &str) -> Result<usize, IndexError> {
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, format!("{name}.lance")).into())
    }

    async fn query(
        &self,
        name: &str,
        _embedding: &[f32],
        _k: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, format!("{name}.lance")).into())
    }

    async fn delete_collection(&self, _name: &str) -> Result<bool, IndexError> {
        Ok(false)
    }

    fn backend_name(&self) -> &'static str {
        "vanishing"
    }
}

/// Extractor that ignores the bytes and returns fixed pages.
pub struct CannedExtractor {
    pages: Vec<String>,
}

impl CannedExtractor {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[async_trait]
impl TextExtractor for CannedExtractor {
    async fn extract(&self, _bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        Ok(ExtractedText::from_pages(&self.pages))
    }
}

pub fn test_settings() -> Settings {
    resolve_settings(TomlConfig::default(), |key| {
        (key == "GROQ_API_KEY").then(|| "test-key".to_string())
    })
    .unwrap()
}

/// App state over a LanceDB store in a fresh temp dir. Keep the dir alive
/// for the duration of the test.
pub async fn test_state(
    settings: Settings,
    extractor: Arc<dyn TextExtractor>,
    model: Arc<dyn CompletionModel>,
) -> (Arc<AppState>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(LanceVectorStore::connect(dir.path()).await.unwrap());
    let state = test_state_with_store(settings, extractor, model, store);
    (state, dir)
}

pub fn test_state_with_store(
    settings: Settings,
    extractor: Arc<dyn TextExtractor>,
    model: Arc<dyn CompletionModel>,
    store: Arc<dyn VectorStore>,
) -> Arc<AppState> {
    let index = DocumentIndex::new(store, Arc::new(KeywordEmbedding));
    let generator = Generator::new(model, None, settings.completion_params);
    let rag = RagService::new(index, generator, settings.top_k);
    Arc::new(AppState {
        settings,
        extractor,
        rag,
    })
}

pub const MULTIPART_BOUNDARY: &str = "paperlens-test-boundary";

/// A `multipart/form-data` body with one `file` part.
pub fn multipart_body(filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{MULTIPART_BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
