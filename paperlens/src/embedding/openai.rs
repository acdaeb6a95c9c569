use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbeddingError, EmbeddingModel};

const BATCH_SIZE: usize = 100;

/// Embedding model behind any OpenAI-compatible `/embeddings` endpoint
/// (OpenAI, Ollama, vLLM, text-embeddings-inference).
pub struct OpenAIEmbeddingModel {
    base_url: String,
    model_name: String,
    api_key: Option<String>,
    dimensions: usize,
    http_client: reqwest::Client,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl OpenAIEmbeddingModel {
    pub fn new(
        base_url: &str,
        model_name: &str,
        api_key: Option<String>,
        dimensions: usize,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model_name: model_name.to_string(),
            api_key,
            dimensions,
            http_client,
            batch_size: BATCH_SIZE,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.model_name,
            input: texts,
        };

        let mut builder = self
            .http_client
            .post(format!("{}/embeddings", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder.send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api { status, body });
        }

        let response: EmbeddingResponse = resp.json().await?;
        let embeddings = order_embeddings(response.data);
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                sent: texts.len(),
                received: embeddings.len(),
            });
        }
        self.check_dimensions(&embeddings)?;
        Ok(embeddings)
    }

    fn check_dimensions(&self, embeddings: &[Vec<f32>]) -> Result<(), EmbeddingError> {
        match embeddings.iter().find(|e| e.len() != self.dimensions) {
            Some(bad) => Err(EmbeddingError::DimensionMismatch {
                expected: self.dimensions,
                got: bad.len(),
            }),
            None => Ok(()),
        }
    }
}

/// The API may return items out of order; `index` is authoritative.
fn order_embeddings(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    data.sort_by_key(|d| d.index);
    data.into_iter().map(|d| d.embedding).collect()
}

#[async_trait]
impl EmbeddingModel for OpenAIEmbeddingModel {
    async fn embed_for_ingestion(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            debug!("Embedding batch of {} texts", batch.len());
            all_embeddings.extend(self.embed_batch(batch).await?);
        }

        Ok(all_embeddings)
    }

    async fn embed_for_query(&self, query: &str) -> Result<Vec<f32>, EmbeddingError> {
        let results = self.embed_batch(&[query.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or(EmbeddingError::CountMismatch {
                sent: 1,
                received: 0,
            })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
