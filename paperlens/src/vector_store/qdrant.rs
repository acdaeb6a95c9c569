use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info};

use super::{IndexError, VectorStore};
use crate::models::chunk::{DocumentChunk, RetrievedChunk};

const BACKEND: &str = "qdrant";

/// Vector store backed by a Qdrant server, one Qdrant collection per
/// document with cosine distance. Chunk text and metadata live in the point
/// payload.
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    pub fn new(url: &str) -> Result<Self, IndexError> {
        let client = Qdrant::from_url(url).build().map_err(map_err)?;
        info!("Qdrant vector store at {url}");
        Ok(Self { client })
    }
}

fn map_err(e: QdrantError) -> IndexError {
    IndexError::Backend {
        backend: BACKEND,
        message: e.to_string(),
    }
}

fn to_point(chunk: &DocumentChunk) -> Result<PointStruct, IndexError> {
    let payload = Payload::try_from(json!({
        "chunk_id": chunk.id,
        "content": chunk.content,
        "document_id": chunk.document_id,
        "chunk_index": chunk.chunk_index,
        "metadata": chunk.metadata,
    }))
    .map_err(map_err)?;

    // Point ids must be integers or UUIDs; the chunk index is unique within
    // a document's collection.
    Ok(PointStruct::new(
        chunk.chunk_index as u64,
        chunk.embedding.clone(),
        payload,
    ))
}

fn from_payload(mut payload: HashMap<String, QdrantValue>, score: f32) -> RetrievedChunk {
    let content = match payload.remove("content").map(to_json) {
        Some(serde_json::Value::String(s)) => s,
        _ => String::new(),
    };
    let metadata = match payload.remove("metadata").map(to_json) {
        Some(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => HashMap::new(),
    };
    RetrievedChunk {
        content,
        score,
        metadata,
    }
}

fn to_json(value: QdrantValue) -> serde_json::Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => json!(b),
        Some(Kind::IntegerValue(i)) => json!(i),
        Some(Kind::DoubleValue(d)) => json!(d),
        Some(Kind::StringValue(s)) => json!(s),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(to_json).collect())
        }
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields.into_iter().map(|(k, v)| (k, to_json(v))).collect(),
        ),
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, IndexError> {
        self.client.collection_exists(name).await.map_err(map_err)
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), IndexError> {
        if self.collection_exists(name).await? {
            debug!("Qdrant collection {name} already exists, skipping creation");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(map_err)?;
        debug!("Created qdrant collection {name} ({dimensions} dims)");
        Ok(())
    }

    async fn add(&self, name: &str, chunks: &[DocumentChunk]) -> Result<(), IndexError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points = chunks.iter().map(to_point).collect::<Result<Vec<_>, _>>()?;
        self.client
            .upsert_points(UpsertPointsBuilder::new(name, points).wait(true))
            .await
            .map_err(map_err)?;
        debug!("Upserted {} chunks to qdrant collection {name}", chunks.len());
        Ok(())
    }

    async fn count(&self, name: &str) -> Result<usize, IndexError> {
        if !self.collection_exists(name).await? {
            return Ok(0);
        }
        let response = self
            .client
            .count(CountPointsBuilder::new(name).exact(true))
            .await
            .map_err(map_err)?;
        Ok(response.result.map_or(0, |r| r.count as usize))
    }

    async fn query(
        &self,
        name: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        if !self.collection_exists(name).await? {
            return Ok(vec![]);
        }

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(name, embedding.to_vec(), k as u64).with_payload(true),
            )
            .await
            .map_err(map_err)?;

        Ok(response
            .result
            .into_iter()
            .map(|point| from_payload(point.payload, point.score))
            .collect())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, IndexError> {
        if !self.collection_exists(name).await? {
            return Ok(false);
        }
        let response = self.client.delete_collection(name).await.map_err(map_err)?;
        Ok(response.result)
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
