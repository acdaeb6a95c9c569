//! Embedded LanceDB vector store. Each document collection is a Lance table
//! under one local directory.

use arrow_array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator,
    RecordBatchReader, StringArray,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::arrow::arrow_schema::{DataType, Field, Schema, SchemaRef};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table, connect};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{IndexError, VectorStore};
use crate::models::chunk::{DocumentChunk, RetrievedChunk};

const BACKEND: &str = "lancedb";
const VECTOR_COLUMN: &str = "vector";

pub struct LanceVectorStore {
    conn: Connection,
}

impl LanceVectorStore {
    /// Open (or create) the database directory at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        tokio::fs::create_dir_all(path).await?;
        let conn = connect(&path.to_string_lossy())
            .execute()
            .await
            .map_err(backend_error)?;
        info!("LanceDB vector store at {}", path.display());
        Ok(Self { conn })
    }

    /// Names of all stored collections.
    pub async fn collection_names(&self) -> Result<Vec<String>, IndexError> {
        self.conn
            .table_names()
            .execute()
            .await
            .map_err(backend_error)
    }

    fn schema(dimensions: usize) -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                VECTOR_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimensions as i32,
                ),
                false,
            ),
        ]))
    }

    /// `None` when the table does not exist.
    async fn open(&self, name: &str) -> Result<Option<Table>, IndexError> {
        match self.conn.open_table(name).execute().await {
            Ok(table) => Ok(Some(table)),
            Err(lancedb::Error::TableNotFound { .. }) => Ok(None),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn table_dimensions(table: &Table) -> Result<usize, IndexError> {
        let schema = table.schema().await.map_err(backend_error)?;
        match schema.field_with_name(VECTOR_COLUMN).map(|f| f.data_type()) {
            Ok(DataType::FixedSizeList(_, size)) => Ok(*size as usize),
            _ => Err(backend_error(format!(
                "table {} has no fixed-size vector column",
                table.name()
            ))),
        }
    }

    fn to_batch(chunks: &[DocumentChunk], dimensions: usize) -> Result<RecordBatch, IndexError> {
        let ids = StringArray::from_iter_values(chunks.iter().map(|c| c.id.as_str()));
        let contents = StringArray::from_iter_values(chunks.iter().map(|c| c.content.as_str()));
        let metadata = chunks
            .iter()
            .map(|c| serde_json::to_string(&c.metadata))
            .collect::<Result<Vec<_>, _>>()?;
        let metadata = StringArray::from(metadata);

        let values = Float32Array::from_iter_values(
            chunks.iter().flat_map(|c| c.embedding.iter().copied()),
        );
        let vectors = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            dimensions as i32,
            Arc::new(values),
            None,
        )
        .map_err(backend_error)?;

        RecordBatch::try_new(
            Self::schema(dimensions),
            vec![
                Arc::new(ids) as ArrayRef,
                Arc::new(contents) as ArrayRef,
                Arc::new(metadata) as ArrayRef,
                Arc::new(vectors) as ArrayRef,
            ],
        )
        .map_err(backend_error)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<RetrievedChunk>, IndexError> {
        let contents = string_column(batch, "content")?;
        let metadata = string_column(batch, "metadata")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| backend_error("missing _distance column"))?;

        (0..batch.num_rows())
            .map(|i| -> Result<RetrievedChunk, IndexError> {
                let metadata: HashMap<String, serde_json::Value> =
                    serde_json::from_str(metadata.value(i))?;
                Ok(RetrievedChunk {
                    content: contents.value(i).to_string(),
                    // Cosine distance is 1 - similarity.
                    score: 1.0 - distances.value(i),
                    metadata,
                })
            })
            .collect()
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, IndexError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| backend_error(format!("missing {name} column")))
}

fn backend_error(e: impl std::fmt::Display) -> IndexError {
    IndexError::Backend {
        backend: BACKEND,
        message: e.to_string(),
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, IndexError> {
        Ok(self.open(name).await?.is_some())
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), IndexError> {
        match self
            .conn
            .create_empty_table(name, Self::schema(dimensions))
            .execute()
            .await
        {
            Ok(_) => {
                debug!("Created collection {name} ({dimensions} dims)");
                Ok(())
            }
            Err(lancedb::Error::TableAlreadyExists { .. }) => Ok(()),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn add(&self, name: &str, chunks: &[DocumentChunk]) -> Result<(), IndexError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let table = self
            .open(name)
            .await?
            .ok_or_else(|| backend_error(format!("collection {name} not found")))?;

        let dimensions = Self::table_dimensions(&table).await?;
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dimensions) {
            return Err(backend_error(format!(
                "chunk {} has {} dims, collection {name} expects {dimensions}",
                bad.id,
                bad.embedding.len()
            )));
        }

        // Replace chunks with the same id. Ids are `[A-Za-z0-9_-]` only.
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        table
            .delete(&format!("id IN ('{}')", ids.join("', '")))
            .await
            .map_err(backend_error)?;

        let batch = Self::to_batch(chunks, dimensions)?;
        let schema = batch.schema();
        table
            .add(Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema))
                as Box<dyn RecordBatchReader + Send>)
            .execute()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn count(&self, name: &str) -> Result<usize, IndexError> {
        match self.open(name).await? {
            Some(table) => table.count_rows(None).await.map_err(backend_error),
            None => Ok(0),
        }
    }

    async fn query(
        &self,
        name: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        let Some(table) = self.open(name).await? else {
            return Ok(vec![]);
        };

        let batches: Vec<RecordBatch> = table
            .query()
            .limit(k)
            .nearest_to(embedding)
            .map_err(backend_error)?
            .distance_type(DistanceType::Cosine)
            .execute()
            .await
            .map_err(backend_error)?
            .try_collect()
            .await
            .map_err(backend_error)?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(Self::from_batch(batch)?);
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, IndexError> {
        match self.conn.drop_table(name, &[]).await {
            Ok(()) => Ok(true),
            Err(lancedb::Error::TableNotFound { .. }) => Ok(false),
            Err(e) => Err(backend_error(e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
