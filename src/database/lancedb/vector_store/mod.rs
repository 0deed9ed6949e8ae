
use super::{ChunkMetadata, ChunkRecord, StoreManifest};
use crate::{QaError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TABLE_NAME: &str = "chunks";

/// Chunk store backed by a LanceDB directory.
///
/// Every store is pinned to one embedding model and vector width through its
/// [`StoreManifest`]. Searches are exact cosine scans.
pub struct VectorStore {
    path: PathBuf,
    connection: Connection,
    table: Table,
    manifest: StoreManifest,
}

/// A stored chunk returned by [`VectorStore::search`]
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    /// `1 - distance`; 1.0 for an identical direction
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open an existing store for reading
    ///
    /// # Errors
    /// `NotIndexed` if the directory, its manifest or the chunks table is missing.
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        let not_indexed = || QaError::NotIndexed {
            path: path.to_path_buf(),
        };

        if !path.is_dir() {
            return Err(not_indexed());
        }
        let Some(manifest) = StoreManifest::read(path)? else {
            debug!("No manifest in {}", path.display());
            return Err(not_indexed());
        };

        let connection = Self::connect(path).await?;
        if !Self::table_exists(&connection).await? {
            debug!("No chunks table in {}", path.display());
            return Err(not_indexed());
        }

        let table = Self::open_table(&connection).await?;
        let store = Self {
            path: path.to_path_buf(),
            connection,
            table,
            manifest,
        };
        store.verify_table_dimension().await?;

        debug!(
            "Opened vector store at {} ({}, {} dims)",
            path.display(),
            store.manifest.embedding_model,
            store.manifest.dimension
        );
        Ok(store)
    }

    /// Open the store at `path`, creating it for `model` when absent
    ///
    /// # Errors
    /// `EmbeddingMismatch` if the existing store was built with another model
    /// or vector width.
    #[inline]
    pub async fn open_or_create(path: &Path, model: &str, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(QaError::Embedding(
                "Cannot create a store for zero-dimensional vectors".to_string(),
            ));
        }

        std::fs::create_dir_all(path).map_err(|e| {
            QaError::Database(format!(
                "Failed to create vector store directory {}: {}",
                path.display(),
                e
            ))
        })?;

        let existing = StoreManifest::read(path)?;
        if let Some(manifest) = &existing {
            manifest.ensure_matches(model, Some(dimension))?;
        }

        let connection = Self::connect(path).await?;

        let table = if Self::table_exists(&connection).await? {
            Self::open_table(&connection).await?
        } else {
            info!(
                "Creating chunks table at {} with {} dimensions",
                path.display(),
                dimension
            );
            connection
                .create_empty_table(TABLE_NAME, Self::create_schema(dimension)?)
                .execute()
                .await
                .map_err(|e| QaError::Database(format!("Failed to create table: {}", e)))?
        };

        let manifest = match existing {
            Some(manifest) => manifest,
            None => {
                let manifest = StoreManifest::new(model, dimension);
                manifest.write(path)?;
                manifest
            }
        };

        let store = Self {
            path: path.to_path_buf(),
            connection,
            table,
            manifest,
        };
        store.verify_table_dimension().await?;
        Ok(store)
    }

    async fn connect(path: &Path) -> Result<Connection> {
        let absolute = path.canonicalize()?;
        lancedb::connect(&absolute.to_string_lossy())
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to connect to LanceDB: {}", e)))
    }

    async fn table_exists(connection: &Connection) -> Result<bool> {
        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.iter().any(|name| name == TABLE_NAME))
    }

    async fn open_table(connection: &Connection) -> Result<Table> {
        connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to open table: {}", e)))
    }

    /// The vector column width must agree with the manifest
    async fn verify_table_dimension(&self) -> Result<()> {
        let schema = self
            .table
            .schema()
            .await
            .map_err(|e| QaError::Database(format!("Failed to get table schema: {}", e)))?;

        let width = schema
            .field_with_name("vector")
            .ok()
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| QaError::Database("Missing or invalid vector column".to_string()))?;

        if width != self.manifest.dimension {
            warn!(
                "Manifest at {} says {} dimensions but table holds {}",
                self.path.display(),
                self.manifest.dimension,
                width
            );
            return Err(QaError::EmbeddingMismatch(format!(
                "table holds {}-dimensional vectors but manifest records {}",
                width, self.manifest.dimension
            )));
        }
        Ok(())
    }

    fn create_schema(dimension: usize) -> Result<Arc<Schema>> {
        let width = i32::try_from(dimension)
            .map_err(|_| QaError::Database(format!("Vector dimension {} too large", dimension)))?;

        Ok(Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    width,
                ),
                false,
            ),
            Field::new("source", DataType::Utf8, false),
            Field::new("page", DataType::UInt32, true),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ])))
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.manifest.embedding_model
    }

    #[inline]
    pub const fn dimension(&self) -> usize {
        self.manifest.dimension
    }

    #[inline]
    pub const fn manifest(&self) -> &StoreManifest {
        &self.manifest
    }

    /// Append all records as a single table version.
    ///
    /// Either every record is committed or none is.
    #[inline]
    pub async fn add(&self, records: &[ChunkRecord]) -> Result<usize> {
        if records.is_empty() {
            debug!("No chunks to store");
            return Ok(0);
        }

        if let Some(bad) = records
            .iter()
            .find(|record| record.vector.len() != self.manifest.dimension)
        {
            return Err(QaError::EmbeddingMismatch(format!(
                "store holds {}-dimensional vectors but got {}",
                self.manifest.dimension,
                bad.vector.len()
            )));
        }

        debug!("Storing batch of {} chunks", records.len());

        let record_batch = self.create_record_batch(records)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        self.table
            .add(reader)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to insert chunks: {}", e)))?;

        info!(
            "Stored {} chunks in {}",
            records.len(),
            self.path.display()
        );
        Ok(records.len())
    }

    fn create_record_batch(&self, records: &[ChunkRecord]) -> Result<RecordBatch> {
        let len = records.len();
        let dimension = self.manifest.dimension;
        let schema = Self::create_schema(dimension)?;

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * dimension);
        let mut sources = Vec::with_capacity(len);
        let mut pages = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            sources.push(record.metadata.source.as_str());
            pages.push(record.metadata.page);
            chunk_indices.push(record.metadata.chunk_index);
            contents.push(record.metadata.content.as_str());
            created_ats.push(record.metadata.created_at.as_str());
        }

        let width = i32::try_from(dimension)
            .map_err(|_| QaError::Database(format!("Vector dimension {} too large", dimension)))?;
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            width,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| QaError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(pages)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| QaError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Exact cosine search for the `limit` chunks nearest to `query_vector`,
    /// ordered by ascending distance
    #[inline]
    pub async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if query_vector.len() != self.manifest.dimension {
            return Err(QaError::EmbeddingMismatch(format!(
                "store holds {}-dimensional vectors but the query has {}",
                self.manifest.dimension,
                query_vector.len()
            )));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        debug!("Searching for {} nearest chunks", limit);

        let results = self
            .table
            .vector_search(query_vector)
            .map_err(|e| QaError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .bypass_vector_index()
            .limit(limit)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Self::parse_search_results_stream(results).await?;
        // Batches from a flat scan are each sorted but not merged
        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        search_results.truncate(limit);
        Ok(search_results)
    }

    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>> {
        let mut search_results = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| QaError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
        let sources = string_column(batch, "source")?;
        let contents = string_column(batch, "content")?;
        let created_ats = string_column(batch, "created_at")?;
        let pages = u32_column(batch, "page")?;
        let chunk_indices = u32_column(batch, "chunk_index")?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut search_results = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let chunk_metadata = ChunkMetadata {
                source: sources.value(row).to_string(),
                page: if pages.is_null(row) {
                    None
                } else {
                    Some(pages.value(row))
                },
                chunk_index: chunk_indices.value(row),
                content: contents.value(row).to_string(),
                created_at: created_ats.value(row).to_string(),
            };

            let distance =
                distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            search_results.push(SearchResult {
                chunk_metadata,
                similarity_score: 1.0 - distance,
                distance,
            });
        }
        Ok(search_results)
    }

    /// Total number of stored chunks
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| QaError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Whether the chunks table can still be listed and counted
    #[inline]
    pub async fn validate_integrity(&self) -> bool {
        match Self::table_exists(&self.connection).await {
            Ok(true) => self.count().await.is_ok(),
            Ok(false) => {
                warn!("Chunks table missing from {}", self.path.display());
                false
            }
            Err(e) => {
                warn!("Integrity check failed for {}: {}", self.path.display(), e);
                false
            }
        }
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| QaError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| QaError::Database(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| QaError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| QaError::Database(format!("Invalid {} column type", name)))
}
