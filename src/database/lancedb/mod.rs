// LanceDB vector database module
// Chunk records, their metadata, and the manifest pinning a store to one embedding model


pub mod vector_store;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embeddings::ContentChunk;
use crate::{QaError, Result};

pub const MANIFEST_FILE: &str = "store.toml";
pub const DISTANCE_COSINE: &str = "cosine";

/// Embedded chunk ready to be written to the `chunks` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique identifier for this row
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Everything stored next to a vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the file the chunk was cut from
    pub source: String,
    /// 0-based page for paginated documents
    pub page: Option<u32>,
    /// Position of the chunk within its page or file
    pub chunk_index: u32,
    /// The chunk text passed to the model as context
    pub content: String,
    /// RFC 3339 timestamp of insertion
    pub created_at: String,
}

impl ChunkRecord {
    /// Pair a chunk with its embedding under a fresh id
    #[inline]
    pub fn from_chunk(chunk: &ContentChunk, vector: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            metadata: ChunkMetadata {
                source: chunk.metadata.source.clone(),
                page: chunk.metadata.page,
                chunk_index: u32::try_from(chunk.chunk_index).unwrap_or(u32::MAX),
                content: chunk.content.clone(),
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        }
    }
}

/// `store.toml`: which embedding model produced the vectors in a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreManifest {
    pub embedding_model: String,
    pub dimension: usize,
    pub distance: String,
}

impl StoreManifest {
    #[inline]
    pub fn new(embedding_model: &str, dimension: usize) -> Self {
        Self {
            embedding_model: embedding_model.to_string(),
            dimension,
            distance: DISTANCE_COSINE.to_string(),
        }
    }

    /// Read the manifest in `dir`, `None` when the file does not exist
    #[inline]
    pub fn read(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let manifest: Self = toml::from_str(&content).map_err(|e| {
            QaError::Database(format!("Corrupt manifest {}: {}", path.display(), e))
        })?;
        debug!("Read store manifest from {}", path.display());
        Ok(Some(manifest))
    }

    #[inline]
    pub fn write(&self, dir: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| QaError::Database(format!("Failed to serialize manifest: {}", e)))?;
        fs::write(dir.join(MANIFEST_FILE), content)?;
        Ok(())
    }

    /// Fail with `EmbeddingMismatch` unless `model` and `dimension` match this store
    #[inline]
    pub fn ensure_matches(&self, model: &str, dimension: Option<usize>) -> Result<()> {
        if self.embedding_model != model {
            return Err(QaError::EmbeddingMismatch(format!(
                "store was built with '{}' but '{}' is configured",
                self.embedding_model, model
            )));
        }
        match dimension {
            Some(dimension) if dimension != self.dimension => {
                return Err(QaError::EmbeddingMismatch(format!(
                    "store holds {}-dimensional vectors but got {}",
                    self.dimension, dimension
                )));
            }
            _ => {}
        }
        if self.distance != DISTANCE_COSINE {
            return Err(QaError::Database(format!(
                "Unsupported distance metric '{}'",
                self.distance
            )));
        }
        Ok(())
    }
}
