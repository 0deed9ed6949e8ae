// Indexer module
// Load, chunk, embed and persist documents into a vector store

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::database::{ChunkRecord, VectorStore};
use crate::document::load_documents_blocking;
use crate::embeddings::{Embedder, chunk_documents};
use crate::{QaError, Result};

/// Statistics about a finished indexing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexingStats {
    pub documents: usize,
    pub chunks: usize,
}

/// Turns documents on disk into searchable chunks
pub struct Indexer {
    config: Arc<Config>,
    embedder: Arc<dyn Embedder>,
}

impl Indexer {
    #[inline]
    pub fn new(config: Arc<Config>, embedder: Arc<dyn Embedder>) -> Self {
        Self { config, embedder }
    }

    /// Index `source` (a file or a directory) into the store at `persist_path`.
    ///
    /// All chunks are embedded before anything is written, and the write is
    /// a single append, so a failure leaves the store as it was. Indexing the
    /// same source twice stores its chunks twice.
    ///
    /// # Errors
    /// `NoDocuments` when `source` is missing or holds nothing to index.
    #[inline]
    pub async fn build_index(&self, source: &Path, persist_path: &Path) -> Result<IndexingStats> {
        info!(
            "Indexing {} into {}",
            source.display(),
            persist_path.display()
        );

        let documents = load_documents_blocking(source.to_path_buf()).await?;
        let chunks = chunk_documents(&documents, &self.config.chunking);
        if chunks.is_empty() {
            return Err(QaError::NoDocuments {
                path: source.to_path_buf(),
            });
        }
        debug!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(QaError::Embedding(format!(
                "Expected {} embeddings but got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        let records: Vec<ChunkRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| ChunkRecord::from_chunk(chunk, vector))
            .collect();

        let store =
            VectorStore::open_or_create(persist_path, self.embedder.model(), dimension).await?;
        let stored = store.add(&records).await?;

        let stats = IndexingStats {
            documents: documents.len(),
            chunks: stored,
        };
        info!(
            "Indexed {} documents as {} chunks into {}",
            stats.documents,
            stats.chunks,
            persist_path.display()
        );
        Ok(stats)
    }
}
