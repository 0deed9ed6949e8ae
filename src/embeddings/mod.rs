// Embeddings module
// Text splitting plus the embedding backends that turn chunks and questions into vectors

pub mod chunking;
pub mod hashing;
pub mod ollama;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, EmbeddingProvider};
use crate::{QaError, Result};

pub use chunking::{ChunkingConfig, ContentChunk, chunk_documents, split_text};
pub use hashing::HashingEmbedder;
pub use ollama::OllamaClient;

/// Anything that can turn text into fixed-width vectors.
///
/// Implementations must be deterministic: the same text always produces the
/// same vector. A vector store is only meaningful when every insert and
/// every query goes through embedders reporting the same [`Embedder::model`].
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier recorded in the vector store manifest
    fn model(&self) -> &str;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    #[inline]
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| QaError::Embedding("Embedder returned no vector for query".to_string()))
    }
}

/// Build the embedder selected by `config.embedding.provider`
#[inline]
pub fn embedder_from_config(config: &Config) -> Result<Arc<dyn Embedder>> {
    match config.embedding.provider {
        EmbeddingProvider::Ollama => {
            let client = OllamaClient::new(&config.ollama)
                .map_err(|e| QaError::Config(format!("{:#}", e)))?;
            Ok(Arc::new(client))
        }
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(
            config.embedding.dimension as usize,
        ))),
    }
}
