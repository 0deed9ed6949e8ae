
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::QaError;
use crate::config::OllamaConfig;
use crate::embeddings::Embedder;
use crate::ollama::{OllamaHttp, RetryPolicy};

const EMBED_ENDPOINT: &str = "api/embed";

/// Embeds text with a model served by Ollama, `batch_size` inputs per request
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: OllamaHttp,
    model: String,
    batch_size: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        config.validate().context("Invalid Ollama configuration")?;

        Ok(Self {
            http: OllamaHttp::new(
                config.base_url.clone(),
                Duration::from_secs(config.request_timeout_secs),
                RetryPolicy::new(config.retry_attempts),
            ),
            model: config.embedding_model.clone(),
            batch_size: config.batch_size as usize,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    #[inline]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.http = self.http.with_retry(retry);
        self
    }

    #[inline]
    pub fn http(&self) -> &OllamaHttp {
        &self.http
    }

    /// Check that the server answers and the embedding model is pulled
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        self.http
            .require_model(&self.model)
            .with_context(|| format!("Ollama at {} is not ready", self.http.base_url()))?;
        info!("Embedding model {} is available", self.model);
        Ok(())
    }

    /// Embed `texts` in order, one request per batch
    #[inline]
    pub fn embed_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (number, batch) in texts.chunks(self.batch_size.max(1)).enumerate() {
            let response: EmbedResponse = self
                .http
                .post_json(
                    EMBED_ENDPOINT,
                    &EmbedRequest {
                        model: &self.model,
                        input: batch,
                    },
                )
                .with_context(|| {
                    format!("Embedding batch {} ({} texts) failed", number + 1, batch.len())
                })?;

            ensure!(
                response.embeddings.len() == batch.len(),
                "Mismatch between request and response counts: {} vs {}",
                batch.len(),
                response.embeddings.len()
            );
            vectors.extend(response.embeddings);
        }

        debug!("Embedded {} texts with {}", vectors.len(), self.model);
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    #[inline]
    fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    async fn embed_documents(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.clone();
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || client.embed_blocking(&texts))
            .await
            .map_err(|e| QaError::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| QaError::Embedding(format!("{:#}", e)))
    }
}
