
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::OllamaConfig;
use crate::generation::Generator;
use crate::ollama::{OllamaHttp, RetryPolicy};
use crate::{QaError, Result};

const GENERATE_ENDPOINT: &str = "api/generate";

/// Completes prompts with Ollama's `/api/generate` endpoint.
///
/// Generation is never retried: a slow model that timed out once will
/// usually time out again.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    http: OllamaHttp,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            http: OllamaHttp::new(
                config.base_url.clone(),
                Duration::from_secs(config.generation_timeout_secs),
                RetryPolicy::ONCE,
            ),
            model: config.generation_model.clone(),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    fn generate_blocking(&self, prompt: &str) -> Result<String> {
        debug!(
            "Requesting completion from {} ({} prompt chars)",
            self.model,
            prompt.chars().count()
        );

        let reply: GenerateResponse = self
            .http
            .post_json(
                GENERATE_ENDPOINT,
                &GenerateRequest {
                    model: &self.model,
                    prompt,
                    stream: false,
                },
            )
            .map_err(|e| QaError::Generation(format!("{:#}", e)))?;

        info!(
            "Generated {} chars with {}",
            reply.response.chars().count(),
            self.model
        );
        Ok(reply.response)
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    #[inline]
    fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let generator = self.clone();
        let prompt = prompt.to_string();

        tokio::task::spawn_blocking(move || generator.generate_blocking(&prompt))
            .await
            .map_err(|e| QaError::Generation(format!("Generation task failed: {}", e)))?
    }
}
