// Ollama HTTP transport
// Blocking JSON calls with retry, shared by the embedder and the generator


use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::Url;

const TAGS_ENDPOINT: &str = "api/tags";

/// How often a request is attempted and how long to wait in between.
///
/// The wait doubles after each failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    /// A single attempt
    pub const ONCE: Self = Self {
        attempts: 1,
        initial_delay: Duration::ZERO,
    };

    #[inline]
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_delay: Duration::from_secs(1),
        }
    }

    #[inline]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(1_u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX))
    }
}

enum Failure {
    Transient(String),
    Permanent(String),
}

fn classify(error: &ureq::Error) -> Failure {
    match error {
        ureq::Error::StatusCode(status) if *status >= 500 => {
            Failure::Transient(format!("server returned HTTP {}", status))
        }
        ureq::Error::StatusCode(status) => {
            Failure::Permanent(format!("Client error: HTTP {}", status))
        }
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => Failure::Transient(error.to_string()),
        other => Failure::Permanent(format!("Request failed: {}", other)),
    }
}

/// Model entry reported by `GET /api/tags`
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub modified_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

/// Connection to one Ollama server
#[derive(Debug, Clone)]
pub struct OllamaHttp {
    base_url: Url,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

impl OllamaHttp {
    /// `base_url` may carry a path prefix such as `http://gateway/ollama`;
    /// endpoints are resolved beneath it.
    #[inline]
    pub fn new(base_url: Url, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            base_url: as_directory(base_url),
            agent: agent_with_timeout(timeout),
            retry,
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = agent_with_timeout(timeout);
        self
    }

    #[inline]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = self.endpoint(endpoint)?;
        let body = self.call(&url, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;
        parse_body(endpoint, &body)
    }

    #[inline]
    pub fn post_json<B, T>(&self, endpoint: &str, payload: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = self.endpoint(endpoint)?;
        let request = serde_json::to_string(payload)
            .with_context(|| format!("Failed to serialize request for {}", endpoint))?;
        let body = self.call(&url, || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;
        parse_body(endpoint, &body)
    }

    /// Models pulled on the server
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let tags: TagsResponse = self
            .get_json(TAGS_ENDPOINT)
            .context("Failed to fetch models")?;
        debug!("Ollama reports {} models", tags.models.len());
        Ok(tags.models)
    }

    /// Fail unless `model` has been pulled, accepting an implicit `:latest` tag
    #[inline]
    pub fn require_model(&self, model: &str) -> Result<()> {
        let models = self.list_models()?;
        if has_model(&models, model) {
            return Ok(());
        }

        let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        warn!("Model {} not found on {}", model, self.base_url);
        Err(anyhow!(
            "Model '{}' is not available. Available models: {:?}",
            model,
            available
        ))
    }

    fn endpoint(&self, endpoint: &str) -> Result<Url> {
        self.base_url
            .join(endpoint.trim_start_matches('/'))
            .with_context(|| format!("Invalid endpoint {} for {}", endpoint, self.base_url))
    }

    fn call<F>(&self, url: &Url, mut send: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let attempts = self.retry.attempts.max(1);
        let mut last_failure = String::new();

        for attempt in 1..=attempts {
            let error = match send() {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            match classify(&error) {
                Failure::Permanent(message) => {
                    warn!("{} from {}, not retrying", message, url);
                    return Err(anyhow!(message));
                }
                Failure::Transient(message) => {
                    warn!("{} from {} (attempt {}/{})", message, url, attempt, attempts);
                    last_failure = message;
                }
            }

            if attempt < attempts {
                let delay = self.retry.delay_after(attempt);
                debug!("Waiting {:?} before retry", delay);
                thread::sleep(delay);
            }
        }

        error!("Giving up on {} after {} attempts", url, attempts);
        Err(anyhow!(
            "Request to {} failed after {} attempts: {}",
            url,
            attempts,
            last_failure
        ))
    }
}

/// Whether `model` appears in `models`, treating `name` and `name:latest` alike
fn has_model(models: &[ModelInfo], model: &str) -> bool {
    let tagged = format!("{}:latest", model);
    models.iter().any(|m| m.name == model || m.name == tagged)
}

/// Append a trailing `/` so relative joins keep the last path segment
fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn agent_with_timeout(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn parse_body<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).with_context(|| format!("Failed to parse response from {}", endpoint))
}
