#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "PDF_QA_CONFIG";
pub const PERSIST_DIR_ENV: &str = "PERSIST_DIR";
pub const UPLOAD_DIR_ENV: &str = "UPLOAD_DIR";
pub const OLLAMA_BASE_URL_ENV: &str = "OLLAMA_BASE_URL";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const DEFAULT_PROMPT_PREAMBLE: &str = "You are a professional knowledge assistant. Answer the question clearly and comprehensively based on the provided context.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the vector store
    pub persist_dir: PathBuf,
    /// Directory uploaded documents are staged in before indexing
    pub upload_dir: PathBuf,
    pub server: ServerConfig,
    pub ollama: OllamaConfig,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            persist_dir: PathBuf::from("vector_store"),
            upload_dir: PathBuf::from("uploads"),
            server: ServerConfig::default(),
            ollama: OllamaConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: Url,
    pub embedding_model: String,
    pub generation_model: String,
    pub batch_size: u32,
    pub request_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    pub retry_attempts: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_OLLAMA_URL).expect("default Ollama URL is valid"),
            embedding_model: "all-minilm".to_string(),
            generation_model: "gemma2:2b".to_string(),
            batch_size: 16,
            request_timeout_secs: 30,
            generation_timeout_secs: 120,
            retry_attempts: 3,
        }
    }
}

/// Which embedding backend turns text into vectors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Ollama,
    /// Offline feature-hashing embedder; lexical rather than semantic
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    /// Vector width of the hashing embedder. Ollama models decide their own.
    pub dimension: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            dimension: 384,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub prompt_preamble: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 3,
            max_top_k: 20,
            prompt_preamble: DEFAULT_PROMPT_PREAMBLE.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid timeout: {0} (must be between 1 and 3600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be between 1 and 100000)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    InvalidChunkOverlap(usize, usize),
    #[error("Invalid top_k: default {0}, max {1} (need 1 <= default <= max)")]
    InvalidTopK(usize, usize),
    #[error("Invalid upload limit: {0} bytes (must be at least 1)")]
    InvalidUploadLimit(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for crate::QaError {
    #[inline]
    fn from(error: ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist
    #[inline]
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        if !config_path.exists() {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Resolve, load, apply environment overrides and validate.
    ///
    /// The file is taken from `explicit_path`, then `$PDF_QA_CONFIG`, then
    /// `config.toml` in the working directory.
    #[inline]
    pub fn from_sources(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(explicit_path, |key| env::var(key).ok());
        let mut config = Self::load(&path)?;
        config
            .apply_env_overrides()
            .context("Invalid environment override")?;
        config
            .validate()
            .context("Configuration validation failed")?;
        Ok(config)
    }

    #[inline]
    pub fn resolve_path<F>(explicit_path: Option<&Path>, lookup: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        explicit_path.map_or_else(
            || {
                lookup(CONFIG_PATH_ENV)
                    .filter(|value| !value.trim().is_empty())
                    .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
            },
            Path::to_path_buf,
        )
    }

    #[inline]
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    /// Apply `PERSIST_DIR`, `UPLOAD_DIR` and `OLLAMA_BASE_URL` from `lookup`.
    /// Blank values are ignored.
    #[inline]
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value_of = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(persist_dir) = value_of(PERSIST_DIR_ENV) {
            debug!("Persist directory overridden to {}", persist_dir);
            self.persist_dir = PathBuf::from(persist_dir);
        }

        if let Some(upload_dir) = value_of(UPLOAD_DIR_ENV) {
            self.upload_dir = PathBuf::from(upload_dir);
        }

        if let Some(base_url) = value_of(OLLAMA_BASE_URL_ENV) {
            debug!("Ollama base URL overridden to {}", base_url);
            self.ollama.set_base_url(base_url.trim())?;
        }

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.ollama.validate()?;
        self.embedding.validate()?;
        self.retrieval.validate()?;
        self.validate_chunking_config()?;
        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if !(1..=100_000).contains(&config.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::InvalidChunkOverlap(
                config.chunk_overlap,
                config.chunk_size,
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidUploadLimit(self.max_upload_bytes));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheme = self.base_url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::InvalidProtocol(scheme.to_string()));
        }

        if self.base_url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(self.base_url.to_string()));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        for timeout in [self.request_timeout_secs, self.generation_timeout_secs] {
            if !(1..=3600).contains(&timeout) {
                return Err(ConfigError::InvalidTimeout(timeout));
            }
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    pub fn set_base_url(&mut self, base_url: &str) -> Result<(), ConfigError> {
        let url = Url::parse(base_url).map_err(|_| ConfigError::InvalidUrl(base_url.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(base_url.to_string()));
        }
        self.base_url = url;
        Ok(())
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }
        Ok(())
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_top_k == 0 || self.default_top_k > self.max_top_k {
            return Err(ConfigError::InvalidTopK(
                self.default_top_k,
                self.max_top_k,
            ));
        }
        Ok(())
    }

    /// Resolve a requested `top_k`. Missing or zero means `default_top_k`;
    /// anything else is capped at `max_top_k`.
    pub fn clamp_top_k(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|&k| k > 0)
            .unwrap_or(self.default_top_k)
            .clamp(1, self.max_top_k)
    }
}
