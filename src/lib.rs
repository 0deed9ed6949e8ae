use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QaError>;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("No vector store found at {}", path.display())]
    NotIndexed { path: PathBuf },

    #[error("No documents found at {}", path.display())]
    NoDocuments { path: PathBuf },

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Embedding model mismatch: {0}")]
    EmbeddingMismatch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl QaError {
    /// Whether the error was caused by what the caller sent rather than by
    /// a failing dependency.
    #[inline]
    pub const fn is_input_error(&self) -> bool {
        matches!(self, Self::Input(_) | Self::NoDocuments { .. })
    }
}

pub mod answerer;
pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod generation;
pub mod indexer;
pub mod ollama;
pub mod server;
