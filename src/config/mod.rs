// Configuration management module
// TOML settings with environment overrides, passed explicitly into the pipeline

pub mod display;
pub mod settings;

pub use display::show_config;
pub use settings::{
    Config, ConfigError, EmbeddingConfig, EmbeddingProvider, OllamaConfig, RetrievalConfig,
    ServerConfig,
};
