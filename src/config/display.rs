use console::style;

use super::{Config, EmbeddingProvider};

/// Print the effective configuration to stderr
#[inline]
pub fn show_config(config: &Config) {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Storage:").bold().yellow());
    eprintln!(
        "  Persist Dir: {}",
        style(config.persist_dir.display()).cyan()
    );
    eprintln!("  Upload Dir: {}", style(config.upload_dir.display()).cyan());

    eprintln!();
    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.ollama.base_url).cyan());
    eprintln!(
        "  Generation Model: {}",
        style(&config.ollama.generation_model).cyan()
    );
    eprintln!(
        "  Generation Timeout: {}s",
        style(config.ollama.generation_timeout_secs).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Embeddings:").bold().yellow());
    match config.embedding.provider {
        EmbeddingProvider::Ollama => {
            eprintln!("  Provider: {}", style("ollama").cyan());
            eprintln!("  Model: {}", style(&config.ollama.embedding_model).cyan());
            eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
        }
        EmbeddingProvider::Hashing => {
            eprintln!("  Provider: {}", style("hashing").cyan());
            eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
        }
    }

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!(
        "  Chunk Size / Overlap: {} / {}",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );
    eprintln!(
        "  Default top_k: {} (max {})",
        style(config.retrieval.default_top_k).cyan(),
        style(config.retrieval.max_top_k).cyan()
    );

    eprintln!();
    eprintln!(
        "Server: {}",
        style(config.server.bind_address()).dim()
    );
}
