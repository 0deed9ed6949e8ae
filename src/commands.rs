use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::answerer::Answerer;
use crate::config::{Config, EmbeddingProvider};
use crate::database::VectorStore;
use crate::embeddings::{OllamaClient, embedder_from_config};
use crate::generation::generator_from_config;
use crate::indexer::Indexer;

/// Index a file or directory into the configured vector store
#[inline]
pub async fn index_path(config: Config, source: &Path) -> Result<()> {
    let embedder = embedder_from_config(&config)?;
    let persist_dir = config.persist_dir.clone();
    let indexer = Indexer::new(Arc::new(config), embedder);

    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(format!("Indexing {}", source.display()));
    bar.enable_steady_tick(Duration::from_millis(120));

    let result = indexer.build_index(source, &persist_dir).await;
    bar.finish_and_clear();

    let stats = result.with_context(|| format!("Failed to index {}", source.display()))?;

    println!(
        "{} Indexed {} documents as {} chunks into {}",
        style("✓").green(),
        stats.documents,
        stats.chunks,
        persist_dir.display()
    );
    Ok(())
}

/// Answer a question from the configured store and print the sources
#[inline]
pub async fn ask_question(config: Config, question: &str, top_k: Option<usize>) -> Result<()> {
    let embedder = embedder_from_config(&config)?;
    let generator = generator_from_config(&config)?;
    let persist_dir = config.persist_dir.clone();
    let answerer = Answerer::new(Arc::new(config), embedder, generator);

    let result = answerer
        .answer(question, &persist_dir, top_k)
        .await
        .context("Failed to answer question")?;

    println!("{}", result.answer.trim());

    if !result.sources.is_empty() {
        println!();
        println!("{}", style("Sources:").bold());
        for (rank, source) in result.sources.iter().enumerate() {
            match source.page {
                Some(page) => println!("  {}. {} (page {})", rank + 1, source.source, page),
                None => println!("  {}. {}", rank + 1, source.source),
            }
        }
    }
    Ok(())
}

/// Report on the vector store and the Ollama server
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("📊 pdf-qa Status Report").bold());
    println!("{}", "=".repeat(50));
    println!();

    println!("🔍 Vector Store ({}):", config.persist_dir.display());
    match VectorStore::open(&config.persist_dir).await {
        Ok(store) => {
            let healthy = store.validate_integrity().await;
            let count = store.count().await.unwrap_or(0);
            println!(
                "   {} {} chunks, model {} ({} dims)",
                if healthy { "✅" } else { "⚠️ " },
                count,
                store.model(),
                store.dimension()
            );
        }
        Err(e) => println!("   ❌ {}", e),
    }

    println!();
    println!("🤖 Ollama ({}):", config.ollama.base_url);
    let client = OllamaClient::new(&config.ollama)?;
    let check_embedding = config.embedding.provider == EmbeddingProvider::Ollama;
    let generation_model = config.ollama.generation_model.clone();
    let (embedding, generation) = tokio::task::spawn_blocking(move || {
        let embedding = check_embedding.then(|| client.health_check());
        let generation = client.http().require_model(&generation_model);
        (embedding, generation)
    })
    .await
    .context("Status task failed")?;

    if let Some(result) = embedding {
        print_model_check("Embedding", &config.ollama.embedding_model, &result);
    }
    print_model_check("Generation", &config.ollama.generation_model, &generation);

    info!("Status report complete");
    Ok(())
}

fn print_model_check(label: &str, model: &str, result: &Result<()>) {
    match result {
        Ok(()) => println!("   ✅ {} model: {}", label, model),
        Err(e) => println!("   ❌ {} model: {} ({:#})", label, model, e),
    }
}
