// Answer generation
// The single seam between retrieval and whatever language model writes the answer

pub mod ollama;


use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::config::Config;

pub use ollama::OllamaGenerator;

/// A language model that completes a fully-built prompt
#[async_trait]
pub trait Generator: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Assemble the question-answering prompt from retrieved context
#[inline]
pub fn build_prompt(preamble: &str, context: &str, question: &str) -> String {
    format!(
        "{}\n\nContext:\n{}\n\nQuestion: {}\n\nAnswer:",
        preamble.trim(),
        context,
        question.trim()
    )
}

#[inline]
pub fn generator_from_config(config: &Config) -> Result<Arc<dyn Generator>> {
    Ok(Arc::new(OllamaGenerator::new(&config.ollama)?))
}
