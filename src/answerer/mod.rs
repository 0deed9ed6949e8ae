// Answerer module
// Retrieve the closest chunks for a question and have the generator answer from them


use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::Config;
use crate::database::{SearchResult, VectorStore};
use crate::embeddings::Embedder;
use crate::generation::{Generator, build_prompt};

/// Prefix marking an answer that could not be generated
pub const LLM_ERROR_PREFIX: &str = "[LLM error]";

/// Where a retrieved chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    /// One entry per retrieved chunk, in rank order
    pub sources: Vec<SourceRef>,
}

pub struct Answerer {
    config: Arc<Config>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
}

impl Answerer {
    #[inline]
    pub fn new(
        config: Arc<Config>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            config,
            embedder,
            generator,
        }
    }

    /// Answer `question` from the store at `persist_path`.
    ///
    /// `top_k` is capped at `retrieval.max_top_k`; `None` or zero uses the
    /// configured default. If embedding the question or searching fails the
    /// error is logged and the question is answered with an empty context.
    /// A failed generation still returns the retrieved sources, with the
    /// answer tagged by [`LLM_ERROR_PREFIX`].
    ///
    /// # Errors
    /// `NotIndexed` when no store exists at `persist_path`, and
    /// `EmbeddingMismatch` when it was built with another embedding model.
    #[inline]
    pub async fn answer(
        &self,
        question: &str,
        persist_path: &Path,
        top_k: Option<usize>,
    ) -> Result<AnswerResult> {
        let store = VectorStore::open(persist_path).await?;
        store.manifest().ensure_matches(self.embedder.model(), None)?;

        let top_k = self.config.retrieval.clamp_top_k(top_k);
        let retrieved = self.retrieve(&store, question, top_k).await;

        let context = retrieved
            .iter()
            .map(|r| r.chunk_metadata.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let sources: Vec<SourceRef> = retrieved
            .into_iter()
            .map(|r| SourceRef {
                source: r.chunk_metadata.source,
                page: r.chunk_metadata.page,
            })
            .collect();

        let prompt = build_prompt(&self.config.retrieval.prompt_preamble, &context, question);
        debug!(
            "Prompt of {} chars with {} context chunks",
            prompt.chars().count(),
            sources.len()
        );

        let answer = match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Generation with {} failed: {}", self.generator.model(), e);
                format!("{} {}", LLM_ERROR_PREFIX, e)
            }
        };

        info!("Answered question using {} sources", sources.len());
        Ok(AnswerResult { answer, sources })
    }

    /// Nearest chunks for `question`, or none when retrieval fails
    async fn retrieve(&self, store: &VectorStore, question: &str, top_k: usize) -> Vec<SearchResult> {
        let query_vector = match self.embedder.embed_query(question).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Question embedding failed, answering without context: {}", e);
                return Vec::new();
            }
        };

        match store.search(&query_vector, top_k).await {
            Ok(results) => {
                for result in &results {
                    debug!(
                        "Retrieved chunk {} of {} (similarity {:.3})",
                        result.chunk_metadata.chunk_index,
                        result.chunk_metadata.source,
                        result.similarity_score
                    );
                }
                results
            }
            Err(e) => {
                warn!("Similarity search failed, answering without context: {}", e);
                Vec::new()
            }
        }
    }
}
