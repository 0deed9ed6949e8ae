
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{Document, DocumentMetadata};

/// Separators tried in order, from paragraph breaks down to single characters
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Represents a chunk of document text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChunk {
    /// The content text
    pub content: String,
    /// Metadata of the document the chunk was cut from
    pub metadata: DocumentMetadata,
    /// The index of this chunk within its document
    pub chunk_index: usize,
}

/// Configuration for content chunking. Sizes are measured in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size
    pub chunk_size: usize,
    /// Upper bound on the text carried over from one chunk into the next
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Split every document into overlapping chunks, keeping document order
#[inline]
pub fn chunk_documents(documents: &[Document], config: &ChunkingConfig) -> Vec<ContentChunk> {
    let chunks: Vec<ContentChunk> = documents
        .iter()
        .flat_map(|document| {
            split_text(&document.content, config)
                .into_iter()
                .enumerate()
                .map(|(chunk_index, content)| ContentChunk {
                    content,
                    metadata: document.metadata.clone(),
                    chunk_index,
                })
        })
        .collect();

    debug!(
        "Chunked {} documents into {} chunks (avg {} chars)",
        documents.len(),
        chunks.len(),
        chunks
            .iter()
            .map(|c| char_len(&c.content))
            .sum::<usize>()
            / chunks.len().max(1)
    );

    chunks
}

/// Recursively split `text` into trimmed chunks of at most `chunk_size`
/// characters.
///
/// The first separator present in the text is used to cut it into pieces.
/// Pieces that still exceed `chunk_size` are split again with the next
/// separator; the rest are greedily merged back together, carrying up to
/// `chunk_overlap` characters of trailing pieces into the following chunk.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if config.chunk_size == 0 || text.trim().is_empty() {
        return Vec::new();
    }
    split_with_separators(text, &SEPARATORS, config)
}

fn split_with_separators(text: &str, separators: &[&str], config: &ChunkingConfig) -> Vec<String> {
    let position = separators
        .iter()
        .position(|separator| separator.is_empty() || text.contains(separator))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(position).copied().unwrap_or("");
    let remaining = separators.get(position + 1..).unwrap_or(&[]);

    let mut chunks = Vec::new();
    let mut fitting: Vec<String> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(&piece) <= config.chunk_size {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, config));
            fitting.clear();
        }

        if remaining.is_empty() {
            // Only reachable with a single oversized character piece
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        } else {
            chunks.extend(split_with_separators(&piece, remaining, config));
        }
    }

    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, config));
    }

    chunks
}

/// Split on `separator`, attaching each separator to the piece that follows it
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    for (i, piece) in text.split(separator).enumerate() {
        if i == 0 {
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }
        } else {
            pieces.push(format!("{}{}", separator, piece));
        }
    }
    pieces
}

/// Greedily join pieces into chunks no longer than `chunk_size`
fn merge_pieces(pieces: &[String], config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0;

    for piece in pieces {
        let len = char_len(piece);

        if total + len > config.chunk_size && !window.is_empty() {
            push_trimmed(&mut chunks, &window);

            // Drop pieces from the front until what is left fits as overlap
            // and leaves room for the incoming piece
            while total > config.chunk_overlap || (total > 0 && total + len > config.chunk_size) {
                match window.pop_front() {
                    Some((_, dropped)) => total -= dropped,
                    None => break,
                }
            }
        }

        window.push_back((piece.as_str(), len));
        total += len;
    }

    push_trimmed(&mut chunks, &window);
    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[inline]
fn char_len(text: &str) -> usize {
    text.chars().count()
}
