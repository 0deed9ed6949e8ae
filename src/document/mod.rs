// Document loading
// Turns PDFs and plain-text files into page-level documents with source metadata


use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{QaError, Result};

/// Extracted text of one PDF page or one whole text file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Where a piece of text came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Path of the loaded file
    pub source: String,
    /// 0-based page number, only set for paginated formats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    /// Detect the kind from the file extension, ignoring case
    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "md" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Load every supported document at `source`, which may be a single file or
/// a directory. Directories are scanned non-recursively in file-name order.
#[inline]
pub fn load_documents(source: &Path) -> Result<Vec<Document>> {
    if !source.exists() {
        warn!("Document source {} does not exist", source.display());
        return Err(QaError::NoDocuments {
            path: source.to_path_buf(),
        });
    }

    let documents = if source.is_dir() {
        load_directory(source)?
    } else {
        load_file(source)?
    };

    if documents.is_empty() {
        return Err(QaError::NoDocuments {
            path: source.to_path_buf(),
        });
    }

    info!(
        "Loaded {} documents from {}",
        documents.len(),
        source.display()
    );
    Ok(documents)
}

/// Run [`load_documents`] on the blocking pool. A panic inside the PDF parser
/// is reported as an input error rather than tearing down the caller.
#[inline]
pub async fn load_documents_blocking(source: PathBuf) -> Result<Vec<Document>> {
    let display = source.display().to_string();
    tokio::task::spawn_blocking(move || load_documents(&source))
        .await
        .map_err(|e| {
            if e.is_panic() {
                QaError::Input(format!("Failed to parse {}: parser panicked", display))
            } else {
                QaError::Other(anyhow::anyhow!("Document loading task failed: {}", e))
            }
        })?
}

fn load_directory(dir: &Path) -> Result<Vec<Document>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && DocumentKind::from_path(path).is_some())
        .collect();
    paths.sort();

    debug!(
        "Found {} supported files in {}",
        paths.len(),
        dir.display()
    );

    let mut documents = Vec::new();
    for path in paths {
        documents.extend(load_file(&path)?);
    }
    Ok(documents)
}

/// Load a single file. Blank pages are skipped.
#[inline]
pub fn load_file(path: &Path) -> Result<Vec<Document>> {
    let kind = DocumentKind::from_path(path).ok_or_else(|| {
        QaError::Input(format!(
            "Unsupported file type: {} (expected .pdf, .txt or .md)",
            path.display()
        ))
    })?;

    let source = path.display().to_string();

    match kind {
        DocumentKind::Pdf => {
            let pages = pdf_extract::extract_text_by_pages(path).map_err(|e| {
                QaError::Input(format!("Failed to extract text from {}: {}", source, e))
            })?;

            let documents: Vec<Document> = pages
                .into_iter()
                .enumerate()
                .filter(|(_, text)| !text.trim().is_empty())
                .map(|(page, text)| Document {
                    content: text,
                    metadata: DocumentMetadata {
                        source: source.clone(),
                        page: u32::try_from(page).ok(),
                    },
                })
                .collect();

            debug!("Extracted {} non-empty pages from {}", documents.len(), source);
            Ok(documents)
        }
        DocumentKind::Text => {
            let bytes = fs::read(path)
                .map_err(|e| QaError::Input(format!("Failed to read {}: {}", source, e)))?;
            let content = String::from_utf8_lossy(&bytes).into_owned();

            if content.trim().is_empty() {
                return Ok(Vec::new());
            }

            Ok(vec![Document {
                content,
                metadata: DocumentMetadata { source, page: None },
            }])
        }
    }
}
