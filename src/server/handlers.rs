use std::path::Path;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::answerer::AnswerResult;
use crate::document::DocumentKind;
use crate::server::AppState;
use crate::server::errors::{AskError, UploadError};

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[inline]
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Store the multipart `file` field in the upload directory and index it
#[inline]
pub async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, UploadError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .and_then(sanitize_file_name)
            .ok_or_else(|| UploadError::BadRequest("No file selected".to_string()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| UploadError::BadRequest(format!("Failed to read upload: {}", e)))?;

        upload = Some((file_name, data));
        break;
    }

    let (file_name, data) =
        upload.ok_or_else(|| UploadError::BadRequest("No file provided".to_string()))?;

    if data.is_empty() {
        return Err(UploadError::BadRequest(format!(
            "Uploaded file '{}' is empty",
            file_name
        )));
    }
    if DocumentKind::from_path(Path::new(&file_name)).is_none() {
        return Err(UploadError::BadRequest(format!(
            "Unsupported file type: '{}' (expected .pdf, .txt or .md)",
            file_name
        )));
    }

    debug!("Received upload '{}' ({} bytes)", file_name, data.len());

    // One writer at a time, held until the store append has finished
    let _guard = state.index_lock.lock().await;

    let upload_dir = &state.config.upload_dir;
    tokio::fs::create_dir_all(upload_dir).await.map_err(|e| {
        UploadError::Internal(format!(
            "Failed to create upload directory {}: {}",
            upload_dir.display(),
            e
        ))
    })?;

    let file_path = upload_dir.join(&file_name);
    tokio::fs::write(&file_path, &data)
        .await
        .map_err(|e| UploadError::Internal(format!("Failed to save upload: {}", e)))?;

    let stats = match state
        .indexer
        .build_index(&file_path, &state.config.persist_dir)
        .await
    {
        Ok(stats) => stats,
        Err(e) => {
            // Rejected input is not kept around
            if e.is_input_error() {
                if let Err(remove_error) = tokio::fs::remove_file(&file_path).await {
                    warn!(
                        "Failed to remove rejected upload {}: {}",
                        file_path.display(),
                        remove_error
                    );
                }
            }
            return Err(e.into());
        }
    };

    info!(
        "Processed upload '{}' into {} chunks",
        file_name, stats.chunks
    );
    Ok(Json(json!({
        "success": true,
        "message": format!("PDF '{}' uploaded and processed successfully!", file_name),
    })))
}

#[inline]
pub async fn ask(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AnswerResult>, AskError> {
    let Json(request) = payload.map_err(|e| AskError::InvalidRequest(e.body_text()))?;

    if request.question.trim().is_empty() {
        return Err(AskError::EmptyQuestion);
    }

    let result = state
        .answerer
        .answer(&request.question, &state.config.persist_dir, request.top_k)
        .await?;

    Ok(Json(result))
}

/// Keep only the final path component of a client-supplied file name
pub(crate) fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}
