use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::QaError;

pub const NOT_INDEXED_ERROR: &str = "No documents uploaded yet";
pub const NOT_INDEXED_ANSWER: &str = "Please upload a PDF document first before asking questions.";
pub const EMPTY_QUESTION_ERROR: &str = "Question must not be empty";

/// Failure of `POST /api/upload-pdf`, rendered as `{success: false, error}`
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl From<QaError> for UploadError {
    #[inline]
    fn from(error: QaError) -> Self {
        if error.is_input_error() {
            Self::BadRequest(error.to_string())
        } else {
            Self::Internal(error.to_string())
        }
    }
}

impl IntoResponse for UploadError {
    #[inline]
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(message) => {
                warn!("Rejected upload: {}", message);
                StatusCode::BAD_REQUEST
            }
            Self::Internal(message) => {
                error!("Upload failed: {}", message);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Failure of `POST /api/ask`, rendered as `{error, answer}`
#[derive(Debug, Error)]
pub enum AskError {
    #[error("No documents uploaded yet")]
    NotIndexed,
    #[error("Question must not be empty")]
    EmptyQuestion,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl From<QaError> for AskError {
    #[inline]
    fn from(error: QaError) -> Self {
        match error {
            QaError::NotIndexed { .. } => Self::NotIndexed,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AskError {
    #[inline]
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, answer) = match &self {
            Self::NotIndexed => (StatusCode::BAD_REQUEST, NOT_INDEXED_ANSWER.to_string()),
            Self::EmptyQuestion => (
                StatusCode::BAD_REQUEST,
                "Please enter a question.".to_string(),
            ),
            Self::InvalidRequest(_) => (
                StatusCode::BAD_REQUEST,
                format!("Error processing question: {}", message),
            ),
            Self::Internal(_) => {
                error!("Question failed: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Error processing question: {}", message),
                )
            }
        };

        let body = Json(json!({ "error": message, "answer": answer }));
        (status, body).into_response()
    }
}
