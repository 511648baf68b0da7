use crate::error::GenerationError;
use crate::export::ExportError;
use crate::util::truncate;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Generation(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Export(ExportError::NothingSelected) => StatusCode::BAD_REQUEST,
            ApiError::Export(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Multipart(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            match &self {
                ApiError::Generation(GenerationError::MalformedAiResponse { raw_text }) => {
                    tracing::error!(
                        status = %status,
                        raw_reply = %truncate(raw_text, 500),
                        "failed to parse AI response"
                    );
                }
                _ => {
                    tracing::error!(status = %status, error = %self, "API request failed");
                }
            }
        }

        let detail = match &self {
            ApiError::Multipart(_) => {
                "Failed to read upload. Please ensure the files are valid and try again.".to_string()
            }
            ApiError::Store(_) | ApiError::Generation(GenerationError::Store(_)) => {
                "Internal storage error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
