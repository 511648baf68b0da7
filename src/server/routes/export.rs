use crate::export::{export_selected, ExportFormat};
use crate::server::{ApiError, AppState};
use crate::store::blocking;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

async fn download(state: AppState, format: ExportFormat) -> Result<Response, ApiError> {
    let bytes = blocking(move || export_selected(&state.store, format)).await?;
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", format.file_name()),
            ),
        ],
        bytes,
    )
        .into_response())
}

pub async fn export_json(State(state): State<AppState>) -> Result<Response, ApiError> {
    download(state, ExportFormat::Json).await
}

pub async fn export_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    download(state, ExportFormat::Csv).await
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/export/json", get(export_json))
        .route("/export/csv", get(export_csv))
}
