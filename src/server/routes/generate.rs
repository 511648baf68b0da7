use crate::model::{FileBlob, GenerationRequest, TestCase};
use crate::server::{ApiError, AppState};
use crate::store::blocking;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::Json as ResponseJson;
use axum::routing::post;
use axum::Router;
use std::num::NonZeroU32;
use uuid::Uuid;

/// Uploads go through the multipart form, so lift axum's 2 MB default
pub(crate) const UPLOAD_LIMIT_BYTES: usize = 25 * 1024 * 1024;

/// Read the generation form: `prompt`, `test_type`, `num_test_cases`,
/// `selected_transcripts` (JSON id array) and any number of `files`.
async fn read_generation_form(mut multipart: Multipart) -> Result<GenerationRequest, ApiError> {
    let mut prompt = None;
    let mut test_type = None;
    let mut count = None;
    let mut transcript_ids = Vec::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" => {
                let Some(file_name) = field.file_name().map(str::to_string) else {
                    continue;
                };
                if file_name.is_empty() {
                    continue;
                }
                let bytes = field.bytes().await?;
                files.push(FileBlob::new(file_name, bytes.to_vec()));
            }
            "prompt" => prompt = Some(field.text().await?),
            "test_type" => test_type = Some(field.text().await?),
            "num_test_cases" => {
                let raw = field.text().await?;
                let parsed = raw.trim().parse::<NonZeroU32>().map_err(|_| {
                    ApiError::BadRequest(format!(
                        "num_test_cases must be a positive integer, got '{}'",
                        raw.trim()
                    ))
                })?;
                count = Some(parsed);
            }
            "selected_transcripts" => {
                let raw = field.text().await?;
                if !raw.trim().is_empty() {
                    transcript_ids = serde_json::from_str::<Vec<Uuid>>(&raw).map_err(|e| {
                        ApiError::BadRequest(format!("selected_transcripts is not a JSON id array: {}", e))
                    })?;
                }
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown form field");
            }
        }
    }

    let prompt = prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("prompt is required".to_string()))?;

    let mut request = GenerationRequest::new(prompt)
        .with_files(files)
        .with_transcripts(transcript_ids);
    if let Some(test_type) = test_type.filter(|t| !t.trim().is_empty()) {
        request = request.with_test_type(test_type);
    }
    if let Some(count) = count {
        request = request.with_count(count);
    }
    Ok(request)
}

/// Generate test cases and persist them
pub async fn generate_test_cases(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<ResponseJson<Vec<TestCase>>, ApiError> {
    let request = read_generation_form(multipart).await?;
    let cases = state.orchestrator.generate(&request).await?;
    let store = state.store.clone();
    let cases = blocking(move || store.insert_many(&cases).map(|()| cases)).await?;
    Ok(ResponseJson(cases))
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/generate-test-cases",
        post(generate_test_cases).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
    )
}
