use super::generate::UPLOAD_LIMIT_BYTES;
use crate::model::{NewTranscript, Transcript};
use crate::server::{ApiError, AppState};
use crate::store::blocking;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::response::Json as ResponseJson;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

pub async fn create_transcript(
    State(state): State<AppState>,
    Json(payload): Json<NewTranscript>,
) -> Result<ResponseJson<Transcript>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    let store = state.store.clone();
    let transcript = blocking(move || store.insert(payload.into_transcript())).await?;
    Ok(ResponseJson(transcript))
}

/// All transcripts, newest first
pub async fn list_transcripts(
    State(state): State<AppState>,
) -> Result<ResponseJson<Vec<Transcript>>, ApiError> {
    let store = state.store.clone();
    let mut transcripts = blocking(move || store.all::<Transcript>()).await?;
    transcripts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(ResponseJson(transcripts))
}

pub async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<Transcript>, ApiError> {
    let store = state.store.clone();
    blocking(move || store.get::<Transcript>(id))
        .await?
        .map(ResponseJson)
        .ok_or_else(|| ApiError::not_found("Transcript"))
}

pub async fn delete_transcript(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<Value>, ApiError> {
    let store = state.store.clone();
    if !blocking(move || store.delete::<Transcript>(id)).await? {
        return Err(ApiError::not_found("Transcript"));
    }
    Ok(ResponseJson(json!({ "message": "Transcript deleted successfully" })))
}

/// Store every uploaded `.txt` file as a transcript titled by its stem.
/// Other files are skipped.
pub async fn upload_transcripts(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<ResponseJson<Value>, ApiError> {
    let mut transcripts = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let Some(title) = file_name.strip_suffix(".txt").map(str::to_string) else {
            tracing::warn!(file = %file_name, "skipping non-.txt transcript upload");
            continue;
        };
        let bytes = field.bytes().await?;
        transcripts.push(
            NewTranscript {
                title,
                content: String::from_utf8_lossy(&bytes).into_owned(),
                meeting_date: None,
                participants: None,
            }
            .into_transcript(),
        );
    }

    let store = state.store.clone();
    let transcripts =
        blocking(move || store.insert_many(&transcripts).map(|()| transcripts)).await?;
    Ok(ResponseJson(json!({
        "message": format!("Uploaded {} transcripts", transcripts.len()),
        "transcripts": transcripts,
    })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transcripts", get(list_transcripts).post(create_transcript))
        .route(
            "/transcripts/upload",
            post(upload_transcripts).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route(
            "/transcripts/{id}",
            get(get_transcript).delete(delete_transcript),
        )
}
