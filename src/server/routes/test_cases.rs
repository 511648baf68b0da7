use crate::model::{TestCase, TestCaseUpdate};
use crate::server::{ApiError, AppState};
use crate::store::blocking;
use axum::extract::{Path, State};
use axum::response::Json as ResponseJson;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

/// All test cases, newest first
pub async fn list_test_cases(
    State(state): State<AppState>,
) -> Result<ResponseJson<Vec<TestCase>>, ApiError> {
    let store = state.store.clone();
    let mut cases = blocking(move || store.all::<TestCase>()).await?;
    cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(ResponseJson(cases))
}

pub async fn get_test_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<TestCase>, ApiError> {
    let store = state.store.clone();
    blocking(move || store.get::<TestCase>(id))
        .await?
        .map(ResponseJson)
        .ok_or_else(|| ApiError::not_found("Test case"))
}

pub async fn update_test_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<TestCaseUpdate>,
) -> Result<ResponseJson<TestCase>, ApiError> {
    update.validate().map_err(ApiError::BadRequest)?;
    let store = state.store.clone();
    blocking(move || store.update::<TestCase>(id, |case| update.apply(case)))
        .await?
        .map(ResponseJson)
        .ok_or_else(|| ApiError::not_found("Test case"))
}

pub async fn delete_test_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<Value>, ApiError> {
    let store = state.store.clone();
    if !blocking(move || store.delete::<TestCase>(id)).await? {
        return Err(ApiError::not_found("Test case"));
    }
    Ok(ResponseJson(json!({ "message": "Test case deleted successfully" })))
}

/// Mark the given test cases as selected for export
pub async fn bulk_select(
    State(state): State<AppState>,
    Json(ids): Json<Vec<Uuid>>,
) -> Result<ResponseJson<Value>, ApiError> {
    let store = state.store.clone();
    let selected = blocking(move || {
        store.update_where::<TestCase>(
            |case| ids.contains(&case.id),
            |case| case.is_selected = true,
        )
    })
    .await?;
    Ok(ResponseJson(json!({
        "message": format!("Selected {} test cases", selected)
    })))
}

pub async fn delete_all(State(state): State<AppState>) -> Result<ResponseJson<Value>, ApiError> {
    let store = state.store.clone();
    let deleted = blocking(move || store.delete_all::<TestCase>()).await?;
    tracing::info!(deleted, "deleted all test cases");
    Ok(ResponseJson(json!({
        "message": format!("Deleted {} test cases", deleted)
    })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/test-cases", get(list_test_cases).delete(delete_all))
        .route("/test-cases/bulk-select", post(bulk_select))
        .route(
            "/test-cases/{id}",
            get(get_test_case)
                .put(update_test_case)
                .delete(delete_test_case),
        )
}
