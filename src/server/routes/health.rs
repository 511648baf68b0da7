use crate::server::AppState;
use axum::response::Json as ResponseJson;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};

pub async fn banner() -> ResponseJson<Value> {
    ResponseJson(json!({ "message": "casegen API is running" }))
}

pub async fn health_check() -> ResponseJson<Value> {
    ResponseJson(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health_check))
}
