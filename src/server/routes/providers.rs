use crate::model::{NewProviderConfig, ProviderConfig};
use crate::server::{ApiError, AppState};
use crate::store::blocking;
use axum::extract::State;
use axum::response::Json as ResponseJson;
use axum::routing::get;
use axum::{Json, Router};

/// Store a configuration and make it the only active one
pub async fn create_provider(
    State(state): State<AppState>,
    Json(payload): Json<NewProviderConfig>,
) -> Result<ResponseJson<ProviderConfig>, ApiError> {
    let registry = state.registry.clone();
    let config = blocking(move || registry.activate(payload)).await?;
    Ok(ResponseJson(config.redacted()))
}

pub async fn list_providers(
    State(state): State<AppState>,
) -> Result<ResponseJson<Vec<ProviderConfig>>, ApiError> {
    let registry = state.registry.clone();
    let configs = blocking(move || registry.list()).await?;
    Ok(ResponseJson(configs.iter().map(ProviderConfig::redacted).collect()))
}

pub async fn active_provider(
    State(state): State<AppState>,
) -> Result<ResponseJson<Option<ProviderConfig>>, ApiError> {
    let registry = state.registry.clone();
    let active = blocking(move || registry.active()).await?;
    Ok(ResponseJson(active.as_ref().map(ProviderConfig::redacted)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ai-providers", get(list_providers).post(create_provider))
        .route("/ai-providers/active", get(active_provider))
}
