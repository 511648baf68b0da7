//! HTTP API
//!
//! Every route lives under `/api`. Errors render as `{"detail": "..."}`.

pub mod error;
mod routes;

use crate::context::ContextAggregator;
use crate::generate::llm::Dispatch;
use crate::generate::Orchestrator;
use crate::registry::ProviderRegistry;
use crate::store::Store;
use anyhow::Context;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Shared handles for request handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub registry: ProviderRegistry,
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(store: Store, dispatcher: Arc<dyn Dispatch>) -> Self {
        let registry = ProviderRegistry::new(store.clone());
        let orchestrator = Orchestrator::new(
            registry.clone(),
            store.clone(),
            ContextAggregator::default(),
            dispatcher,
        );
        Self {
            store,
            registry,
            orchestrator,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(routes::health::router())
        .merge(routes::providers::router())
        .merge(routes::generate::router())
        .merge(routes::test_cases::router())
        .merge(routes::transcripts::router())
        .merge(routes::export::router());

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let local = listener.local_addr()?;
    tracing::info!(address = %local, "casegen API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::error::Result;
    use crate::generate::llm::Prompt;
    use crate::model::ProviderConfig;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    pub(crate) const VALID_REPLY: &str = "```json\n[{\"title\":\"Login works\",\"description\":\"d\",\"preconditions\":\"p\",\"steps\":[\"Open\",\"Submit\"],\"expected_result\":\"e\",\"priority\":\"high\"}]\n```";

    pub(crate) struct CannedDispatch(pub &'static str);

    #[async_trait]
    impl Dispatch for CannedDispatch {
        async fn dispatch(&self, _config: &ProviderConfig, _prompt: &Prompt) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    pub(crate) fn test_state(reply: &'static str) -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, AppState::new(store, Arc::new(CannedDispatch(reply))))
    }

    pub(crate) async fn send(
        state: &AppState,
        request: Request<Body>,
    ) -> (StatusCode, serde_json::Value) {
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    pub(crate) fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub(crate) fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub(crate) const BOUNDARY: &str = "casegen-test-boundary";

    /// Multipart body from `(field, file name, content)` parts
    pub(crate) fn multipart_request(uri: &str, parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (field, file_name, content) in parts {
            body.push_str(&format!("--{}\r\n", BOUNDARY));
            match file_name {
                Some(name) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    field, name
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    field
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_banner_and_health() {
        let (_dir, state) = test_state(VALID_REPLY);

        let (status, body) = send(&state, get("/api")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "casegen API is running");

        let (status, body) = send(&state, get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (_dir, state) = test_state(VALID_REPLY);
        let (status, _) = send(&state, get("/api/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
