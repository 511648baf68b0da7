use super::anthropic::AnthropicClient;
use super::gemini::GeminiClient;
use super::openai::OpenAiClient;
use super::prompts::Prompt;
use crate::config::AppConfig;
use crate::error::{GenerationError, Result};
use crate::model::{ProviderConfig, ProviderKind};
use crate::util::sanitize_api_response;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// One model API. Implementations are stateless apart from the shared
/// HTTP client and their base URL.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Send `prompt` using the model and generation parameters in `config`
    /// and return the reply text.
    async fn complete(&self, config: &ProviderConfig, prompt: &Prompt) -> Result<String>;
}

/// Anything that can turn a prompt into a raw model reply
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, config: &ProviderConfig, prompt: &Prompt) -> Result<String>;
}

fn is_loopback_base_url(base_url: &str) -> bool {
    url::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .is_some_and(|host| matches!(host.as_str(), "127.0.0.1" | "localhost" | "[::1]"))
}

/// Build the HTTP client shared by a provider client
pub fn create_http_client(timeout: Duration, base_url: &str) -> anyhow::Result<Client> {
    let mut builder = Client::builder().timeout(timeout);
    if is_loopback_base_url(base_url) {
        builder = builder.no_proxy();
    }
    builder
        .build()
        .context("failed to build provider HTTP client")
}

/// Routes a prompt to the client for the config's provider kind
pub struct Dispatcher {
    clients: Vec<Box<dyn ModelClient>>,
}

impl Dispatcher {
    pub fn new(clients: Vec<Box<dyn ModelClient>>) -> Self {
        Self { clients }
    }

    /// Dispatcher with the three built-in clients, pointed at the base URLs
    /// and timeout from `config`
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
        Ok(Self::new(vec![
            Box::new(OpenAiClient::new(&config.openai_base_url, timeout)?),
            Box::new(AnthropicClient::new(&config.anthropic_base_url, timeout)?),
            Box::new(GeminiClient::new(&config.google_base_url, timeout)?),
        ]))
    }

    fn client_for(&self, kind: ProviderKind) -> Option<&dyn ModelClient> {
        self.clients
            .iter()
            .find(|c| c.kind() == kind)
            .map(|c| c.as_ref())
    }
}

#[async_trait]
impl Dispatch for Dispatcher {
    async fn dispatch(&self, config: &ProviderConfig, prompt: &Prompt) -> Result<String> {
        let kind = config.kind()?;
        let client = self
            .client_for(kind)
            .ok_or_else(|| GenerationError::UnknownProvider(config.provider.clone()))?;

        tracing::debug!(
            provider = %kind,
            model = %config.model,
            instruction_chars = prompt.instruction.len(),
            "dispatching prompt"
        );
        let text = client.complete(config, prompt).await?;
        tracing::debug!(provider = %kind, reply_chars = text.len(), "provider replied");
        Ok(text)
    }
}

/// Send a JSON request and decode a successful JSON reply.
///
/// Transport failures, non-success statuses and undecodable bodies all
/// become `ProviderCallFailed`; quoted bodies are truncated and scrubbed.
pub(crate) async fn send_json<T: DeserializeOwned>(
    kind: ProviderKind,
    request: RequestBuilder,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| GenerationError::provider_call(kind.as_str(), describe_transport_error(e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GenerationError::provider_call(kind.as_str(), describe_transport_error(e)))?;

    if !status.is_success() {
        let detail = api_error_message(&body).unwrap_or_else(|| sanitize_api_response(&body));
        let message = match status.as_u16() {
            401 | 403 => format!("{} API rejected the credentials (HTTP {})", kind.label(), status),
            429 => format!("{} API rate limit reached (HTTP {}): {}", kind.label(), status, detail),
            _ => format!("{} API request failed: HTTP {} {}", kind.label(), status, detail),
        };
        return Err(GenerationError::provider_call(kind.as_str(), message));
    }

    serde_json::from_str(&body).map_err(|e| {
        GenerationError::provider_call(
            kind.as_str(),
            format!(
                "failed to decode {} response: {} ({})",
                kind.label(),
                e,
                sanitize_api_response(&body)
            ),
        )
    })
}

/// `error.message` from a provider error body, scrubbed
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?;
    Some(sanitize_api_response(message))
}

fn describe_transport_error(err: reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("could not connect: {}", err.without_url())
    } else {
        format!("request failed: {}", err.without_url())
    }
}

/// Reject a reply with no usable text
pub(crate) fn non_empty(kind: ProviderKind, text: String) -> Result<String> {
    if text.trim().is_empty() {
        return Err(GenerationError::provider_call(
            kind.as_str(),
            format!("{} API returned no text content", kind.label()),
        ));
    }
    Ok(text)
}
