//! Messages API client

use super::client::{create_http_client, non_empty, send_json, ModelClient};
use super::prompts::Prompt;
use crate::error::{GenerationError, Result};
use crate::model::{ProviderConfig, ProviderKind};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: [Message<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

pub struct AnthropicClient {
    client: Client,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_http_client(timeout, base_url)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete(&self, config: &ProviderConfig, prompt: &Prompt) -> Result<String> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key).map_err(|_| {
            GenerationError::provider_call(self.kind().as_str(), "API key is not a valid header value")
        })?;
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let request = MessagesRequest {
            model: &config.model,
            system: &prompt.instruction,
            messages: [Message {
                role: "user",
                content: &prompt.directive,
            }],
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        let builder = self
            .client
            .post(format!("{}/messages", self.base_url))
            .headers(headers)
            .json(&request);
        let parsed: MessagesResponse = send_json(self.kind(), builder).await?;

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");
        non_empty(self.kind(), text)
    }
}
