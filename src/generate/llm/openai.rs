//! Chat-completions client

use super::client::{create_http_client, non_empty, send_json, ModelClient};
use super::prompts::Prompt;
use crate::error::Result;
use crate::model::{ProviderConfig, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    client: Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_http_client(timeout, base_url)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(&self, config: &ProviderConfig, prompt: &Prompt) -> Result<String> {
        let request = ChatRequest {
            model: &config.model,
            messages: [
                Message {
                    role: "system",
                    content: &prompt.instruction,
                },
                Message {
                    role: "user",
                    content: &prompt.directive,
                },
            ],
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&config.api_key)
            .json(&request);
        let parsed: ChatResponse = send_json(self.kind(), builder).await?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        non_empty(self.kind(), content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::generate::llm::client::tests::{sample_config, sample_prompt};
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_complete_sends_chat_shape() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4",
                "max_tokens": 512,
                "messages": [
                    {"role": "system", "content": "You write test cases."},
                    {"role": "user", "content": "Generate 1 test cases for: login"}
                ]
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"[]"}}]}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let text = client
            .complete(&sample_config("openai", "gpt-4"), &sample_prompt())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(text, "[]");
    }

    #[tokio::test]
    async fn test_error_status_is_provider_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body(r#"{"error":{"message":"upstream overloaded"}}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client
            .complete(&sample_config("openai", "gpt-4"), &sample_prompt())
            .await
            .unwrap_err();

        match err {
            GenerationError::ProviderCallFailed { provider, message } => {
                assert_eq!(provider, "openai");
                assert!(message.contains("upstream overloaded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_null_content_is_provider_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client
            .complete(&sample_config("openai", "gpt-4"), &sample_prompt())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::ProviderCallFailed { .. }));
    }
}
