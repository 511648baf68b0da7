//! generateContent client

use super::client::{create_http_client, non_empty, send_json, ModelClient};
use super::prompts::Prompt;
use crate::error::{GenerationError, Result};
use crate::model::{ProviderConfig, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

pub struct GeminiClient {
    client: Client,
    base_url: Url,
}

impl GeminiClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("invalid Google base URL '{}': {}", base_url, e))?;
        if parsed.cannot_be_a_base() {
            anyhow::bail!("invalid Google base URL '{}'", base_url);
        }
        Ok(Self {
            client: create_http_client(timeout, base_url)?,
            base_url: parsed,
        })
    }

    /// `{base}/models/{model}:generateContent`, with the model id encoded as
    /// a single path segment
    fn generate_url(&self, model: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("models")
                .push(&format!("{}:generateContent", model));
        }
        url
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn complete(&self, config: &ProviderConfig, prompt: &Prompt) -> Result<String> {
        // No separate system slot: instruction and directive travel together
        let combined = prompt.combined();
        let request = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: &combined }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: config.max_tokens,
                temperature: config.temperature,
            },
        };

        let builder = self
            .client
            .post(self.generate_url(&config.model))
            .header("x-goog-api-key", &config.api_key)
            .json(&request);
        let parsed: GenerateContentResponse = send_json(self.kind(), builder).await?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GenerationError::provider_call(
                self.kind().as_str(),
                format!("Google API blocked the prompt ({})", reason),
            ));
        }

        let text = parsed
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");
        non_empty(self.kind(), text)
    }
}
