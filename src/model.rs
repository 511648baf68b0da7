//! Entities shared by the pipeline, the store and the request layer

use crate::error::GenerationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TEST_TYPE: &str = "Functional";
pub const DEFAULT_CATEGORY: &str = "Functional";
pub const DEFAULT_TEST_CASE_COUNT: u32 = 5;

// ═══════════════════════════════════════════════════════════════════════════
//  PROVIDERS
// ═══════════════════════════════════════════════════════════════════════════

/// External model APIs a configuration can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Chat-completion API
    OpenAi,
    /// Message-generation API
    Anthropic,
    /// Content-generation API
    Google,
}

impl ProviderKind {
    pub fn all() -> [ProviderKind; 3] {
        [ProviderKind::OpenAi, ProviderKind::Anthropic, ProviderKind::Google]
    }

    /// Wire name, as stored in a configuration record
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Google => "Google",
        }
    }

    /// Models offered when configuring this provider
    pub fn suggested_models(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenAi => &["gpt-4", "gpt-4-turbo", "gpt-3.5-turbo"],
            ProviderKind::Anthropic => &[
                "claude-3-opus-20240229",
                "claude-3-sonnet-20240229",
                "claude-3-haiku-20240307",
            ],
            ProviderKind::Google => &["gemini-pro", "gemini-pro-vision"],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "google" | "gemini" => Ok(ProviderKind::Google),
            _ => Err(GenerationError::UnknownProvider(s.to_string())),
        }
    }
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// A stored model-provider configuration.
///
/// `provider` keeps the wire string so records written with a kind this
/// build does not know still load; [`ProviderConfig::kind`] rejects them.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: Uuid,
    pub provider: String,
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_active: bool,
}

impl ProviderConfig {
    pub fn kind(&self) -> Result<ProviderKind, GenerationError> {
        self.provider.parse()
    }

    /// Copy with the credential masked, for list views
    pub fn redacted(&self) -> Self {
        Self {
            api_key: crate::util::mask_secret(&self.api_key),
            ..self.clone()
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("created_at", &self.created_at)
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// Payload for creating a provider configuration
#[derive(Clone, Deserialize)]
pub struct NewProviderConfig {
    pub provider: String,
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl NewProviderConfig {
    pub fn into_config(self) -> ProviderConfig {
        ProviderConfig {
            id: Uuid::new_v4(),
            provider: self.provider.trim().to_ascii_lowercase(),
            api_key: self.api_key,
            model: self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            created_at: Utc::now(),
            is_active: true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  TEST CASES
// ═══════════════════════════════════════════════════════════════════════════

/// Priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Case-insensitive; anything unrecognized is Medium.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub preconditions: String,
    /// Ordered; never empty
    pub steps: Vec<String>,
    pub expected_result: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_category")]
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_selected: bool,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl TestCase {
    pub fn new(
        title: String,
        description: String,
        preconditions: String,
        steps: Vec<String>,
        expected_result: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            preconditions,
            steps,
            expected_result,
            priority: Priority::Medium,
            category: default_category(),
            created_at: now,
            updated_at: now,
            is_selected: false,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// Partial edit of a stored test case
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestCaseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub preconditions: Option<String>,
    pub steps: Option<Vec<String>>,
    pub expected_result: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub is_selected: Option<bool>,
}

impl TestCaseUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if matches!(&self.steps, Some(steps) if steps.is_empty()) {
            return Err("steps must not be empty".to_string());
        }
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            return Err("title must not be blank".to_string());
        }
        Ok(())
    }

    pub fn apply(self, case: &mut TestCase) {
        if let Some(title) = self.title {
            case.title = title;
        }
        if let Some(description) = self.description {
            case.description = description;
        }
        if let Some(preconditions) = self.preconditions {
            case.preconditions = preconditions;
        }
        if let Some(steps) = self.steps {
            case.steps = steps;
        }
        if let Some(expected_result) = self.expected_result {
            case.expected_result = expected_result;
        }
        if let Some(priority) = self.priority {
            case.priority = priority;
        }
        if let Some(category) = self.category {
            case.category = category;
        }
        if let Some(is_selected) = self.is_selected {
            case.is_selected = is_selected;
        }
        case.updated_at = Utc::now();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  TRANSCRIPTS
// ═══════════════════════════════════════════════════════════════════════════

/// A stored meeting transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub meeting_date: Option<String>,
    #[serde(default)]
    pub participants: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTranscript {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub meeting_date: Option<String>,
    #[serde(default)]
    pub participants: Option<String>,
}

impl NewTranscript {
    pub fn into_transcript(self) -> Transcript {
        let now = Utc::now();
        Transcript {
            id: Uuid::new_v4(),
            title: self.title,
            content: self.content,
            meeting_date: self.meeting_date,
            participants: self.participants,
            created_at: now,
            updated_at: now,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  GENERATION REQUEST
// ═══════════════════════════════════════════════════════════════════════════

/// An uploaded file, before text extraction
#[derive(Debug, Clone)]
pub struct FileBlob {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// One generation request; never persisted
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub test_type: String,
    pub count: NonZeroU32,
    pub files: Vec<FileBlob>,
    pub transcript_ids: Vec<Uuid>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            test_type: DEFAULT_TEST_TYPE.to_string(),
            count: NonZeroU32::new(DEFAULT_TEST_CASE_COUNT).unwrap_or(NonZeroU32::MIN),
            files: Vec::new(),
            transcript_ids: Vec::new(),
        }
    }

    pub fn with_test_type(mut self, test_type: impl Into<String>) -> Self {
        self.test_type = test_type.into();
        self
    }

    pub fn with_count(mut self, count: NonZeroU32) -> Self {
        self.count = count;
        self
    }

    pub fn with_files(mut self, files: Vec<FileBlob>) -> Self {
        self.files = files;
        self
    }

    pub fn with_transcripts(mut self, ids: Vec<Uuid>) -> Self {
        self.transcript_ids = ids;
        self
    }
}
