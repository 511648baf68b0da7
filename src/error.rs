//! Error taxonomy for the generation pipeline

use thiserror::Error;

/// Failures surfaced by the generation pipeline.
///
/// Every variant carries enough detail to render a user-facing message.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No active AI provider configured")]
    NoActiveProvider,

    #[error("Unknown AI provider '{0}'. Expected one of: openai, anthropic, google")]
    UnknownProvider(String),

    #[error("AI generation failed ({provider}): {message}")]
    ProviderCallFailed { provider: String, message: String },

    #[error("Unsupported file format: {0}")]
    UnsupportedFileFormat(String),

    #[error("Failed to extract text from {file}: {message}")]
    ExtractionFailed { file: String, message: String },

    #[error("Failed to parse AI response")]
    MalformedAiResponse { raw_text: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl GenerationError {
    pub(crate) fn provider_call(provider: impl Into<String>, message: impl Into<String>) -> Self {
        GenerationError::ProviderCallFailed {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub(crate) fn malformed(raw_text: impl Into<String>) -> Self {
        GenerationError::MalformedAiResponse {
            raw_text: raw_text.into(),
        }
    }

    /// Whether the failure was caused by the caller's input rather than
    /// by the provider or the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GenerationError::NoActiveProvider
                | GenerationError::UnknownProvider(_)
                | GenerationError::UnsupportedFileFormat(_)
                | GenerationError::ExtractionFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
