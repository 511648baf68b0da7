//! Test-case generation
//!
//! The orchestrator runs one request through the pipeline: provider
//! snapshot, context, prompt, dispatch, parse. It is the only entry point
//! the HTTP and CLI layers use.

pub mod llm;

use crate::context::ContextAggregator;
use crate::error::Result;
use crate::model::{GenerationRequest, TestCase, Transcript};
use crate::registry::ProviderRegistry;
use crate::store::{blocking, Store};
use llm::{build_prompt, parse_reply, Dispatch};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct Orchestrator {
    registry: ProviderRegistry,
    store: Store,
    aggregator: ContextAggregator,
    dispatcher: Arc<dyn Dispatch>,
}

impl Orchestrator {
    pub fn new(
        registry: ProviderRegistry,
        store: Store,
        aggregator: ContextAggregator,
        dispatcher: Arc<dyn Dispatch>,
    ) -> Self {
        Self {
            registry,
            store,
            aggregator,
            dispatcher,
        }
    }

    /// Generate validated test cases for `request`. Nothing is persisted.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Vec<TestCase>> {
        let registry = self.registry.clone();
        let provider = blocking(move || registry.require_active()).await?;
        let started = Instant::now();
        tracing::info!(
            provider = %provider.provider,
            model = %provider.model,
            count = request.count.get(),
            files = request.files.len(),
            transcripts = request.transcript_ids.len(),
            "generating test cases"
        );

        let transcripts = self.selected_transcripts(request).await?;
        let context = self.aggregator.aggregate(&request.files, &transcripts).await;
        let prompt = build_prompt(&request.prompt, &request.test_type, request.count, &context);

        let raw = self.dispatcher.dispatch(&provider, &prompt).await?;
        let cases = parse_reply(&raw)?;

        tracing::info!(
            provider = %provider.provider,
            generated = cases.len(),
            requested = request.count.get(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generated test cases"
        );
        Ok(cases)
    }

    /// Stored transcripts named by the request, in request order. Unknown
    /// ids are skipped.
    async fn selected_transcripts(&self, request: &GenerationRequest) -> Result<Vec<Transcript>> {
        if request.transcript_ids.is_empty() {
            return Ok(Vec::new());
        }
        let store = self.store.clone();
        let ids = request.transcript_ids.clone();
        let stored = blocking(move || store.find::<Transcript>(|t| ids.contains(&t.id))).await?;

        let mut ordered = Vec::with_capacity(stored.len());
        for id in &request.transcript_ids {
            match stored.iter().find(|t| t.id == *id) {
                Some(t) => ordered.push(t.clone()),
                None => tracing::warn!(transcript = %id, "selected transcript not found"),
            }
        }
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::model::{
        FileBlob, NewProviderConfig, NewTranscript, ProviderConfig, DEFAULT_MAX_TOKENS,
        DEFAULT_TEMPERATURE,
    };
    use async_trait::async_trait;
    use llm::Prompt;
    use std::num::NonZeroU32;
    use std::sync::Mutex;

    const VALID_REPLY: &str = "```json\n[{\"title\":\"Login\",\"description\":\"d\",\"preconditions\":\"p\",\"steps\":[\"a\"],\"expected_result\":\"e\"}]\n```";

    struct FakeDispatch {
        reply: String,
        seen: Mutex<Vec<Prompt>>,
    }

    impl FakeDispatch {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Dispatch for FakeDispatch {
        async fn dispatch(&self, _config: &ProviderConfig, prompt: &Prompt) -> Result<String> {
            self.seen.lock().unwrap().push(prompt.clone());
            Ok(self.reply.clone())
        }
    }

    fn setup(dispatch: Arc<FakeDispatch>) -> (tempfile::TempDir, Store, Orchestrator) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let registry = ProviderRegistry::new(store.clone());
        let orchestrator = Orchestrator::new(
            registry,
            store.clone(),
            ContextAggregator::default(),
            dispatch,
        );
        (dir, store, orchestrator)
    }

    fn activate(store: &Store) {
        ProviderRegistry::new(store.clone())
            .activate(NewProviderConfig {
                provider: "openai".to_string(),
                api_key: "k".to_string(),
                model: "gpt-4".to_string(),
                max_tokens: DEFAULT_MAX_TOKENS,
                temperature: DEFAULT_TEMPERATURE,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_active_provider_short_circuits() {
        let fake = FakeDispatch::replying(VALID_REPLY);
        let (_dir, _store, orchestrator) = setup(fake.clone());

        let err = orchestrator
            .generate(&GenerationRequest::new("login"))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::NoActiveProvider));
        assert!(fake.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generates_from_fenced_reply() {
        let fake = FakeDispatch::replying(VALID_REPLY);
        let (_dir, store, orchestrator) = setup(fake.clone());
        activate(&store);

        let cases = orchestrator
            .generate(&GenerationRequest::new("login").with_count(NonZeroU32::new(1).unwrap()))
            .await
            .unwrap();

        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].title, "Login");
        let seen = fake.seen.lock().unwrap();
        assert_eq!(seen[0].directive, "Generate 1 test cases for: login");
    }

    #[tokio::test]
    async fn test_context_reaches_prompt() {
        let fake = FakeDispatch::replying(VALID_REPLY);
        let (_dir, store, orchestrator) = setup(fake.clone());
        activate(&store);
        let kickoff = store
            .insert(
                NewTranscript {
                    title: "Kickoff".to_string(),
                    content: "Guests can check out".to_string(),
                    meeting_date: None,
                    participants: None,
                }
                .into_transcript(),
            )
            .unwrap();

        let request = GenerationRequest::new("checkout")
            .with_files(vec![FileBlob::new("cart.txt", b"Cart holds 50 items".to_vec())])
            .with_transcripts(vec![kickoff.id, uuid::Uuid::new_v4()]);
        orchestrator.generate(&request).await.unwrap();

        let seen = fake.seen.lock().unwrap();
        assert!(seen[0]
            .instruction
            .ends_with("File: cart.txt\nCart holds 50 items\n\nMeeting Transcript - Kickoff:\nGuests can check out"));
    }

    #[tokio::test]
    async fn test_malformed_reply_carries_raw_text() {
        let fake = FakeDispatch::replying("I cannot help with that.");
        let (_dir, store, orchestrator) = setup(fake);
        activate(&store);

        let err = orchestrator
            .generate(&GenerationRequest::new("login"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::MalformedAiResponse { ref raw_text } if raw_text == "I cannot help with that."
        ));
    }
}
