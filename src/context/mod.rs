//! Context aggregation
//!
//! Gathers labelled plain-text fragments from uploaded files and stored
//! transcripts into the single context block handed to the prompt builder.

pub mod extract;

pub use extract::{DocumentExtractor, DocumentKind, TextExtractor};

use crate::model::{FileBlob, Transcript};
use futures::future::join_all;
use std::sync::Arc;

const FRAGMENT_SEPARATOR: &str = "\n\n";

/// A piece of context together with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    File { name: String, text: String },
    Transcript { title: String, content: String },
}

impl Fragment {
    fn render(&self) -> String {
        match self {
            Fragment::File { name, text } => format!("File: {}\n{}", name, text),
            Fragment::Transcript { title, content } => {
                format!("Meeting Transcript - {}:\n{}", title, content)
            }
        }
    }
}

/// Join fragments into one context block. Empty input gives an empty string.
pub fn render_fragments(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .map(Fragment::render)
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR)
}

#[derive(Clone)]
pub struct ContextAggregator {
    extractor: Arc<dyn TextExtractor>,
}

impl Default for ContextAggregator {
    fn default() -> Self {
        Self::new(Arc::new(DocumentExtractor))
    }
}

impl ContextAggregator {
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self { extractor }
    }

    /// Build the context block for one request.
    ///
    /// Files come first in upload order, then transcripts in the order
    /// given. A file that cannot be read is logged and left out; blank
    /// fragments are dropped.
    pub async fn aggregate(&self, files: &[FileBlob], transcripts: &[Transcript]) -> String {
        let mut fragments = self.extract_files(files).await;

        fragments.extend(
            transcripts
                .iter()
                .filter(|t| !t.content.trim().is_empty())
                .map(|t| Fragment::Transcript {
                    title: t.title.clone(),
                    content: t.content.clone(),
                }),
        );

        render_fragments(&fragments)
    }

    async fn extract_files(&self, files: &[FileBlob]) -> Vec<Fragment> {
        let tasks = files.iter().map(|file| {
            let extractor = Arc::clone(&self.extractor);
            let name = file.name.clone();
            let bytes = file.bytes.clone();
            async move {
                let task_name = name.clone();
                let joined =
                    tokio::task::spawn_blocking(move || extractor.extract(&task_name, &bytes))
                        .await;
                (name, joined)
            }
        });

        let mut fragments = Vec::with_capacity(files.len());
        for (name, joined) in join_all(tasks).await {
            match joined {
                Ok(Ok(text)) if text.trim().is_empty() => {
                    tracing::debug!(file = %name, "skipping file with no extractable text");
                }
                Ok(Ok(text)) => fragments.push(Fragment::File { name, text }),
                Ok(Err(err)) => {
                    tracing::warn!(file = %name, error = %err, "skipping file");
                }
                Err(err) => {
                    tracing::warn!(file = %name, error = %err, "extraction task failed");
                }
            }
        }
        fragments
    }
}
