//! Article summarization backends.
//!
//! Summaries are optional enrichment: callers treat every error as
//! "post without a summary".

mod gemini;
mod noop;

pub use gemini::{GeminiSummarizer, DEFAULT_GEMINI_MODEL};
pub use noop::NoopSummarizer;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SummarizerConfig;
use crate::{RelayError, Result};

/// Default instruction given to the model.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert at summarizing articles. \
Summarize the following article in three to five sentences, \
keeping the most important facts first.";

/// Produces a short summary for an article.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `article` (plain text), using `title` as context.
    async fn summarize(&self, article: &str, title: &str) -> Result<String>;

    /// A disabled summarizer is skipped without being called.
    fn is_enabled(&self) -> bool;
}

/// Build the summarizer selected by `config.provider`.
pub fn from_config(config: &SummarizerConfig) -> Result<Arc<dyn Summarizer>> {
    match config.provider.trim().to_lowercase().as_str() {
        "" | "noop" => Ok(Arc::new(NoopSummarizer)),
        "gemini" => Ok(Arc::new(GeminiSummarizer::new(config)?)),
        other => Err(RelayError::Config(format!("unknown summarizer provider: {other}"))),
    }
}
