//! Disabled summarizer.

use async_trait::async_trait;

use super::Summarizer;
use crate::Result;

/// Summarizer used when no provider is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSummarizer;

#[async_trait]
impl Summarizer for NoopSummarizer {
    async fn summarize(&self, _article: &str, _title: &str) -> Result<String> {
        Ok(String::new())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
