//! Google Gemini summarizer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{Summarizer, DEFAULT_SYSTEM_PROMPT};
use crate::config::SummarizerConfig;
use crate::{RelayError, Result};

/// Model used when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Summarizer calling the Gemini `generateContent` API.
pub struct GeminiSummarizer {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    system_prompt: String,
    max_input_length: usize,
}

impl GeminiSummarizer {
    /// Create a summarizer from configuration. An API key is required.
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(RelayError::Config(
                "Gemini API key is required".to_string(),
            ));
        }

        let model = if config.model.is_empty() {
            DEFAULT_GEMINI_MODEL.to_string()
        } else {
            config.model.clone()
        };
        let system_prompt = if config.system_instruction.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT.to_string()
        } else {
            config.system_instruction.clone()
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| RelayError::Summarize(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: config.api_key.clone(),
            model,
            max_tokens: config.max_tokens,
            system_prompt,
            max_input_length: config.max_input_length.max(1),
        })
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, article: &str, title: &str) -> serde_json::Value {
        let article = truncate_input(article, self.max_input_length);
        let prompt = format!("Title: {}\n\nArticle:\n{}", title, article);

        json!({
            "systemInstruction": { "parts": [{ "text": self.system_prompt }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "maxOutputTokens": self.max_tokens,
                "temperature": 0.3
            }
        })
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, article: &str, title: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(article, title))
            .send()
            .await
            .map_err(|e| RelayError::Summarize(format!("failed to call Gemini API: {}", e)))?;

        if !response.status().is_success() {
            return Err(RelayError::Summarize(format!(
                "Gemini API returned status {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Summarize(format!("failed to decode response: {}", e)))?;

        let summary: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        let summary = summary.trim();
        if summary.is_empty() {
            return Err(RelayError::Summarize(
                "no summary returned from Gemini API".to_string(),
            ));
        }
        Ok(summary.to_string())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Cut `text` to `max_chars` characters, marking the cut with "...".
fn truncate_input(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
