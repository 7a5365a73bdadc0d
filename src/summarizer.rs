use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SummarizerConfig;

/// Character budget of the local fallback summary.
pub const FALLBACK_BUDGET: usize = 100;

pub const SUMMARY_INSTRUCTION: &str = "Summarize the text below in less than 20 words, \
highlighting main points and avoiding unnecessary details.";

/// External text-summarization service.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn complete(&self, content: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_completion_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI-compatible chat completion client.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(cfg: &SummarizerConfig, api_key: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build summary http client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
        })
    }
}

#[async_trait]
impl SummaryProvider for OpenAiProvider {
    async fn complete(&self, content: &str) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SUMMARY_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content,
                },
            ],
            max_completion_tokens: self.max_tokens,
            temperature: 0.7,
        };

        let reply: ChatResponse = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("summary request")?
            .error_for_status()
            .context("summary service error status")?
            .json::<ChatResponse>()
            .await
            .context("decode summary response")?;

        let summary = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("summary response had no content")?;
        debug!(summary = %summary, "generated summary");
        Ok(summary)
    }
}

/// Title generation with a bounded external call and a local fallback.
#[derive(Clone)]
pub struct Summarizer {
    provider: Option<Arc<dyn SummaryProvider>>,
    timeout: Duration,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn SummaryProvider>, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            timeout,
        }
    }

    /// Never touches the network.
    pub fn fallback_only() -> Self {
        Self {
            provider: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn from_config(cfg: &SummarizerConfig) -> anyhow::Result<Self> {
        let Some(key) = cfg.api_key.as_deref() else {
            warn!("no summary api key configured; titles use the local fallback");
            return Ok(Self::fallback_only());
        };
        let provider = Arc::new(OpenAiProvider::new(cfg, key)?) as Arc<dyn SummaryProvider>;
        Ok(Self::new(provider, Duration::from_secs(cfg.timeout_secs)))
    }

    /// Never fails; any provider problem yields [`fallback_summary`].
    pub async fn summarize(&self, content: &str) -> String {
        if content.trim().is_empty() {
            return String::new();
        }
        let Some(provider) = &self.provider else {
            return fallback_summary(content);
        };

        match tokio::time::timeout(self.timeout, provider.complete(content)).await {
            Ok(Ok(summary)) if !summary.trim().is_empty() => summary.trim().to_string(),
            Ok(Ok(_)) => {
                warn!("summary service returned empty text; using fallback");
                fallback_summary(content)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "summary service failed; using fallback");
                fallback_summary(content)
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "summary service timed out; using fallback");
                fallback_summary(content)
            }
        }
    }
}

/// Deterministic truncation of `content` to [`FALLBACK_BUDGET`] characters,
/// ending at a sentence when one closes past the middle of the budget,
/// otherwise at a word boundary followed by "...".
pub fn fallback_summary(content: &str) -> String {
    if content.chars().count() <= FALLBACK_BUDGET {
        return content.to_string();
    }
    let prefix: Vec<char> = content.chars().take(FALLBACK_BUDGET).collect();

    if let Some(dot) = prefix.iter().rposition(|&c| c == '.') {
        if dot > FALLBACK_BUDGET / 2 {
            return prefix[..=dot].iter().collect();
        }
    }

    let cut = prefix
        .iter()
        .rposition(|c| c.is_whitespace())
        .unwrap_or(prefix.len());
    let head: String = prefix[..cut].iter().collect();
    format!("{}...", head.trim_end())
}
