use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{BackendApi, BackendConfig, RetryConfig};
use crate::error::{Result, SubtitleError};
use super::{EventSource, TranslationBackend};

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

/// Completion backend reached over HTTP with a streamed response
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
    retry: RetryConfig,
    delimiter: char,
}

impl HttpBackend {
    pub fn new(config: BackendConfig, retry: RetryConfig, delimiter: char) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            retry,
            delimiter,
        })
    }

    /// Request body for `text`, serialized once and reused across retries
    pub fn build_request_body(&self, text: &str, language: &str) -> Result<serde_json::Value> {
        let segments = text.split(self.delimiter).count();
        let instruction = build_instruction(language, self.delimiter, segments);

        let body = match self.config.api {
            BackendApi::Chat => serde_json::to_value(ChatRequest {
                model: self.config.model.clone(),
                messages: vec![
                    ChatMessage {
                        role: "system".to_string(),
                        content: instruction,
                    },
                    ChatMessage {
                        role: "user".to_string(),
                        content: text.to_string(),
                    },
                ],
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                stream: true,
            })?,
            BackendApi::Completion => serde_json::to_value(CompletionRequest {
                model: self.config.model.clone(),
                prompt: format!("{}\n\n{}", instruction, text),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                stream: true,
            })?,
        };
        Ok(body)
    }
}

/// Instruction telling the model to translate while keeping the segment layout
pub fn build_instruction(language: &str, delimiter: char, segments: usize) -> String {
    format!(
        "You are an experienced subtitle translator.\n\
         Translate the text below to {language}, preserving its meaning rather than translating literally.\n\
         The text consists of {segments} subtitle segments separated by the '{delimiter}' character.\n\
         Your answer must contain exactly {segments} translated segments separated by '{delimiter}', \
         in the same order, and nothing else."
    )
}

#[async_trait]
impl TranslationBackend for HttpBackend {
    async fn translate(&self, text: &str, language: &str) -> Result<EventSource> {
        let api_key = self.config.api_key()?;
        let body = self.build_request_body(text, language)?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                "Sending translation request to {} (attempt {}/{})",
                self.config.endpoint, attempt, self.retry.max_attempts
            );

            let mut request = self.client.post(&self.config.endpoint).json(&body);
            if let Some(key) = &api_key {
                request = request.bearer_auth(key);
            }

            let response = request
                .send()
                .await
                .map_err(|e| SubtitleError::TranslationFailed(format!("HTTP request failed: {}", e)))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= self.retry.max_attempts {
                    return Err(SubtitleError::TranslationFailed(format!(
                        "Rate limited on all {} attempts",
                        attempt
                    )));
                }
                warn!("Rate limit exceeded, retrying in {} ms", self.retry.delay_ms);
                tokio::time::sleep(self.retry.delay()).await;
                continue;
            }

            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(SubtitleError::TranslationFailed(format!(
                    "Backend returned {}: {}",
                    status, error_text
                )));
            }

            info!("Translation stream opened after {} attempt(s)", attempt);
            let frames = response.bytes_stream().map_err(SubtitleError::from);
            return Ok(EventSource::new(self.config.api, frames));
        }
    }
}
