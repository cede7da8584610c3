use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{Result, SubtitleError};

// The completion API shares one context window between prompt and answer.
// Output can run several times longer than the input for some language pairs,
// so 700 input tokens keeps a 4096-token window safe with room for the prompt.
fn default_token_budget() -> usize {
    700
}

fn default_delimiter() -> char {
    '|'
}

fn default_jobs_dir() -> PathBuf {
    PathBuf::from(".srtlate/jobs")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub grouping: GroupingConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Full URL of the streaming completion endpoint
    pub endpoint: String,
    /// Model name sent with every request
    pub model: String,
    /// Request/response wire shape
    pub api: BackendApi,
    /// Environment variable holding the bearer token (no auth header when unset)
    pub api_key_env: Option<String>,
    /// Upper bound on generated tokens per request
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Whole-request timeout in seconds, including the streamed body
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendApi {
    /// Chat completions: system instruction plus user message, delta at `choices[0].delta.content`
    Chat,
    /// Plain completions: `{model, prompt, stream}`, delta at `choices[0].text`
    Completion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per group request when the backend rate-limits
    pub max_attempts: u32,
    /// Fixed delay between rate-limited attempts, in milliseconds
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Soft token budget per translation request
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    /// Optional `tokenizer.json`; a character-based estimate is used when absent
    pub tokenizer_file: Option<PathBuf>,
    /// Character separating segment texts inside a request and its response
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Directory holding persisted job records
    #[serde(default = "default_jobs_dir")]
    pub dir: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api: BackendApi::Chat,
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            max_tokens: 4096,
            temperature: 0.0,
            timeout_secs: 300,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            tokenizer_file: None,
            delimiter: default_delimiter(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            dir: default_jobs_dir(),
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl BackendConfig {
    /// Resolve the bearer token from the configured environment variable
    pub fn api_key(&self) -> Result<Option<String>> {
        match &self.api_key_env {
            None => Ok(None),
            Some(var) => std::env::var(var).map(Some).map_err(|_| {
                SubtitleError::Config(format!("Environment variable {} is not set", var))
            }),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubtitleError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| SubtitleError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubtitleError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubtitleError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(SubtitleError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.grouping.token_budget == 0 {
            return Err(SubtitleError::Config("grouping.token_budget must be positive".to_string()));
        }
        if self.grouping.delimiter.is_whitespace() {
            return Err(SubtitleError::Config("grouping.delimiter must not be whitespace".to_string()));
        }
        Ok(())
    }
}
