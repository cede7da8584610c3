use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubtitleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed subtitle block: {0}")]
    Parse(String),

    #[error("Translation failed: {0}")]
    TranslationFailed(String),

    #[error("Corrupted translation stream: {0}")]
    StreamCorrupted(String),

    #[error("Group {group} expected {expected} translated segments, backend returned {actual}")]
    SegmentCountMismatch {
        group: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Payment required for job {0}")]
    PaymentRequired(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, SubtitleError>;
