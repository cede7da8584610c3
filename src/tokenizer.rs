use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SubtitleError};

/// Counts tokens the way the target model will see them
pub trait TokenCounter: Send {
    fn count(&self, text: &str) -> Result<usize>;
}

/// Which counter a grouping pass should acquire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizerSpec {
    /// Roughly four characters per token
    Estimate,
    /// A Hugging Face `tokenizer.json`
    File(PathBuf),
}

impl TokenizerSpec {
    pub fn from_config(tokenizer_file: Option<&Path>) -> Self {
        match tokenizer_file {
            Some(path) => Self::File(path.to_path_buf()),
            None => Self::Estimate,
        }
    }

    /// Build a fresh counter. The caller owns it and releases it by dropping.
    pub fn acquire(&self) -> Result<Box<dyn TokenCounter>> {
        match self {
            Self::Estimate => Ok(Box::new(EstimateCounter)),
            Self::File(path) => Ok(Box::new(HuggingFaceCounter::from_file(path)?)),
        }
    }
}

pub struct EstimateCounter;

impl TokenCounter for EstimateCounter {
    fn count(&self, text: &str) -> Result<usize> {
        Ok(text.chars().count().div_ceil(4))
    }
}

pub struct HuggingFaceCounter {
    tokenizer: tokenizers::Tokenizer,
}

impl HuggingFaceCounter {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SubtitleError::FileNotFound(path.display().to_string()));
        }

        debug!("Loading tokenizer from {}", path.display());
        let tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| SubtitleError::Tokenizer(format!("Failed to load {}: {}", path.display(), e)))?;
        Ok(Self { tokenizer })
    }
}

impl TokenCounter for HuggingFaceCounter {
    fn count(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| SubtitleError::Tokenizer(e.to_string()))?;
        Ok(encoding.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_counter() {
        let counter = EstimateCounter;
        assert_eq!(counter.count("").unwrap(), 0);
        assert_eq!(counter.count("hi").unwrap(), 1);
        assert_eq!(counter.count("hello").unwrap(), 2);
        assert_eq!(counter.count("hello world test").unwrap(), 4);
    }

    #[test]
    fn test_estimate_counts_characters_not_bytes() {
        assert_eq!(EstimateCounter.count("日本語です").unwrap(), 2);
    }

    /// Word-level `tokenizer.json` splitting on whitespace and punctuation
    fn write_word_level_tokenizer(dir: &Path) -> PathBuf {
        let path = dir.join("tokenizer.json");
        let tokenizer = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": { "[UNK]": 0, "hello": 1, "world": 2, "again": 3 },
                "unk_token": "[UNK]"
            }
        });
        std::fs::write(&path, tokenizer.to_string()).unwrap();
        path
    }

    #[test]
    fn test_tokenizer_file_counts_model_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let spec = TokenizerSpec::File(write_word_level_tokenizer(dir.path()));
        let counter = spec.acquire().unwrap();

        assert_eq!(counter.count("").unwrap(), 0);
        assert_eq!(counter.count("hello").unwrap(), 1);
        assert_eq!(counter.count("hello world again").unwrap(), 3);
        // punctuation and unknown words are tokens of their own
        assert_eq!(counter.count("hello, stranger!").unwrap(), 4);
    }

    #[test]
    fn test_grouper_with_tokenizer_file() {
        use crate::grouping::Grouper;
        use crate::subtitle::Segment;

        let dir = tempfile::tempdir().unwrap();
        let grouper = Grouper::new(4, TokenizerSpec::File(write_word_level_tokenizer(dir.path())));
        let segments: Vec<Segment> = ["hello world", "again", "hello world again"]
            .iter()
            .enumerate()
            .map(|(i, text)| Segment {
                id: Some(i as u32 + 1),
                timestamp: "00:00:01,000 --> 00:00:02,000".to_string(),
                text: text.to_string(),
            })
            .collect();

        // "again" fits at 3 + 1 <= 4; the last cue does not at 5 + 3
        let groups = grouper.group(&segments).unwrap();
        let sizes: Vec<usize> = groups.iter().map(|g| g.segments.len()).collect();
        assert_eq!(sizes, vec![2, 1]);
        assert_eq!(groups[0].tokens, 2 + 1 + 1 + 1);
    }

    #[test]
    fn test_corrupt_tokenizer_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, "{ not a tokenizer").unwrap();

        let spec = TokenizerSpec::File(path);
        assert!(matches!(spec.acquire(), Err(SubtitleError::Tokenizer(_))));
    }

    #[test]
    fn test_missing_tokenizer_file() {
        let spec = TokenizerSpec::from_config(Some(Path::new("/nonexistent/tokenizer.json")));
        assert!(matches!(spec.acquire(), Err(SubtitleError::FileNotFound(_))));
    }
}
