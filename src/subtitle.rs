use tracing::{debug, warn};

use crate::error::{Result, SubtitleError};

/// One timed cue from the source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Sequence number as written in the source; `None` when it is not numeric
    pub id: Option<u32>,
    /// Raw `start --> end` line
    pub timestamp: String,
    /// Cue text with internal line breaks collapsed to single spaces
    pub text: String,
}

/// A translated cue ready to be written out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub start: String,
    pub end: String,
    pub text: String,
}

impl Segment {
    pub fn is_translatable(&self) -> bool {
        !self.text.is_empty()
    }
}

impl Chunk {
    /// Pair translated text with the timing of the segment it replaces
    pub fn new(index: usize, segment: &Segment, text: impl Into<String>) -> Self {
        let (start, end) = split_timestamp(&segment.timestamp);
        Self {
            index,
            start: start.to_string(),
            end: end.to_string(),
            text: text.into(),
        }
    }

    pub fn to_srt(&self) -> String {
        format!("{}\n{} --> {}\n{}\n\n", self.index, self.start, self.end, self.text)
    }
}

/// Parse one subtitle block (`id`, timestamp, text lines)
pub fn parse_segment(block: &str) -> Result<Segment> {
    let mut lines = block.lines();

    let (id_line, timestamp) = match (lines.next(), lines.next()) {
        (Some(id), Some(timestamp)) => (id, timestamp),
        _ => {
            return Err(SubtitleError::Parse(format!(
                "expected an id line and a timestamp line, got {:?}",
                block
            )));
        }
    };

    let text = lines
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(Segment {
        id: id_line.trim().parse().ok(),
        timestamp: timestamp.trim().to_string(),
        text,
    })
}

/// Parse a whole SRT document into segments in source order.
///
/// Blocks are separated by a blank line. Blocks whose id is not a number are
/// not real cues and are skipped; a block with fewer than two lines fails
/// the whole document.
pub fn parse_document(content: &str) -> Result<Vec<Segment>> {
    let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");

    let mut segments = Vec::new();
    for block in content.split("\n\n") {
        let block = block.trim_matches('\n');
        if block.trim().is_empty() {
            continue;
        }

        let segment = parse_segment(block)?;
        if segment.id.is_none() {
            warn!("Skipping subtitle block without a numeric id: {:?}", block.lines().next());
            continue;
        }
        segments.push(segment);
    }

    debug!("Parsed {} segments", segments.len());
    Ok(segments)
}

/// Split `start --> end` into its two sides
pub fn split_timestamp(timestamp: &str) -> (&str, &str) {
    match timestamp.split_once("-->") {
        Some((start, end)) => (start.trim(), end.trim()),
        None => (timestamp.trim(), ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segment_flattens_text() {
        let segment = parse_segment("3\n00:00:05,000 --> 00:00:07,500\nFirst line\nsecond line").unwrap();
        assert_eq!(segment.id, Some(3));
        assert_eq!(segment.timestamp, "00:00:05,000 --> 00:00:07,500");
        assert_eq!(segment.text, "First line second line");
    }

    #[test]
    fn test_parse_segment_soft_id() {
        let segment = parse_segment("abc\n00:00:01,000 --> 00:00:02,000\nHi").unwrap();
        assert_eq!(segment.id, None);
    }

    #[test]
    fn test_parse_segment_requires_two_lines() {
        assert!(matches!(parse_segment("1"), Err(SubtitleError::Parse(_))));
    }

    #[test]
    fn test_parse_segment_without_text() {
        let segment = parse_segment("7\n00:00:01,000 --> 00:00:02,000").unwrap();
        assert_eq!(segment.text, "");
        assert!(!segment.is_translatable());
    }

    #[test]
    fn test_parse_document_crlf_and_trailing_blank() {
        let content = "1\r\n00:00:01,000 --> 00:00:02,000\r\nHello\r\n\r\n2\r\n00:00:02,000 --> 00:00:03,000\r\nWorld\r\n\r\n";
        let segments = parse_document(content).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello");
        assert_eq!(segments[1].timestamp, "00:00:02,000 --> 00:00:03,000");
    }

    #[test]
    fn test_parse_document_skips_non_numeric_blocks() {
        let content = "\u{feff}NOTE\nsomething\n\n1\n00:00:01,000 --> 00:00:02,000\nHello";
        let segments = parse_document(content).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].id, Some(1));
    }

    #[test]
    fn test_parse_document_rejects_truncated_block() {
        let content = "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n2";
        assert!(matches!(parse_document(content), Err(SubtitleError::Parse(_))));
    }

    #[test]
    fn test_chunk_to_srt() {
        let segment = parse_segment("9\n00:00:01,000 --> 00:00:02,000\nHello").unwrap();
        let chunk = Chunk::new(1, &segment, "Bonjour");
        assert_eq!(chunk.start, "00:00:01,000");
        assert_eq!(chunk.end, "00:00:02,000");
        assert_eq!(chunk.to_srt(), "1\n00:00:01,000 --> 00:00:02,000\nBonjour\n\n");
    }

    #[test]
    fn test_split_timestamp_without_arrow() {
        assert_eq!(split_timestamp("00:00:01,000"), ("00:00:01,000", ""));
    }
}
