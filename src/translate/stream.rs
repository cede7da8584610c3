use std::pin::Pin;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::config::BackendApi;
use crate::error::{Result, SubtitleError};
use super::EventSource;

const DONE_SENTINEL: &str = "[DONE]";

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Incremental server-sent event framing.
///
/// Bytes may arrive split anywhere, including inside a multi-byte character;
/// only complete lines are decoded.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the data of every event they complete
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.pending.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = decode_line(&line[..line.len() - 1])?;
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Flush whatever the stream ended with
    pub fn finish(&mut self) -> Result<Vec<String>> {
        let mut events = Vec::new();
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let line = decode_line(&rest)?;
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        Ok(events)
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        if field == "data" {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let event = self.data.join("\n");
        self.data.clear();
        Some(event)
    }
}

fn decode_line(raw: &[u8]) -> Result<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8(raw.to_vec())
        .map_err(|e| SubtitleError::StreamCorrupted(format!("Invalid UTF-8 in event stream: {}", e)))
}

/// Splits accumulated model output on the delimiter.
///
/// Everything before the last delimiter is complete; the tail stays buffered
/// because later deltas may extend it.
#[derive(Debug)]
pub struct Reassembler {
    delimiter: char,
    buffer: String,
}

impl Reassembler {
    pub fn new(delimiter: char) -> Self {
        Self {
            delimiter,
            buffer: String::new(),
        }
    }

    /// Append a delta and take every fragment it completes
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);
        if !self.buffer.contains(self.delimiter) {
            return Vec::new();
        }

        let mut fragments: Vec<String> = self.buffer.split(self.delimiter).map(String::from).collect();
        self.buffer = fragments.pop().unwrap_or_default();
        fragments
    }

    /// The final fragment has no trailing delimiter. Whitespace left after a
    /// trailing delimiter is not a fragment.
    pub fn finish(self) -> Option<String> {
        if self.buffer.trim().is_empty() {
            None
        } else {
            Some(self.buffer)
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamFrame {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<ChoiceDelta>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum StreamEvent {
    Delta(String),
    Empty,
    Done,
}

fn parse_event(api: BackendApi, data: &str) -> Result<StreamEvent> {
    if data.trim() == DONE_SENTINEL {
        return Ok(StreamEvent::Done);
    }

    let frame: StreamFrame = serde_json::from_str(data).map_err(|e| {
        SubtitleError::StreamCorrupted(format!("Unexpected event payload ({}): {}", e, data))
    })?;

    let Some(choice) = frame.choices.into_iter().next() else {
        return Ok(StreamEvent::Empty);
    };

    let text = match api {
        BackendApi::Chat => choice.delta.and_then(|delta| delta.content),
        BackendApi::Completion => choice.text,
    };

    Ok(match text {
        Some(text) if !text.is_empty() => StreamEvent::Delta(text),
        _ => StreamEvent::Empty,
    })
}

/// Turn a backend response into translated fragments, in arrival order.
///
/// The stream ends at the done sentinel or when the body ends. A malformed
/// frame yields one `StreamCorrupted` error and nothing after it.
pub fn reassemble(source: EventSource, delimiter: char) -> FragmentStream {
    Box::pin(fragments(source, delimiter))
}

fn fragments(source: EventSource, delimiter: char) -> impl Stream<Item = Result<String>> + Send {
    let EventSource { api, mut frames } = source;

    try_stream! {
        let mut decoder = SseDecoder::new();
        let mut reassembler = Reassembler::new(delimiter);
        let mut emitted = 0usize;

        'frames: loop {
            let (events, ended) = match frames.next().await {
                Some(bytes) => {
                    let bytes = bytes.map_err(|e| {
                        SubtitleError::StreamCorrupted(format!("Failed to read response stream: {}", e))
                    })?;
                    (decoder.feed(&bytes)?, false)
                }
                None => (decoder.finish()?, true),
            };

            for data in events {
                match parse_event(api, &data)? {
                    StreamEvent::Done => {
                        trace!("Received done sentinel");
                        break 'frames;
                    }
                    StreamEvent::Delta(text) => {
                        for fragment in reassembler.push(&text) {
                            emitted += 1;
                            yield fragment;
                        }
                    }
                    StreamEvent::Empty => {}
                }
            }

            if ended {
                break;
            }
        }

        if let Some(rest) = reassembler.finish() {
            emitted += 1;
            yield rest;
        }
        debug!("Reassembled {} fragments", emitted);
    }
}
