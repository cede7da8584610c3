// Streaming translation against a completion backend
//
// - client: one HTTP request per group, retried while the backend rate-limits
// - stream: server-sent event framing and delimiter reassembly
//
// A backend hands back the response body untouched; turning it into
// translated fragments is the reassembler's job.

pub mod client;
pub mod stream;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

pub use client::HttpBackend;
pub use stream::{reassemble, FragmentStream, Reassembler, SseDecoder};
use crate::config::BackendApi;
use crate::error::Result;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Unconsumed incremental response of one translation request
pub struct EventSource {
    /// Wire shape, decides where the text delta lives in each frame
    pub api: BackendApi,
    pub frames: ByteStream,
}

impl EventSource {
    pub fn new<S>(api: BackendApi, frames: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            api,
            frames: Box::pin(frames),
        }
    }
}

/// Main trait for translation backends
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Request a translation of `text` (segment texts joined by the delimiter)
    /// into `language`, returning the response as soon as it starts streaming
    async fn translate(&self, text: &str, language: &str) -> Result<EventSource>;
}
