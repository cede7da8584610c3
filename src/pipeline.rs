use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, SubtitleError};
use crate::grouping::{Group, Grouper};
use crate::subtitle::{parse_document, Chunk};
use crate::translate::{reassemble, ByteStream, HttpBackend, TranslationBackend};

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk>> + Send>>;

/// Drives groups through the backend one at a time and re-attaches timing
#[derive(Clone)]
pub struct Pipeline {
    backend: Arc<dyn TranslationBackend>,
    grouper: Grouper,
    delimiter: char,
}

impl Pipeline {
    pub fn new(backend: Arc<dyn TranslationBackend>, grouper: Grouper, delimiter: char) -> Self {
        Self {
            backend,
            grouper,
            delimiter,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = HttpBackend::new(
            config.backend.clone(),
            config.retry.clone(),
            config.grouping.delimiter,
        )?;
        Ok(Self::new(
            Arc::new(backend),
            Grouper::from_config(&config.grouping),
            config.grouping.delimiter,
        ))
    }

    /// Parse and group without touching the network
    pub fn plan(&self, source: &str) -> Result<Vec<Group>> {
        let segments = parse_document(source)?;
        self.grouper.group(&segments)
    }

    /// Translated chunks for `source`. Parse and grouping errors are returned
    /// before any request is made.
    pub fn chunks(&self, source: &str, language: &str) -> Result<ChunkStream> {
        let groups = self.plan(source)?;
        Ok(self.translate_groups(groups, language))
    }

    /// Translated chunks for groups that were already planned
    pub fn translate_groups(&self, groups: Vec<Group>, language: &str) -> ChunkStream {
        Box::pin(translate_groups(
            self.backend.clone(),
            groups,
            language.to_string(),
            self.delimiter,
        ))
    }

    /// The reconstructed SRT file, produced incrementally
    pub fn run(&self, source: &str, language: &str) -> Result<ByteStream> {
        let chunks = self.chunks(source, language)?;
        Ok(Box::pin(chunks.map_ok(|chunk| Bytes::from(chunk.to_srt()))))
    }
}

fn translate_groups(
    backend: Arc<dyn TranslationBackend>,
    groups: Vec<Group>,
    language: String,
    delimiter: char,
) -> impl Stream<Item = Result<Chunk>> + Send {
    try_stream! {
        let total = groups.len();
        let mut index = 0usize;

        for (group_idx, group) in groups.into_iter().enumerate() {
            let group_number = group_idx + 1;
            let expected = group.translatable_count();
            let mut pending = group.segments.iter();

            info!(
                "Translating group {}/{} ({} segments, {} tokens)",
                group_number,
                total,
                group.segments.len(),
                group.tokens
            );

            if expected > 0 {
                let source = backend.translate(&group.prompt_text(delimiter), &language).await?;
                let mut fragments = reassemble(source, delimiter);
                let mut received = 0usize;

                while let Some(fragment) = fragments.next().await {
                    let fragment = fragment?;
                    received += 1;

                    // Cues without text were never sent; they keep their slot.
                    loop {
                        match pending.next() {
                            Some(segment) if !segment.is_translatable() => {
                                index += 1;
                                yield Chunk::new(index, segment, "");
                            }
                            Some(segment) => {
                                index += 1;
                                yield Chunk::new(index, segment, fragment.trim());
                                break;
                            }
                            None => {
                                Err::<(), _>(SubtitleError::SegmentCountMismatch {
                                    group: group_number,
                                    expected,
                                    actual: received,
                                })?;
                            }
                        }
                    }
                }

                if received != expected {
                    Err::<(), _>(SubtitleError::SegmentCountMismatch {
                        group: group_number,
                        expected,
                        actual: received,
                    })?;
                }
            } else {
                debug!("Group {} has no text to translate", group_number);
            }

            for segment in pending {
                index += 1;
                yield Chunk::new(index, segment, "");
            }
        }

        info!("Translated {} segments in {} groups", index, total);
    }
}
