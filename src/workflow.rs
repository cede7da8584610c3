use std::path::{Path, PathBuf};

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, SubtitleError};
use crate::grouping::Group;
use crate::job::{FileJobStore, JobRecord, JobStore, PaymentGate, ReferenceGate};
use crate::pipeline::{ChunkStream, Pipeline};

/// Outcome of translating a directory
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub translated: usize,
    pub failed: usize,
}

pub struct Workflow {
    pipeline: Pipeline,
    store: Box<dyn JobStore>,
    gate: Box<dyn PaymentGate>,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        let pipeline = Pipeline::from_config(&config)?;
        let store = FileJobStore::new(&config.jobs.dir);

        Ok(Self::with_parts(pipeline, Box::new(store), Box::new(ReferenceGate)))
    }

    pub fn with_parts(
        pipeline: Pipeline,
        store: Box<dyn JobStore>,
        gate: Box<dyn PaymentGate>,
    ) -> Self {
        Self {
            pipeline,
            store,
            gate,
        }
    }

    /// Translate one subtitle file, streaming to `output_path` or stdout.
    /// Returns the number of cues written.
    pub async fn translate_file<P: AsRef<Path>>(
        &self,
        input_path: P,
        language: &str,
        output_path: Option<&Path>,
    ) -> Result<usize> {
        let input_path = input_path.as_ref();
        info!("Translating {} to {}", input_path.display(), language);

        let content = read_subtitles(input_path).await?;
        self.translate_content(&content, language, output_path).await
    }

    /// Translate every `.srt` file below `input_dir`.
    /// A failing file is logged and counted; the rest still run.
    pub async fn translate_directory<P: AsRef<Path>>(
        &self,
        input_dir: P,
        language: &str,
        output_dir: Option<&Path>,
    ) -> Result<BatchSummary> {
        let input_dir = input_dir.as_ref();
        info!("Processing directory: {}", input_dir.display());

        if !input_dir.is_dir() {
            return Err(SubtitleError::Config("Input path is not a directory".to_string()));
        }

        let output_dir = output_dir.unwrap_or(input_dir).to_path_buf();
        fs::create_dir_all(&output_dir).await?;

        let suffix = format!("_{}", language_tag(language));
        let mut subtitle_files = Vec::new();
        for entry in WalkDir::new(input_dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_srt = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("srt"));
            let already_translated = path
                .file_stem()
                .is_some_and(|stem| stem.to_string_lossy().ends_with(&suffix));

            if entry.file_type().is_file() && is_srt && !already_translated {
                subtitle_files.push(path.to_path_buf());
            }
        }
        subtitle_files.sort();

        info!("Found {} subtitle files to translate", subtitle_files.len());

        let mut summary = BatchSummary::default();
        for input_path in subtitle_files {
            let output_path = translated_path(&input_path, &output_dir, language)?;
            match self.translate_file(&input_path, language, Some(&output_path)).await {
                Ok(count) => {
                    info!("Translated {} cues: {}", count, output_path.display());
                    summary.translated += 1;
                }
                Err(e) => {
                    warn!("Failed to translate {}: {}", input_path.display(), e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Parse and group a file without translating it
    pub async fn plan_file<P: AsRef<Path>>(&self, input_path: P) -> Result<Vec<Group>> {
        let content = read_subtitles(input_path.as_ref()).await?;
        self.pipeline.plan(&content)
    }

    pub async fn create_job<P: AsRef<Path>>(
        &self,
        input_path: P,
        language: &str,
        payment_reference: &str,
    ) -> Result<JobRecord> {
        let content = read_subtitles(input_path.as_ref()).await?;
        // Reject unparseable content before anyone pays for it
        self.pipeline.plan(&content)?;

        let job = JobRecord::new(content, language, payment_reference);
        self.store.put(&job).await?;
        Ok(job)
    }

    pub async fn load_job(&self, id: Uuid) -> Result<JobRecord> {
        self.store.get(id).await
    }

    /// Run a stored job once its payment clears
    pub async fn run_job(&self, id: Uuid, output_path: Option<&Path>) -> Result<usize> {
        let job = self.store.get(id).await?;
        self.gate.authorize(&job).await?;

        info!("Running job {} ({})", job.id, job.language);
        self.translate_content(&job.content, &job.language, output_path).await
    }

    async fn translate_content(
        &self,
        content: &str,
        language: &str,
        output_path: Option<&Path>,
    ) -> Result<usize> {
        let groups = self.pipeline.plan(content)?;
        let total: usize = groups.iter().map(|g| g.segments.len()).sum();
        let chunks = self.pipeline.translate_groups(groups, language);

        match output_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).await?;
                }
                let file = fs::File::create(path).await?;

                let pb = ProgressBar::new(total as u64);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cues")
                        .map_err(|e| SubtitleError::Config(format!("Invalid progress template: {}", e)))?
                        .progress_chars("#>-"),
                );

                let result = write_chunks(chunks, file, Some(&pb)).await;
                match &result {
                    Ok(_) => pb.finish(),
                    Err(_) => pb.abandon(),
                }
                result
            }
            None => write_chunks(chunks, tokio::io::stdout(), None).await,
        }
    }
}

/// Write chunks as they arrive. Chunks written before an error stay written.
pub async fn write_chunks<W>(
    mut chunks: ChunkStream,
    mut writer: W,
    progress: Option<&ProgressBar>,
) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                writer.flush().await?;
                return Err(e);
            }
        };

        writer.write_all(chunk.to_srt().as_bytes()).await?;
        writer.flush().await?;
        written += 1;
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    writer.flush().await?;
    Ok(written)
}

async fn read_subtitles(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(SubtitleError::FileNotFound(path.display().to_string()));
    }
    Ok(fs::read_to_string(path).await?)
}

/// `<output_dir>/<stem>_<language>.srt`
fn translated_path(input_path: &Path, output_dir: &Path, language: &str) -> Result<PathBuf> {
    let stem = input_path
        .file_stem()
        .ok_or_else(|| SubtitleError::Config("Invalid subtitle filename".to_string()))?
        .to_string_lossy();
    Ok(output_dir.join(format!("{}_{}.srt", stem, language_tag(language))))
}

fn language_tag(language: &str) -> String {
    language.trim().replace(char::is_whitespace, "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendApi;
    use crate::grouping::Grouper;
    use crate::job::MockPaymentGate;
    use crate::tokenizer::TokenizerSpec;
    use crate::translate::{EventSource, TranslationBackend};
    use assert_fs::prelude::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Upper-cases the prompt; fails on prompts containing "boom"
    #[derive(Default)]
    struct ShoutingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranslationBackend for ShoutingBackend {
        async fn translate(&self, text: &str, _language: &str) -> Result<EventSource> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("boom") {
                return Err(SubtitleError::TranslationFailed("Backend returned 500".to_string()));
            }
            let body = format!(
                "data: {}\n\ndata: [DONE]\n\n",
                serde_json::json!({ "choices": [{ "delta": { "content": text.to_uppercase() } }] })
            );
            Ok(EventSource::new(
                BackendApi::Chat,
                futures::stream::iter(vec![Ok(Bytes::from(body))]),
            ))
        }
    }

    fn workflow(backend: Arc<ShoutingBackend>, jobs_dir: &Path, gate: Box<dyn PaymentGate>) -> Workflow {
        let pipeline = Pipeline::new(backend, Grouper::new(700, TokenizerSpec::Estimate), '|');
        Workflow::with_parts(pipeline, Box::new(FileJobStore::new(jobs_dir)), gate)
    }

    const SRT: &str = "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n2\n00:00:02,000 --> 00:00:03,000\nWorld\n";

    #[tokio::test]
    async fn test_translate_file_writes_output() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("movie.srt");
        input.write_str(SRT).unwrap();
        let output = temp.child("out/movie_fr.srt");

        let backend = Arc::new(ShoutingBackend::default());
        let wf = workflow(backend, temp.path(), Box::new(ReferenceGate));
        let count = wf.translate_file(input.path(), "French", Some(output.path())).await.unwrap();

        assert_eq!(count, 2);
        output.assert("1\n00:00:01,000 --> 00:00:02,000\nHELLO\n\n2\n00:00:02,000 --> 00:00:03,000\nWORLD\n\n");
    }

    #[tokio::test]
    async fn test_translate_missing_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let wf = workflow(Arc::new(ShoutingBackend::default()), temp.path(), Box::new(ReferenceGate));
        let result = wf.translate_file(temp.path().join("nope.srt"), "French", None).await;
        assert!(matches!(result, Err(SubtitleError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_directory_continues_past_failures() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.srt").write_str(SRT).unwrap();
        temp.child("nested/b.srt")
            .write_str("1\n00:00:01,000 --> 00:00:02,000\nboom\n")
            .unwrap();
        temp.child("notes.txt").write_str("not subtitles").unwrap();
        let out = temp.child("translated");

        let backend = Arc::new(ShoutingBackend::default());
        let wf = workflow(backend.clone(), temp.path(), Box::new(ReferenceGate));
        let summary = wf
            .translate_directory(temp.path(), "German", Some(out.path()))
            .await
            .unwrap();

        assert_eq!(summary, BatchSummary { translated: 1, failed: 1 });
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        out.child("a_German.srt").assert(
            "1\n00:00:01,000 --> 00:00:02,000\nHELLO\n\n2\n00:00:02,000 --> 00:00:03,000\nWORLD\n\n",
        );
        out.child("b_German.srt").assert("");
    }

    #[tokio::test]
    async fn test_job_round_trip_and_run() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("movie.srt").write_str(SRT).unwrap();
        let output = temp.child("job.srt");

        let mut gate = MockPaymentGate::new();
        gate.expect_authorize().times(1).returning(|_| Ok(()));

        let backend = Arc::new(ShoutingBackend::default());
        let wf = workflow(backend, &temp.path().join("jobs"), Box::new(gate));

        let job = wf
            .create_job(temp.child("movie.srt").path(), "Italian", "pay_1")
            .await
            .unwrap();
        assert_eq!(wf.load_job(job.id).await.unwrap().content, SRT);

        let count = wf.run_job(job.id, Some(output.path())).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_unpaid_job_never_reaches_backend() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("movie.srt").write_str(SRT).unwrap();

        let mut gate = MockPaymentGate::new();
        gate.expect_authorize()
            .returning(|job| Err(SubtitleError::PaymentRequired(job.id.to_string())));

        let backend = Arc::new(ShoutingBackend::default());
        let wf = workflow(backend.clone(), temp.path(), Box::new(gate));
        let job = wf.create_job(temp.child("movie.srt").path(), "Italian", "").await.unwrap();

        let result = wf.run_job(job.id, None).await;
        assert!(matches!(result, Err(SubtitleError::PaymentRequired(_))));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_chunks_keeps_output_before_error() {
        let backend = Arc::new(ShoutingBackend::default());
        let pipeline = Pipeline::new(backend, Grouper::new(2, TokenizerSpec::Estimate), '|');
        let source = "1\n00:00:01,000 --> 00:00:02,000\nok\n\n2\n00:00:02,000 --> 00:00:03,000\nboom";
        let chunks = pipeline.chunks(source, "French").unwrap();

        let mut out: Vec<u8> = Vec::new();
        let result = write_chunks(chunks, &mut out, None).await;

        assert!(matches!(result, Err(SubtitleError::TranslationFailed(_))));
        assert_eq!(String::from_utf8(out).unwrap(), "1\n00:00:01,000 --> 00:00:02,000\nOK\n\n");
    }

    #[test]
    fn test_translated_path() {
        let path = translated_path(Path::new("/in/show.s01e01.srt"), Path::new("/out"), "Brazilian Portuguese").unwrap();
        assert_eq!(path, PathBuf::from("/out/show.s01e01_Brazilian_Portuguese.srt"));
    }
}
