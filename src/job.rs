use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SubtitleError};

/// A paid translation request waiting to be run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    /// Original SRT content
    pub content: String,
    /// Target language name
    pub language: String,
    /// Opaque reference issued by the payment provider
    pub payment_reference: String,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(
        content: impl Into<String>,
        language: impl Into<String>,
        payment_reference: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            language: language.into(),
            payment_reference: payment_reference.into(),
            created_at: Utc::now(),
        }
    }
}

/// Persists job records by id
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn put(&self, job: &JobRecord) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<JobRecord>;
}

/// Must succeed before a job is allowed to run
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGate: Send + Sync {
    async fn authorize(&self, job: &JobRecord) -> Result<()>;
}

/// One JSON file per job under a directory
pub struct FileJobStore {
    dir: PathBuf,
}

impl FileJobStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn put(&self, job: &JobRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let content = serde_json::to_string_pretty(job)?;
        tokio::fs::write(self.path_for(job.id), content).await?;

        info!("Stored job {}", job.id);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<JobRecord> {
        let path = self.path_for(id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SubtitleError::JobNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        debug!("Loaded job {} from {}", id, path.display());
        Ok(serde_json::from_str(&content)?)
    }
}

/// Accepts any job that carries a payment reference.
///
/// Checkout happens elsewhere; a job only gets a reference once it is paid.
pub struct ReferenceGate;

#[async_trait]
impl PaymentGate for ReferenceGate {
    async fn authorize(&self, job: &JobRecord) -> Result<()> {
        if job.payment_reference.trim().is_empty() {
            warn!("Job {} has no payment reference", job.id);
            return Err(SubtitleError::PaymentRequired(job.id.to_string()));
        }
        Ok(())
    }
}
