//! Chunked uploads.
//!
//! Payloads up to one part are sent with a single direct put. Larger payloads open a
//! multipart session, upload fixed-size parts with bounded concurrency and retry,
//! then complete the session with the manifest sorted by part number. If any part
//! fails for good, the remaining part tasks are cancelled and the session is aborted.

use async_trait::async_trait;
use bytes::Bytes;
use filegate_core::models::{
    sort_manifest, MultipartUploadResponse, ObjectMetadata, UploadedPart, Visibility,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_PART_SIZE: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_CONCURRENCY: usize = 6;

/// Result of one part upload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartOutcome {
    Uploaded(UploadedPart),
    /// Backend overloaded or unreachable; worth retrying
    Transient(String),
    /// Rejected for a reason retrying will not fix
    Permanent(String),
    /// The request itself was invalid
    ValidationFailure(String),
}

/// Gateway operations the orchestrator drives.
#[async_trait]
pub trait MultipartTarget: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        visibility: Visibility,
    ) -> anyhow::Result<ObjectMetadata>;

    async fn start(
        &self,
        key: &str,
        visibility: Visibility,
    ) -> anyhow::Result<MultipartUploadResponse>;

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> PartOutcome;

    async fn complete(
        &self,
        key: &str,
        upload_id: &str,
        visibility: Visibility,
        parts: &[UploadedPart],
    ) -> anyhow::Result<ObjectMetadata>;

    async fn abort(&self, key: &str, upload_id: &str) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Direct upload failed: {0}")]
    Put(#[source] anyhow::Error),

    #[error("Failed to start multipart upload: {0}")]
    Start(#[source] anyhow::Error),

    #[error("Part {part_number} failed after {attempts} attempt(s): {reason}")]
    Part {
        part_number: u32,
        attempts: u32,
        reason: String,
    },

    #[error("Part upload task failed: {0}")]
    Task(String),

    #[error("Failed to complete multipart upload: {0}")]
    Complete(#[source] anyhow::Error),
}

/// Exponential backoff between part attempts: `multiplier * 2^(n-1)` seconds after
/// the n-th failure, clamped to `[min_backoff, max_backoff]`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub multiplier: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: 1,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = Duration::from_secs(u64::from(self.multiplier) << exponent);
        delay.clamp(self.min_backoff, self.max_backoff)
    }
}

/// Drives a large upload through a [`MultipartTarget`].
pub struct ChunkedUploadOrchestrator {
    target: Arc<dyn MultipartTarget>,
    part_size: usize,
    max_concurrency: usize,
    retry: RetryPolicy,
}

impl ChunkedUploadOrchestrator {
    pub fn new(target: Arc<dyn MultipartTarget>) -> Self {
        Self {
            target,
            part_size: DEFAULT_PART_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn part_size(&self) -> usize {
        self.part_size
    }

    #[tracing::instrument(skip(self, data), fields(size_bytes = data.len()))]
    pub async fn upload(
        &self,
        key: &str,
        data: Bytes,
        visibility: Visibility,
    ) -> Result<ObjectMetadata, UploadError> {
        if data.len() <= self.part_size {
            return self
                .target
                .put_object(key, data, visibility)
                .await
                .map_err(UploadError::Put);
        }

        let session = self
            .target
            .start(key, visibility)
            .await
            .map_err(UploadError::Start)?;
        let upload_id = session.upload_id;
        tracing::info!(key = %key, upload_id = %upload_id, "Multipart upload started");

        let mut parts = match self.upload_parts(key, &upload_id, data).await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(key = %key, upload_id = %upload_id, error = %e, "Aborting multipart upload");
                if let Err(abort_err) = self.target.abort(key, &upload_id).await {
                    tracing::error!(
                        key = %key,
                        upload_id = %upload_id,
                        error = %abort_err,
                        "Failed to abort multipart upload"
                    );
                }
                return Err(e);
            }
        };

        sort_manifest(&mut parts);
        let metadata = self
            .target
            .complete(key, &upload_id, visibility, &parts)
            .await
            .map_err(UploadError::Complete)?;

        tracing::info!(
            key = %key,
            upload_id = %upload_id,
            part_count = parts.len(),
            size_bytes = metadata.size,
            "Multipart upload completed"
        );
        Ok(metadata)
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        data: Bytes,
    ) -> Result<Vec<UploadedPart>, UploadError> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        let mut offset = 0;
        let mut part_number = 1u32;
        while offset < data.len() {
            let end = (offset + self.part_size).min(data.len());
            let chunk = data.slice(offset..end);
            let target = self.target.clone();
            let semaphore = semaphore.clone();
            let retry = self.retry;
            let key = key.to_string();
            let upload_id = upload_id.to_string();

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| UploadError::Task(e.to_string()))?;
                upload_with_retry(target.as_ref(), &key, &upload_id, part_number, chunk, retry)
                    .await
            });

            offset = end;
            part_number += 1;
        }

        let mut parts = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .map_err(|e| UploadError::Task(e.to_string()))
                .and_then(|part| part);
            match result {
                Ok(part) => parts.push(part),
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        Ok(parts)
    }
}

async fn upload_with_retry(
    target: &dyn MultipartTarget,
    key: &str,
    upload_id: &str,
    part_number: u32,
    chunk: Bytes,
    retry: RetryPolicy,
) -> Result<UploadedPart, UploadError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match target
            .upload_part(key, upload_id, part_number, chunk.clone())
            .await
        {
            PartOutcome::Uploaded(part) => return Ok(part),
            PartOutcome::Transient(reason) if attempt < retry.max_attempts => {
                let delay = retry.backoff(attempt);
                tracing::warn!(
                    part_number,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    reason = %reason,
                    "Part upload failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            PartOutcome::Transient(reason)
            | PartOutcome::Permanent(reason)
            | PartOutcome::ValidationFailure(reason) => {
                return Err(UploadError::Part {
                    part_number,
                    attempts: attempt,
                    reason,
                })
            }
        }
    }
}
