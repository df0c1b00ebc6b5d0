//! Storage abstraction trait
//!
//! This module defines the Storage trait that all object storage backends implement.
//! The backend is the authority for multipart sessions: it mints upload ids, keeps
//! the accepted parts and assembles the final object.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use filegate_core::models::{GetOptions, ObjectList, ObjectMetadata, UploadedPart};
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("No such multipart upload: {0}")]
    NoSuchUpload(String),

    #[error("Invalid part: {0}")]
    InvalidPart(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Range not satisfiable: {0}")]
    InvalidRange(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Object content plus its metadata
pub struct ObjectBody {
    pub metadata: ObjectMetadata,
    pub body: ByteStream,
}

impl ObjectBody {
    /// Buffer the whole body.
    pub async fn bytes(self) -> StorageResult<Bytes> {
        use futures::TryStreamExt;

        let chunks: Vec<Bytes> = self.body.try_collect().await?;
        Ok(Bytes::from(chunks.concat()))
    }
}

/// Object storage abstraction trait
///
/// Keys are opaque, already sanitised object names. Backends must reject keys
/// that could escape their namespace.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `key`. Objects are never replaced: a key that already
    /// holds an object fails with `AlreadyExists`.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<ObjectMetadata>;

    /// Metadata of an object, `None` when absent.
    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMetadata>>;

    /// Read an object, optionally a byte range of it or conditionally on its etag.
    /// `None` when absent.
    async fn get(&self, key: &str, options: &GetOptions) -> StorageResult<Option<ObjectBody>>;

    /// List objects in key order, starting after `cursor`.
    async fn list(&self, limit: usize, cursor: Option<&str>) -> StorageResult<ObjectList>;

    /// Open a multipart session and return its upload id.
    async fn create_multipart_upload(&self, key: &str) -> StorageResult<String>;

    /// Store one part of an open session.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> StorageResult<UploadedPart>;

    /// Assemble the object from `parts`, which must be sorted ascending by part number
    /// and name only parts this session accepted. Like `put`, fails with
    /// `AlreadyExists` when `key` already holds an object; the session stays open.
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> StorageResult<ObjectMetadata>;

    /// Remove an object. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Discard an open session and its parts.
    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Check that a manifest is strictly ascending, which also rules out duplicates.
pub(crate) fn check_manifest_order(parts: &[UploadedPart]) -> StorageResult<()> {
    if parts.is_empty() {
        return Err(StorageError::InvalidPart(
            "Manifest must contain at least one part".to_string(),
        ));
    }
    for pair in parts.windows(2) {
        if pair[0].part_number >= pair[1].part_number {
            return Err(StorageError::InvalidPart(format!(
                "Manifest must be sorted by part number without duplicates (found {} before {})",
                pair[0].part_number, pair[1].part_number
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_order() {
        let sorted = vec![UploadedPart::new(1, "a"), UploadedPart::new(2, "b")];
        assert!(check_manifest_order(&sorted).is_ok());

        let unsorted = vec![UploadedPart::new(2, "b"), UploadedPart::new(1, "a")];
        assert!(matches!(
            check_manifest_order(&unsorted),
            Err(StorageError::InvalidPart(_))
        ));

        let duplicate = vec![UploadedPart::new(1, "a"), UploadedPart::new(1, "a")];
        assert!(check_manifest_order(&duplicate).is_err());
        assert!(check_manifest_order(&[]).is_err());
    }
}
