use crate::traits::{
    check_manifest_order, ByteStream, ObjectBody, Storage, StorageError, StorageResult,
};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use filegate_core::models::{
    ByteRange, GetOptions, ObjectList, ObjectMetadata, RangeSpec, UploadedPart,
};
use futures::{StreamExt, TryStreamExt};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::multipart::{MultipartStore, PartId};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    GetRange, ObjectMeta, ObjectStore, ObjectStoreExt, PutMode, PutOptions, PutPayload,
};

/// S3 part numbers run from 1 to 10000
const MAX_S3_PART_NUMBER: u32 = 10_000;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage { store, bucket })
    }

    /// object_store addresses parts by zero-based index
    fn part_index(part_number: u32) -> StorageResult<usize> {
        if part_number == 0 || part_number > MAX_S3_PART_NUMBER {
            return Err(StorageError::InvalidPart(format!(
                "Part number {} is outside 1..={}",
                part_number, MAX_S3_PART_NUMBER
            )));
        }
        Ok((part_number - 1) as usize)
    }

    /// Parts are completed positionally, so the manifest must be exactly 1..=n
    fn manifest_part_ids(parts: &[UploadedPart]) -> StorageResult<Vec<PartId>> {
        check_manifest_order(parts)?;
        parts
            .iter()
            .enumerate()
            .map(|(position, part)| {
                let index = Self::part_index(part.part_number)?;
                if index != position {
                    return Err(StorageError::InvalidPart(format!(
                        "Part {} is missing from the manifest",
                        position + 1
                    )));
                }
                Ok(PartId {
                    content_id: part.etag.clone(),
                })
            })
            .collect()
    }

    fn to_metadata(meta: &ObjectMeta) -> ObjectMetadata {
        let etag = meta
            .e_tag
            .as_deref()
            .unwrap_or_default()
            .trim_matches('"')
            .to_string();
        let mut metadata = ObjectMetadata::new(meta.location.to_string(), meta.size, etag);
        metadata.uploaded = meta.last_modified;
        metadata.version = meta.version.clone().unwrap_or_default();
        metadata
    }

    fn to_get_range(spec: RangeSpec) -> GetRange {
        match spec {
            RangeSpec::Bounded { start, end } => GetRange::Bounded(start..end.saturating_add(1)),
            RangeSpec::From { start } => GetRange::Offset(start),
            RangeSpec::Suffix { length } => GetRange::Suffix(length),
        }
    }

    fn session_error(upload_id: &str, e: ObjectStoreError) -> StorageError {
        match e {
            ObjectStoreError::NotFound { .. } => StorageError::NoSuchUpload(upload_id.to_string()),
            other => StorageError::BackendError(other.to_string()),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<ObjectMetadata> {
        let size = data.len() as u64;
        let location = Path::from(key);
        let start = std::time::Instant::now();

        let result = self
            .store
            .put_opts(
                &location,
                PutPayload::from(data),
                PutOptions::from(PutMode::Create),
            )
            .await
            .map_err(|e| {
                if let ObjectStoreError::AlreadyExists { .. } = e {
                    return StorageError::AlreadyExists(key.to_string());
                }
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        let etag = result.e_tag.unwrap_or_default().trim_matches('"').to_string();
        let mut metadata = ObjectMetadata::new(key, size, etag);
        metadata.version = result.version.unwrap_or_default();
        Ok(metadata)
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMetadata>> {
        let location = Path::from(key);
        match self.store.head(&location).await {
            Ok(meta) => Ok(Some(Self::to_metadata(&meta))),
            Err(ObjectStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn get(&self, key: &str, options: &GetOptions) -> StorageResult<Option<ObjectBody>> {
        let start = std::time::Instant::now();
        let location = Path::from(key);

        let request = object_store::GetOptions {
            if_match: options.only_if_etag.clone(),
            range: options.range.map(Self::to_get_range),
            ..Default::default()
        };

        let result = match self.store.get_opts(&location, request).await {
            Ok(result) => result,
            Err(ObjectStoreError::NotFound { .. }) => return Ok(None),
            Err(ObjectStoreError::Precondition { .. }) => {
                return Err(StorageError::PreconditionFailed(format!(
                    "etag of {} does not match",
                    key
                )))
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                return Err(StorageError::DownloadFailed(e.to_string()));
            }
        };

        let mut metadata = Self::to_metadata(&result.meta);
        if options.range.is_some() {
            metadata.range = Some(ByteRange {
                offset: result.range.start,
                length: result.range.end - result.range.start,
            });
        }

        let bucket = self.bucket.clone();
        let object_key = key.to_string();
        let body: ByteStream = Box::pin(result.into_stream().map(move |chunk| {
            chunk.map_err(|e| {
                tracing::error!(bucket = %bucket, key = %object_key, error = %e, "S3 stream download error");
                StorageError::DownloadFailed(e.to_string())
            })
        }));

        Ok(Some(ObjectBody { metadata, body }))
    }

    async fn list(&self, limit: usize, cursor: Option<&str>) -> StorageResult<ObjectList> {
        let stream = match cursor {
            Some(cursor) => self.store.list_with_offset(None, &Path::from(cursor)),
            None => self.store.list(None),
        };

        let mut objects: Vec<ObjectMetadata> = stream
            .take(limit + 1)
            .map_ok(|meta| Self::to_metadata(&meta))
            .try_collect()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let truncated = objects.len() > limit;
        objects.truncate(limit);
        let cursor = if truncated {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ObjectList {
            objects,
            truncated,
            cursor,
        })
    }

    async fn create_multipart_upload(&self, key: &str) -> StorageResult<String> {
        let location = Path::from(key);
        let upload_id = self
            .store
            .create_multipart(&location)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        tracing::info!(bucket = %self.bucket, key = %key, upload_id = %upload_id, "S3 multipart upload created");
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> StorageResult<UploadedPart> {
        let index = Self::part_index(part_number)?;
        let location = Path::from(key);
        let size = data.len();

        let part = self
            .store
            .put_part(&location, &upload_id.to_string(), index, PutPayload::from(data))
            .await
            .map_err(|e| Self::session_error(upload_id, e))?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            upload_id = %upload_id,
            part_number,
            size_bytes = size,
            "S3 multipart part stored"
        );

        Ok(UploadedPart::new(part_number, part.content_id))
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> StorageResult<ObjectMetadata> {
        let part_ids = Self::manifest_part_ids(parts)?;
        let location = Path::from(key);
        let start = std::time::Instant::now();

        // MultipartStore completes unconditionally, so existing objects are checked here.
        if self.head(key).await?.is_some() {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }

        self.store
            .complete_multipart(&location, &upload_id.to_string(), part_ids)
            .await
            .map_err(|e| Self::session_error(upload_id, e))?;

        let metadata = self.head(key).await?.ok_or_else(|| {
            StorageError::NotFound(format!("{} missing after multipart completion", key))
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            upload_id = %upload_id,
            part_count = parts.len(),
            size_bytes = metadata.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload completed"
        );

        Ok(metadata)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Path::from(key);

        match self.store.delete(&location).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        let location = Path::from(key);
        match self
            .store
            .abort_multipart(&location, &upload_id.to_string())
            .await
        {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {
                tracing::info!(bucket = %self.bucket, key = %key, upload_id = %upload_id, "S3 multipart upload aborted");
                Ok(())
            }
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_index_bounds() {
        assert_eq!(S3Storage::part_index(1).unwrap(), 0);
        assert_eq!(S3Storage::part_index(10_000).unwrap(), 9_999);
        assert!(S3Storage::part_index(0).is_err());
        assert!(S3Storage::part_index(10_001).is_err());
    }

    #[test]
    fn test_manifest_must_be_contiguous() {
        let parts = vec![UploadedPart::new(1, "a"), UploadedPart::new(2, "b")];
        let ids = S3Storage::manifest_part_ids(&parts).unwrap();
        assert_eq!(ids[1].content_id, "b");

        let gap = vec![UploadedPart::new(1, "a"), UploadedPart::new(3, "c")];
        assert!(matches!(
            S3Storage::manifest_part_ids(&gap),
            Err(StorageError::InvalidPart(_))
        ));
    }

    #[test]
    fn test_range_mapping() {
        assert_eq!(
            S3Storage::to_get_range(RangeSpec::Bounded { start: 0, end: 9 }),
            GetRange::Bounded(0..10)
        );
        assert_eq!(
            S3Storage::to_get_range(RangeSpec::Suffix { length: 4 }),
            GetRange::Suffix(4)
        );
    }
}
