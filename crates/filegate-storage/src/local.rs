use crate::traits::{
    check_manifest_order, ByteStream, ObjectBody, Storage, StorageError, StorageResult,
};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use filegate_core::models::{GetOptions, ObjectList, ObjectMetadata, UploadedPart};
use futures::StreamExt;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use uuid::Uuid;

const OBJECTS_DIR: &str = "objects";
const META_DIR: &str = "meta";
const UPLOADS_DIR: &str = "uploads";
const SESSION_FILE: &str = "session.json";

/// Local filesystem storage implementation
///
/// Layout under `base_path`:
/// - `objects/{key}`: object content
/// - `meta/{key}.json`: object metadata
/// - `uploads/{upload_id}/`: open multipart sessions and their parts
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance rooted at `base_path`
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        for dir in [OBJECTS_DIR, META_DIR, UPLOADS_DIR] {
            let path = base_path.join(dir);
            fs::create_dir_all(&path).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }

        Ok(LocalStorage { base_path })
    }

    /// Reject keys that could resolve outside the storage directory
    fn validate_key(key: &str) -> StorageResult<()> {
        let bad_segment = key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
        if key.starts_with('/') || key.contains('\\') || key.contains('\0') || bad_segment {
            return Err(StorageError::InvalidKey(format!(
                "Storage key contains invalid characters: {}",
                key
            )));
        }
        Ok(())
    }

    fn object_path(&self, key: &str) -> StorageResult<PathBuf> {
        Self::validate_key(key)?;
        Ok(self.base_path.join(OBJECTS_DIR).join(key))
    }

    fn meta_path(&self, key: &str) -> StorageResult<PathBuf> {
        Self::validate_key(key)?;
        Ok(self.base_path.join(META_DIR).join(format!("{}.json", key)))
    }

    /// Upload ids are UUIDs, anything else names no session
    fn upload_dir(&self, upload_id: &str) -> StorageResult<PathBuf> {
        let id = Uuid::parse_str(upload_id)
            .map_err(|_| StorageError::NoSuchUpload(upload_id.to_string()))?;
        Ok(self.base_path.join(UPLOADS_DIR).join(id.to_string()))
    }

    /// Resolve an open session, checking it belongs to `key`
    async fn session_dir(&self, key: &str, upload_id: &str) -> StorageResult<PathBuf> {
        let dir = self.upload_dir(upload_id)?;
        let raw = match fs::read(dir.join(SESSION_FILE)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NoSuchUpload(upload_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let session: serde_json::Value = serde_json::from_slice(&raw)
            .map_err(|e| StorageError::BackendError(format!("Corrupt session file: {}", e)))?;
        if session["key"].as_str() != Some(key) {
            return Err(StorageError::NoSuchUpload(format!(
                "{} does not belong to {}",
                upload_id, key
            )));
        }
        Ok(dir)
    }

    fn etag_of(data: &[u8]) -> String {
        let digest = hex::encode(Sha256::digest(data));
        digest[..32].to_string()
    }

    /// Write through a temporary sibling so readers never see a partial file
    async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = Self::tmp_path(path);
        let mut file = fs::File::create(&tmp).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", tmp.display(), e))
        })?;
        file.write_all(data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", tmp.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Link a fully written temporary file into place. Linking fails when the
    /// target exists, so two writers racing for one key cannot both succeed.
    async fn publish(tmp: &Path, path: &Path, key: &str) -> StorageResult<()> {
        let linked = fs::hard_link(tmp, path).await;
        let _ = fs::remove_file(tmp).await;
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(key.to_string()))
            }
            Err(e) => Err(StorageError::UploadFailed(format!(
                "Failed to publish {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn remove_if_present(path: &Path) -> StorageResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".tmp-{}", Uuid::new_v4()));
        path.with_file_name(name)
    }

    async fn write_metadata(&self, metadata: &ObjectMetadata) -> StorageResult<()> {
        let path = self.meta_path(&metadata.key)?;
        let raw = serde_json::to_vec(metadata)
            .map_err(|e| StorageError::BackendError(format!("Failed to encode metadata: {}", e)))?;
        Self::write_atomic(&path, &raw).await
    }

    /// Metadata for objects written without a sidecar is rebuilt from the file itself
    async fn metadata_from_file(&self, key: &str, path: &Path) -> StorageResult<ObjectMetadata> {
        let data = fs::read(path).await?;
        let modified = fs::metadata(path).await?.modified()?;
        let mut metadata = ObjectMetadata::new(key, data.len() as u64, Self::etag_of(&data));
        metadata.uploaded = DateTime::<Utc>::from(modified);
        Ok(metadata)
    }

    /// All keys with metadata, unsorted
    async fn collect_keys(&self) -> StorageResult<Vec<String>> {
        let root = self.base_path.join(META_DIR);
        let mut keys = Vec::new();
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&root) else {
                    continue;
                };
                let relative = relative.to_string_lossy().replace('\\', "/");
                // skip in-flight temporary files
                if let Some(key) = relative.strip_suffix(".json") {
                    keys.push(key.to_string());
                }
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<ObjectMetadata> {
        let path = self.object_path(key)?;
        let start = std::time::Instant::now();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = Self::tmp_path(&path);
        let mut file = fs::File::create(&tmp).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", tmp.display(), e))
        })?;
        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", tmp.display(), e))
        })?;
        file.sync_all().await?;
        drop(file);
        Self::publish(&tmp, &path, key).await?;

        let metadata = ObjectMetadata::new(key, data.len() as u64, Self::etag_of(&data));
        self.write_metadata(&metadata).await?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(metadata)
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMetadata>> {
        let path = self.object_path(key)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        match fs::read(self.meta_path(key)?).await {
            Ok(raw) => {
                let metadata = serde_json::from_slice(&raw).map_err(|e| {
                    StorageError::BackendError(format!("Corrupt metadata for {}: {}", key, e))
                })?;
                Ok(Some(metadata))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Some(self.metadata_from_file(key, &path).await?))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &str, options: &GetOptions) -> StorageResult<Option<ObjectBody>> {
        let Some(mut metadata) = self.head(key).await? else {
            return Ok(None);
        };

        if let Some(expected) = &options.only_if_etag {
            let expected = expected.trim_matches('"');
            if expected != metadata.etag {
                return Err(StorageError::PreconditionFailed(format!(
                    "etag of {} does not match",
                    key
                )));
            }
        }

        let path = self.object_path(key)?;
        let mut file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let body: ByteStream = match options.range {
            Some(spec) => {
                let range = spec.resolve(metadata.size).ok_or_else(|| {
                    StorageError::InvalidRange(format!("{:?} of {} bytes", spec, metadata.size))
                })?;
                file.seek(std::io::SeekFrom::Start(range.offset)).await?;
                metadata.range = Some(range);
                let reader = tokio_util::io::ReaderStream::new(file.take(range.length));
                Box::pin(reader.map(|chunk| {
                    chunk.map_err(|e| {
                        StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
                    })
                }))
            }
            None => {
                let reader = tokio_util::io::ReaderStream::new(file);
                Box::pin(reader.map(|chunk| {
                    chunk.map_err(|e| {
                        StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
                    })
                }))
            }
        };

        tracing::debug!(key = %key, size_bytes = metadata.size, "Local storage read opened");

        Ok(Some(ObjectBody { metadata, body }))
    }

    async fn list(&self, limit: usize, cursor: Option<&str>) -> StorageResult<ObjectList> {
        let mut keys = self.collect_keys().await?;
        keys.sort();

        let mut page: Vec<String> = keys
            .into_iter()
            .filter(|key| cursor.map_or(true, |c| key.as_str() > c))
            .take(limit + 1)
            .collect();
        let truncated = page.len() > limit;
        page.truncate(limit);

        let mut objects = Vec::with_capacity(page.len());
        for key in &page {
            if let Some(metadata) = self.head(key).await? {
                objects.push(metadata);
            }
        }

        let cursor = if truncated { page.last().cloned() } else { None };
        Ok(ObjectList {
            objects,
            truncated,
            cursor,
        })
    }

    async fn create_multipart_upload(&self, key: &str) -> StorageResult<String> {
        Self::validate_key(key)?;
        let upload_id = Uuid::new_v4().to_string();
        let dir = self.upload_dir(&upload_id)?;

        let session = json!({ "key": key, "created": Utc::now() });
        Self::write_atomic(&dir.join(SESSION_FILE), session.to_string().as_bytes()).await?;

        tracing::info!(key = %key, upload_id = %upload_id, "Local multipart upload created");
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> StorageResult<UploadedPart> {
        let dir = self.session_dir(key, upload_id).await?;
        let etag = Self::etag_of(&data);

        Self::write_atomic(&dir.join(format!("{}.part", part_number)), &data).await?;
        Self::write_atomic(&dir.join(format!("{}.etag", part_number)), etag.as_bytes()).await?;

        tracing::debug!(
            key = %key,
            upload_id = %upload_id,
            part_number,
            size_bytes = data.len(),
            "Local multipart part stored"
        );

        Ok(UploadedPart::new(part_number, etag))
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> StorageResult<ObjectMetadata> {
        check_manifest_order(parts)?;
        let dir = self.session_dir(key, upload_id).await?;
        let start = std::time::Instant::now();

        let mut combined_etags = Vec::with_capacity(parts.len());
        for part in parts {
            let stored = match fs::read_to_string(dir.join(format!("{}.etag", part.part_number)))
                .await
            {
                Ok(etag) => etag,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StorageError::InvalidPart(format!(
                        "Part {} was not uploaded",
                        part.part_number
                    )))
                }
                Err(e) => return Err(e.into()),
            };
            if stored != part.etag.trim_matches('"') {
                return Err(StorageError::InvalidPart(format!(
                    "Etag mismatch for part {}",
                    part.part_number
                )));
            }
            combined_etags.push(stored);
        }

        let path = self.object_path(key)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = Self::tmp_path(&path);
        let mut out = fs::File::create(&tmp).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", tmp.display(), e))
        })?;
        let mut size = 0u64;
        for part in parts {
            let mut input = fs::File::open(dir.join(format!("{}.part", part.part_number))).await?;
            size += tokio::io::copy(&mut input, &mut out).await?;
        }
        out.sync_all().await?;
        drop(out);
        Self::publish(&tmp, &path, key).await?;

        let etag = format!(
            "{}-{}",
            Self::etag_of(combined_etags.concat().as_bytes()),
            parts.len()
        );
        let metadata = ObjectMetadata::new(key, size, etag);
        self.write_metadata(&metadata).await?;
        fs::remove_dir_all(&dir).await?;

        tracing::info!(
            key = %key,
            upload_id = %upload_id,
            part_count = parts.len(),
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local multipart upload completed"
        );

        Ok(metadata)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.object_path(key)?;
        Self::remove_if_present(&path).await?;
        Self::remove_if_present(&self.meta_path(key)?).await?;

        tracing::info!(key = %key, "Local storage delete successful");
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        let dir = self.upload_dir(upload_id)?;
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(());
        }
        let dir = self.session_dir(key, upload_id).await?;
        fs::remove_dir_all(&dir).await?;

        tracing::info!(key = %key, upload_id = %upload_id, "Local multipart upload aborted");
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
