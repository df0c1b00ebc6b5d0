//! Upload coordination.
//!
//! The storage backend owns the session (upload id, accepted parts, assembly). This
//! service validates client input, drives the backend and writes the access record
//! once the object exists. A key that already has an access record is never written
//! again, whichever principal asks.

use crate::error::storage_to_app_error;
use bytes::Bytes;
use filegate_core::models::{
    sort_manifest, validate_part_number, FileAccessRecord, MultipartUploadResponse,
    ObjectMetadata, Principal, UploadedPart, Visibility,
};
use filegate_core::AppError;
use filegate_db::AccessControlStore;
use filegate_storage::Storage;
use std::sync::Arc;

#[derive(Clone)]
pub struct MultipartUploadCoordinator {
    storage: Arc<dyn Storage>,
    access: AccessControlStore,
}

impl MultipartUploadCoordinator {
    pub fn new(storage: Arc<dyn Storage>, access: AccessControlStore) -> Self {
        Self { storage, access }
    }

    /// Store a small object in one request, then record `principal` as its owner.
    #[tracing::instrument(skip(self, principal, data), fields(operation = "direct_put", size_bytes = data.len()))]
    pub async fn put_object(
        &self,
        key: &str,
        principal: &Principal,
        visibility: Visibility,
        data: Bytes,
    ) -> Result<ObjectMetadata, AppError> {
        if data.is_empty() {
            return Err(AppError::Validation("File content is required".to_string()));
        }
        self.ensure_unclaimed(key, principal).await?;

        let metadata = self
            .storage
            .put(key, data)
            .await
            .map_err(storage_to_app_error)?;
        self.claim(key, principal, visibility, metadata).await
    }

    /// Open a session. No access record is written until completion.
    #[tracing::instrument(skip(self, principal), fields(operation = "multipart_start"))]
    pub async fn start(
        &self,
        key: &str,
        principal: &Principal,
        visibility: Visibility,
    ) -> Result<MultipartUploadResponse, AppError> {
        if key.is_empty() {
            return Err(AppError::Validation("Key is required".to_string()));
        }
        self.ensure_unclaimed(key, principal).await?;

        let upload_id = self
            .storage
            .create_multipart_upload(key)
            .await
            .map_err(storage_to_app_error)?;

        Ok(MultipartUploadResponse {
            key: key.to_string(),
            upload_id,
        })
    }

    #[tracing::instrument(skip(self, content), fields(operation = "multipart_part", size_bytes = content.len()))]
    pub async fn accept_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i64,
        content: Bytes,
    ) -> Result<UploadedPart, AppError> {
        require_session(key, upload_id)?;
        let part_number = validate_part_number(part_number).map_err(AppError::Validation)?;
        if content.is_empty() {
            return Err(AppError::Validation("Part content is required".to_string()));
        }

        self.storage
            .upload_part(key, upload_id, part_number, content)
            .await
            .map_err(storage_to_app_error)
    }

    /// Assemble the object, then record who owns it.
    ///
    /// The key is checked again here since another upload may have claimed it
    /// after this session started. If the record cannot be written the assembled
    /// object is removed again.
    #[tracing::instrument(skip(self, principal, parts), fields(operation = "multipart_complete", part_count = parts.len()))]
    pub async fn complete(
        &self,
        key: &str,
        upload_id: &str,
        principal: &Principal,
        visibility: Visibility,
        mut parts: Vec<UploadedPart>,
    ) -> Result<ObjectMetadata, AppError> {
        require_session(key, upload_id)?;
        for part in &parts {
            validate_part_number(i64::from(part.part_number)).map_err(AppError::Validation)?;
        }
        sort_manifest(&mut parts);
        self.ensure_unclaimed(key, principal).await?;

        let metadata = self
            .storage
            .complete_multipart_upload(key, upload_id, &parts)
            .await
            .map_err(storage_to_app_error)?;

        let metadata = self.claim(key, principal, visibility, metadata).await?;
        tracing::info!(key = %key, upload_id = %upload_id, size_bytes = metadata.size, "Multipart upload completed");
        Ok(metadata)
    }

    #[tracing::instrument(skip(self), fields(operation = "multipart_abort"))]
    pub async fn abort(&self, key: &str, upload_id: &str) -> Result<(), AppError> {
        require_session(key, upload_id)?;
        self.storage
            .abort_multipart_upload(key, upload_id)
            .await
            .map_err(storage_to_app_error)
    }

    async fn ensure_unclaimed(&self, key: &str, principal: &Principal) -> Result<(), AppError> {
        if self.access.access_decision(key, principal).await?.is_some() {
            return Err(AppError::AlreadyExists(format!(
                "File already exists: {}",
                key
            )));
        }
        Ok(())
    }

    /// Record `principal` as owner of a freshly written object.
    ///
    /// Backends write create-only, so on failure the object is ours to remove.
    /// A conflicting record means someone else owns the key and the object is left alone.
    async fn claim(
        &self,
        key: &str,
        principal: &Principal,
        visibility: Visibility,
        metadata: ObjectMetadata,
    ) -> Result<ObjectMetadata, AppError> {
        let record = FileAccessRecord::for_principal(key, principal, visibility);
        let failure = match self.access.record_access(&record).await {
            Ok(true) => return Ok(metadata),
            Err(AppError::AlreadyExists(msg)) => return Err(AppError::AlreadyExists(msg)),
            Ok(false) => "owner is not registered".to_string(),
            Err(e) => e.to_string(),
        };

        tracing::error!(key = %key, error = %failure, "Recording access failed, removing stored object");
        if let Err(e) = self.storage.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to remove object after access record failure");
        }
        Err(AppError::AccessRecordFailed(
            "Failed to record file access".to_string(),
        ))
    }
}

fn require_session(key: &str, upload_id: &str) -> Result<(), AppError> {
    if key.is_empty() || upload_id.is_empty() {
        return Err(AppError::Validation(
            "Key and upload id are required".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filegate_core::models::{GetOptions, PermissionLevel};
    use filegate_storage::LocalStorage;
    use tempfile::TempDir;

    fn alice() -> Principal {
        Principal::new("alice", "acme", PermissionLevel::Write)
    }

    async fn coordinator() -> (MultipartUploadCoordinator, AccessControlStore, Arc<dyn Storage>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        let access = AccessControlStore::in_memory();
        access.ensure_principal_registered(&alice()).await.unwrap();
        (
            MultipartUploadCoordinator::new(storage.clone(), access.clone()),
            access,
            storage,
            dir,
        )
    }

    #[tokio::test]
    async fn test_complete_records_access() {
        let (uploads, access, storage, _dir) = coordinator().await;

        let session = uploads.start("big.bin", &alice(), Visibility::Private).await.unwrap();
        assert!(!access.check_access("big.bin", &alice()).await.unwrap());

        let second = uploads
            .accept_part("big.bin", &session.upload_id, 2, Bytes::from_static(b"world"))
            .await
            .unwrap();
        let first = uploads
            .accept_part("big.bin", &session.upload_id, 1, Bytes::from_static(b"hello "))
            .await
            .unwrap();

        let metadata = uploads
            .complete("big.bin", &session.upload_id, &alice(), Visibility::Private, vec![second, first])
            .await
            .unwrap();
        assert_eq!(metadata.size, 11);
        assert!(access.check_access("big.bin", &alice()).await.unwrap());

        let body = storage
            .get("big.bin", &GetOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body.bytes().await.unwrap().as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn test_part_validation() {
        let (uploads, _, _, _dir) = coordinator().await;
        let session = uploads.start("a.bin", &alice(), Visibility::Public).await.unwrap();

        let empty = uploads
            .accept_part("a.bin", &session.upload_id, 1, Bytes::new())
            .await;
        assert!(matches!(empty, Err(AppError::Validation(_))));

        let too_high = uploads
            .accept_part("a.bin", &session.upload_id, 1_000_001, Bytes::from_static(b"x"))
            .await;
        assert!(matches!(too_high, Err(AppError::Validation(_))));

        let no_session = uploads.accept_part("a.bin", "", 1, Bytes::from_static(b"x")).await;
        assert!(matches!(no_session, Err(AppError::Validation(_))));

        assert!(matches!(
            uploads.start("", &alice(), Visibility::Public).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_part_fails_without_record() {
        let (uploads, access, _, _dir) = coordinator().await;
        let session = uploads.start("a.bin", &alice(), Visibility::Public).await.unwrap();
        let part = uploads
            .accept_part("a.bin", &session.upload_id, 1, Bytes::from_static(b"x"))
            .await
            .unwrap();

        let result = uploads
            .complete(
                "a.bin",
                &session.upload_id,
                &alice(),
                Visibility::Public,
                vec![part, UploadedPart::new(7, "forged")],
            )
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(access.access_decision("a.bin", &alice()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unregistered_owner_completion_is_rolled_back() {
        let (uploads, _, storage, _dir) = coordinator().await;
        let stranger = Principal::new("mallory", "acme", PermissionLevel::Write);

        let session = uploads.start("a.bin", &alice(), Visibility::Public).await.unwrap();
        let part = uploads
            .accept_part("a.bin", &session.upload_id, 1, Bytes::from_static(b"x"))
            .await
            .unwrap();

        let result = uploads
            .complete("a.bin", &session.upload_id, &stranger, Visibility::Public, vec![part])
            .await;
        assert!(matches!(result, Err(AppError::AccessRecordFailed(_))));
        assert!(storage.head("a.bin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_owned_key_cannot_be_completed_by_someone_else() {
        let (uploads, access, storage, _dir) = coordinator().await;
        let other = Principal::new("bob", "globex", PermissionLevel::Write);
        access.ensure_principal_registered(&other).await.unwrap();

        uploads
            .put_object("secret.txt", &alice(), Visibility::Private, Bytes::from_static(b"alice-data"))
            .await
            .unwrap();

        // a session opened before the key was claimed still cannot complete over it
        let session = storage.create_multipart_upload("secret.txt").await.unwrap();
        let part = uploads
            .accept_part("secret.txt", &session, 1, Bytes::from_static(b"bob-data"))
            .await
            .unwrap();
        let result = uploads
            .complete("secret.txt", &session, &other, Visibility::Public, vec![part])
            .await;
        assert!(matches!(result, Err(AppError::AlreadyExists(_))));

        let started = uploads.start("secret.txt", &other, Visibility::Public).await;
        assert!(matches!(started, Err(AppError::AlreadyExists(_))));

        let body = storage
            .get("secret.txt", &GetOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body.bytes().await.unwrap().as_ref(), b"alice-data");
        assert!(access.check_access("secret.txt", &alice()).await.unwrap());
        assert!(!access.check_access("secret.txt", &other).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_object_claims_key_once() {
        let (uploads, access, storage, _dir) = coordinator().await;
        let other = Principal::new("bob", "acme", PermissionLevel::Write);
        access.ensure_principal_registered(&other).await.unwrap();

        let first = alice();
        let (a, b) = tokio::join!(
            uploads.put_object("race.txt", &first, Visibility::Private, Bytes::from_static(b"from-alice")),
            uploads.put_object("race.txt", &other, Visibility::Private, Bytes::from_static(b"from-bob")),
        );
        let (winner, loser, content) = match (a, b) {
            (Ok(_), Err(AppError::AlreadyExists(_))) => (first, other, b"from-alice".as_slice()),
            (Err(AppError::AlreadyExists(_)), Ok(_)) => (other, first, b"from-bob".as_slice()),
            outcome => panic!("expected exactly one owner, got {:?}", outcome),
        };

        let body = storage
            .get("race.txt", &GetOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body.bytes().await.unwrap().as_ref(), content);
        assert!(access.check_access("race.txt", &winner).await.unwrap());
        assert!(!access.check_access("race.txt", &loser).await.unwrap());
    }

    #[tokio::test]
    async fn test_abort_discards_session() {
        let (uploads, _, _, _dir) = coordinator().await;
        let session = uploads.start("a.bin", &alice(), Visibility::Public).await.unwrap();
        uploads.abort("a.bin", &session.upload_id).await.unwrap();

        let result = uploads
            .accept_part("a.bin", &session.upload_id, 1, Bytes::from_static(b"x"))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
