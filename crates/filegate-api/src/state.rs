//! Application state shared by every handler.

use crate::services::MultipartUploadCoordinator;
use filegate_db::{AccessControlStore, SignedUrlTokenStore};
use filegate_storage::Storage;
use std::sync::Arc;

/// Credential verification settings
#[derive(Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
}

/// Upload limits
#[derive(Clone, Copy)]
pub struct UploadConfig {
    pub max_upload_size_bytes: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub access: AccessControlStore,
    pub tokens: SignedUrlTokenStore,
    pub uploads: MultipartUploadCoordinator,
    pub security: SecurityConfig,
    pub upload: UploadConfig,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn Storage>,
        access: AccessControlStore,
        tokens: SignedUrlTokenStore,
        security: SecurityConfig,
        upload: UploadConfig,
    ) -> Self {
        let uploads = MultipartUploadCoordinator::new(storage.clone(), access.clone());
        Self {
            storage,
            access,
            tokens,
            uploads,
            security,
            upload,
        }
    }
}
