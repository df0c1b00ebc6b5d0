//! Test helpers: build AppState and router for integration tests.
//!
//! Everything runs in process: local storage in a temp dir and in-memory
//! access and token stores.

pub mod auth;

use axum_test::TestServer;
use filegate_api::setup::routes;
use filegate_api::state::{AppState, SecurityConfig, UploadConfig};
use filegate_db::{AccessControlStore, SignedUrlTokenStore};
use filegate_storage::{LocalStorage, Storage};
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";
pub const TEST_MAX_UPLOAD_BYTES: usize = 64 * 1024;

/// Test application: server, state, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Setup test app with isolated storage and stores.
pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(temp_dir.path())
            .await
            .expect("Failed to create local storage"),
    );

    let state = Arc::new(AppState::new(
        storage,
        AccessControlStore::in_memory(),
        SignedUrlTokenStore::in_memory(),
        SecurityConfig {
            jwt_secret: TEST_JWT_SECRET.to_string(),
        },
        UploadConfig {
            max_upload_size_bytes: TEST_MAX_UPLOAD_BYTES,
        },
    ));

    let app = routes::setup_routes(state.clone());
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}
