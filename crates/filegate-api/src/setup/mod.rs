//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;

use crate::state::{AppState, SecurityConfig, UploadConfig};
use anyhow::Result;
use filegate_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry(config.log_json())?;

    tracing::info!("Configuration loaded and validated successfully");

    let storage = storage::setup_storage(&config).await?;
    let (access, tokens) = database::setup_stores(&config).await?;

    let state = Arc::new(AppState::new(
        storage,
        access,
        tokens,
        SecurityConfig {
            jwt_secret: config.jwt_secret().to_string(),
        },
        UploadConfig {
            max_upload_size_bytes: config.max_upload_size_bytes(),
        },
    ));

    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
