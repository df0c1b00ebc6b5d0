//! Storage setup and initialization

use anyhow::Result;
use filegate_core::Config;
use filegate_storage::{create_storage, Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing object storage...");
    let storage = create_storage(config).await?;
    tracing::info!(
        backend = %storage.backend_type(),
        "Object storage initialized successfully"
    );
    Ok(storage)
}
