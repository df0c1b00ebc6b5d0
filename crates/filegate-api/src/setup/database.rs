//! Metadata and token store setup

use anyhow::Result;
use filegate_core::{Config, StateBackend};
use filegate_db::{
    connect, run_migrations, AccessControlStore, InMemoryAccessRepository,
    InMemoryTokenKvStore, PgAccessRepository, PgTokenKvStore, SignedUrlTokenStore,
    TokenKvStore,
};
use std::sync::Arc;
use std::time::Duration;

const TOKEN_SWEEP_INTERVAL_SECS: u64 = 300;

/// Build the access-control and token stores for the configured backends.
///
/// A single pool is shared when both live in PostgreSQL.
pub async fn setup_stores(config: &Config) -> Result<(AccessControlStore, SignedUrlTokenStore)> {
    let needs_pool = config.metadata_backend() == StateBackend::Postgres
        || config.token_store_backend() == StateBackend::Postgres;

    let pool = if needs_pool {
        tracing::info!("Connecting to database...");
        let pool = connect(config).await?;
        run_migrations(&pool).await?;
        Some(pool)
    } else {
        None
    };

    let access = match (config.metadata_backend(), &pool) {
        (StateBackend::Postgres, Some(pool)) => {
            AccessControlStore::new(Arc::new(PgAccessRepository::new(pool.clone())))
        }
        _ => {
            tracing::warn!("Using in-memory access records; they are lost on restart");
            AccessControlStore::new(Arc::new(InMemoryAccessRepository::new()))
        }
    };

    let kv: Arc<dyn TokenKvStore> = match (config.token_store_backend(), &pool) {
        (StateBackend::Postgres, Some(pool)) => Arc::new(PgTokenKvStore::new(pool.clone())),
        _ => Arc::new(InMemoryTokenKvStore::new()),
    };
    let tokens = SignedUrlTokenStore::new(kv, config.signed_url_ttl_seconds());
    tokens.start_expiry_sweep(Duration::from_secs(TOKEN_SWEEP_INTERVAL_SECS));

    tracing::info!(
        metadata_backend = %config.metadata_backend(),
        token_store_backend = %config.token_store_backend(),
        signed_url_ttl_seconds = config.signed_url_ttl_seconds(),
        "Stores initialized"
    );

    Ok((access, tokens))
}
