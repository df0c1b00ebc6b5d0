//! One-time signed download tokens

mod memory;
mod postgres;
mod store;

pub use memory::InMemoryTokenKvStore;
pub use postgres::PgTokenKvStore;
pub use store::{SignedUrlTokenStore, DEFAULT_SIGNED_URL_TTL_SECONDS};

use filegate_core::AppError;
use std::time::Duration;

/// Expiring string key-value store backing signed download tokens
#[async_trait::async_trait]
pub trait TokenKvStore: Send + Sync {
    /// Live value of `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Store `value` under `key` for `ttl`, replacing any previous value.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// Remove `key` and return its live value. At most one caller observes a value.
    async fn take(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Drop every entry past its TTL. Returns the number removed.
    async fn purge_expired(&self) -> Result<u64, AppError>;
}
