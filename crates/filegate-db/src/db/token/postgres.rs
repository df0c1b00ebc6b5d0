use super::TokenKvStore;
use chrono::{DateTime, Utc};
use filegate_core::AppError;
use sqlx::{PgPool, Row};
use std::time::Duration;

/// Token store over the `signed_url_tokens` table
#[derive(Clone)]
pub struct PgTokenKvStore {
    pool: PgPool,
}

impl PgTokenKvStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TokenKvStore for PgTokenKvStore {
    #[tracing::instrument(skip(self, key), fields(db.table = "signed_url_tokens", db.operation = "select"))]
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT value FROM signed_url_tokens
            WHERE token = $1 AND expires_at > NOW()
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("value")))
    }

    #[tracing::instrument(skip(self, key, value), fields(db.table = "signed_url_tokens", db.operation = "upsert"))]
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::InvalidInput(format!("Invalid token TTL: {}", e)))?;
        let expires_at: DateTime<Utc> = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::InvalidInput("Token TTL out of range".to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO signed_url_tokens (token, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (token) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, key), fields(db.table = "signed_url_tokens", db.operation = "delete"))]
    async fn delete(&self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM signed_url_tokens WHERE token = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, key), fields(db.table = "signed_url_tokens", db.operation = "delete_returning"))]
    async fn take(&self, key: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query(
            r#"
            DELETE FROM signed_url_tokens
            WHERE token = $1
            RETURNING value, expires_at > NOW() AS live
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| {
            let live: bool = r.get("live");
            live.then(|| r.get("value"))
        }))
    }

    #[tracing::instrument(skip(self), fields(db.table = "signed_url_tokens", db.operation = "delete_expired"))]
    async fn purge_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM signed_url_tokens WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
