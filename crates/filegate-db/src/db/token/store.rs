use super::{InMemoryTokenKvStore, TokenKvStore};
use chrono::Utc;
use filegate_core::config::MAX_SIGNED_URL_TTL_SECONDS;
use filegate_core::models::{PermissionLevel, Principal};
use filegate_core::AppError;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_SIGNED_URL_TTL_SECONDS: u64 = 300;

/// Issues and redeems one-time download tokens
///
/// A token maps to `expiresAt|fileKey|employeeId|companyId`, with `expiresAt` in
/// unix seconds. Redemption removes the record whatever its outcome.
#[derive(Clone)]
pub struct SignedUrlTokenStore {
    kv: Arc<dyn TokenKvStore>,
    ttl_seconds: u64,
}

impl SignedUrlTokenStore {
    pub fn new(kv: Arc<dyn TokenKvStore>, ttl_seconds: u64) -> Self {
        Self { kv, ttl_seconds }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryTokenKvStore::new()),
            DEFAULT_SIGNED_URL_TTL_SECONDS,
        )
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Issue a token for `file_key` with the configured TTL.
    pub async fn issue(&self, file_key: &str, principal: &Principal) -> Result<String, AppError> {
        self.issue_with_ttl(file_key, principal, self.ttl_seconds)
            .await
    }

    #[tracing::instrument(skip(self, principal), fields(operation = "issue_token", employee_id = %principal.id))]
    pub async fn issue_with_ttl(
        &self,
        file_key: &str,
        principal: &Principal,
        ttl_seconds: u64,
    ) -> Result<String, AppError> {
        if file_key.is_empty() {
            return Err(AppError::Validation("Key is required".to_string()));
        }
        if ttl_seconds == 0 {
            return Err(AppError::InvalidInput(
                "Token TTL must be greater than 0".to_string(),
            ));
        }
        if ttl_seconds > MAX_SIGNED_URL_TTL_SECONDS {
            return Err(AppError::InvalidInput(format!(
                "Token TTL must not exceed {} seconds",
                MAX_SIGNED_URL_TTL_SECONDS
            )));
        }

        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now().timestamp() + ttl_seconds as i64;
        let value = format!(
            "{}|{}|{}|{}",
            expires_at, file_key, principal.id, principal.company_id
        );

        self.kv
            .put(&token, &value, Duration::from_secs(ttl_seconds))
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("Token write failed: {}", e)))?;

        let stored = self
            .kv
            .get(&token)
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("Token read-back failed: {}", e)))?;
        if stored.as_deref() != Some(value.as_str()) {
            return Err(AppError::StoreUnavailable(
                "Token read-back did not match".to_string(),
            ));
        }

        tracing::info!(key = %file_key, ttl_seconds, "Issued signed download token");
        Ok(token)
    }

    /// Consume `token`. `None` when it is unknown, already used or expired.
    pub async fn redeem(&self, token: &str) -> Result<Option<(String, Principal)>, AppError> {
        self.redeem_at(token, Utc::now().timestamp()).await
    }

    pub async fn redeem_at(
        &self,
        token: &str,
        now: i64,
    ) -> Result<Option<(String, Principal)>, AppError> {
        let Some(value) = self.kv.take(token).await? else {
            return Ok(None);
        };

        let Some((expires_at, file_key, principal)) = parse_value(&value) else {
            tracing::warn!("Discarding malformed signed download token record");
            return Ok(None);
        };

        if now > expires_at {
            tracing::debug!(key = %file_key, "Signed download token expired");
            return Ok(None);
        }

        Ok(Some((file_key, principal)))
    }

    /// Drop expired token records. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        self.kv.purge_expired().await
    }

    /// Purge expired tokens on a fixed period in a background task.
    pub fn start_expiry_sweep(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let kv = self.kv.clone();
        let every = every.max(Duration::from_secs(1));
        tracing::info!(interval_secs = every.as_secs(), "Starting signed download token sweep");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match kv.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => {
                        tracing::debug!(removed, "Purged expired signed download tokens")
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Signed download token sweep failed")
                    }
                }
            }
        })
    }
}

/// Keys may contain `|`, identifiers are split from the right.
fn parse_value(value: &str) -> Option<(i64, String, Principal)> {
    let (expires_at, rest) = value.split_once('|')?;
    let mut tail = rest.rsplitn(3, '|');
    let company_id = tail.next()?;
    let employee_id = tail.next()?;
    let file_key = tail.next()?;

    let principal = Principal::new(employee_id, company_id, PermissionLevel::Read);
    Some((expires_at.parse().ok()?, file_key.to_string(), principal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Principal {
        Principal::new("alice", "acme", PermissionLevel::Write)
    }

    #[tokio::test]
    async fn test_issue_and_redeem_once() {
        let store = SignedUrlTokenStore::in_memory();
        let token = store.issue("reports/q1.pdf", &alice()).await.unwrap();
        assert!(Uuid::parse_str(&token).is_ok());

        let (key, principal) = store.redeem(&token).await.unwrap().unwrap();
        assert_eq!(key, "reports/q1.pdf");
        assert_eq!(principal.id, "alice");
        assert_eq!(principal.company_id, "acme");

        assert!(store.redeem(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_consumed() {
        let kv = Arc::new(InMemoryTokenKvStore::new());
        let store = SignedUrlTokenStore::new(kv.clone(), 60);
        let token = store.issue("a.txt", &alice()).await.unwrap();

        let later = Utc::now().timestamp() + 61;
        assert!(store.redeem_at(&token, later).await.unwrap().is_none());
        assert!(kv.get(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let store = SignedUrlTokenStore::in_memory();
        assert!(store.redeem("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_key_with_separator_survives() {
        let store = SignedUrlTokenStore::in_memory();
        let token = store.issue("odd|name.txt", &alice()).await.unwrap();
        let (key, principal) = store.redeem(&token).await.unwrap().unwrap();
        assert_eq!(key, "odd|name.txt");
        assert_eq!(principal.company_id, "acme");
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let store = SignedUrlTokenStore::in_memory();
        let result = store.issue_with_ttl("a.txt", &alice(), 0).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_ttl_above_cap_rejected() {
        let store = SignedUrlTokenStore::in_memory();
        let result = store
            .issue_with_ttl("a.txt", &alice(), MAX_SIGNED_URL_TTL_SECONDS + 1)
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        let result = store.issue_with_ttl("a.txt", &alice(), u64::MAX).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        assert!(store
            .issue_with_ttl("a.txt", &alice(), MAX_SIGNED_URL_TTL_SECONDS)
            .await
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_leaves_live_tokens() {
        let kv = Arc::new(InMemoryTokenKvStore::new());
        let short = SignedUrlTokenStore::new(kv.clone(), 5);
        let long = SignedUrlTokenStore::new(kv.clone(), 600);
        short.issue("a.txt", &alice()).await.unwrap();
        let kept = long.issue("b.txt", &alice()).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(short.purge_expired().await.unwrap(), 1);
        assert!(kv.get(&kept).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_sweep_purges_in_background() {
        let kv = Arc::new(InMemoryTokenKvStore::new());
        let store = SignedUrlTokenStore::new(kv.clone(), 5);
        store.issue("a.txt", &alice()).await.unwrap();

        let sweep = store.start_expiry_sweep(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(11)).await;

        // Nothing left for a manual purge once the sweep has run.
        assert_eq!(kv.purge_expired().await.unwrap(), 0);
        sweep.abort();
    }

    struct LossyStore;

    #[async_trait::async_trait]
    impl TokenKvStore for LossyStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, AppError> {
            Ok(None)
        }
        async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), AppError> {
            Ok(())
        }
        async fn delete(&self, _key: &str) -> Result<(), AppError> {
            Ok(())
        }
        async fn take(&self, _key: &str) -> Result<Option<String>, AppError> {
            Ok(None)
        }
        async fn purge_expired(&self) -> Result<u64, AppError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_missing_read_back_is_store_unavailable() {
        let store = SignedUrlTokenStore::new(Arc::new(LossyStore), 300);
        let result = store.issue("a.txt", &alice()).await;
        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    }
}
