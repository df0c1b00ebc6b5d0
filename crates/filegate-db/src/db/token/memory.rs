use super::TokenKvStore;
use filegate_core::AppError;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// In-process token store
///
/// Expired entries are dropped when read and by `purge_expired`.
#[derive(Default)]
pub struct InMemoryTokenKvStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryTokenKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TokenKvStore for InMemoryTokenKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((_, deadline)) if *deadline <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let deadline = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| AppError::InvalidInput("Token TTL out of range".to_string()))?;
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, AppError> {
        let removed = self.entries.lock().await.remove(key);
        Ok(removed
            .filter(|(_, deadline)| *deadline > Instant::now())
            .map(|(value, _)| value))
    }

    async fn purge_expired(&self) -> Result<u64, AppError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, (_, deadline)| *deadline > now);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = InMemoryTokenKvStore::new();
        store.put("t", "v", Duration::from_secs(5)).await.unwrap();
        assert_eq!(store.get("t").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.get("t").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let store = InMemoryTokenKvStore::new();
        store.put("t", "v", Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.take("t").await.unwrap().as_deref(), Some("v"));
        assert!(store.take("t").await.unwrap().is_none());
        assert!(store.get("t").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_drops_only_expired_entries() {
        let store = InMemoryTokenKvStore::new();
        store.put("short", "a", Duration::from_secs(5)).await.unwrap();
        store.put("long", "b", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 0);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.entries.lock().await.len(), 1);
        assert_eq!(store.get("long").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_rejected() {
        let store = InMemoryTokenKvStore::new();
        let result = store.put("t", "v", Duration::MAX).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert!(store.get("t").await.unwrap().is_none());
    }
}
