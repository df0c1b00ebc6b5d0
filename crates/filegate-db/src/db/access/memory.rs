use super::AccessRepository;
use filegate_core::models::{FileAccessRecord, Principal};
use filegate_core::AppError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Arena {
    principals: Vec<Principal>,
    principal_index: HashMap<(String, String), usize>,
    files: Vec<FileAccessRecord>,
    file_index: HashMap<String, usize>,
}

/// In-process access repository for tests and `METADATA_BACKEND=memory`
///
/// Records live in append-only vectors indexed by key. Nothing is persisted.
#[derive(Default)]
pub struct InMemoryAccessRepository {
    arena: Mutex<Arena>,
}

impl InMemoryAccessRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn arena(&self) -> Result<MutexGuard<'_, Arena>, AppError> {
        self.arena
            .lock()
            .map_err(|_| AppError::Internal("Access repository lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl AccessRepository for InMemoryAccessRepository {
    async fn find_principal(
        &self,
        id: &str,
        company_id: &str,
    ) -> Result<Option<Principal>, AppError> {
        let arena = self.arena()?;
        let found = arena
            .principal_index
            .get(&(id.to_string(), company_id.to_string()))
            .map(|&idx| arena.principals[idx].clone());
        Ok(found)
    }

    async fn insert_principal(&self, principal: &Principal) -> Result<(), AppError> {
        let mut arena = self.arena()?;
        let index_key = (principal.id.clone(), principal.company_id.clone());
        if arena.principal_index.contains_key(&index_key) {
            return Ok(());
        }
        let idx = arena.principals.len();
        arena.principals.push(principal.clone());
        arena.principal_index.insert(index_key, idx);
        Ok(())
    }

    async fn insert_file_access(&self, record: &FileAccessRecord) -> Result<(), AppError> {
        let mut arena = self.arena()?;
        if arena.file_index.contains_key(&record.key) {
            return Err(AppError::AlreadyExists(format!(
                "File {} already has an access record",
                record.key
            )));
        }
        let idx = arena.files.len();
        arena.files.push(record.clone());
        arena.file_index.insert(record.key.clone(), idx);
        Ok(())
    }

    async fn find_file_access(&self, key: &str) -> Result<Option<FileAccessRecord>, AppError> {
        let arena = self.arena()?;
        Ok(arena.file_index.get(key).map(|&idx| arena.files[idx].clone()))
    }

    async fn find_file_accesses(&self, keys: &[String]) -> Result<Vec<FileAccessRecord>, AppError> {
        let arena = self.arena()?;
        Ok(keys
            .iter()
            .filter_map(|key| arena.file_index.get(key))
            .map(|&idx| arena.files[idx].clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filegate_core::models::{PermissionLevel, Visibility};

    #[tokio::test]
    async fn test_insert_principal_is_idempotent() {
        let repo = InMemoryAccessRepository::new();
        let principal = Principal::new("emp-1", "acme", PermissionLevel::Write);

        repo.insert_principal(&principal).await.unwrap();
        repo.insert_principal(&principal).await.unwrap();

        assert_eq!(
            repo.find_principal("emp-1", "acme").await.unwrap(),
            Some(principal)
        );
        assert!(repo.find_principal("emp-1", "globex").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let repo = InMemoryAccessRepository::new();
        let principal = Principal::new("emp-1", "acme", PermissionLevel::Write);
        let record = FileAccessRecord::for_principal("a.txt", &principal, Visibility::Private);

        repo.insert_file_access(&record).await.unwrap();
        let result = repo.insert_file_access(&record).await;
        assert!(matches!(result, Err(AppError::AlreadyExists(_))));
    }
}
