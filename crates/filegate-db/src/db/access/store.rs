use super::{AccessRepository, InMemoryAccessRepository};
use filegate_core::models::{FileAccessRecord, Principal};
use filegate_core::AppError;
use std::collections::HashMap;
use std::sync::Arc;

/// Visibility evaluation over an [`AccessRepository`]
#[derive(Clone)]
pub struct AccessControlStore {
    repo: Arc<dyn AccessRepository>,
}

impl AccessControlStore {
    pub fn new(repo: Arc<dyn AccessRepository>) -> Self {
        Self { repo }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryAccessRepository::new()))
    }

    /// Register `principal` if it is not known yet.
    pub async fn ensure_principal_registered(&self, principal: &Principal) -> Result<bool, AppError> {
        if !principal.is_complete() {
            return Err(AppError::Validation(
                "Employee id and company id are required".to_string(),
            ));
        }

        if self
            .repo
            .find_principal(&principal.id, &principal.company_id)
            .await?
            .is_some()
        {
            return Ok(true);
        }

        self.repo.insert_principal(principal).await?;
        tracing::debug!(
            employee_id = %principal.id,
            company_id = %principal.company_id,
            "Registered principal"
        );
        Ok(true)
    }

    /// Create the access record of a new object.
    ///
    /// `Ok(false)` when the owning principal is not registered.
    pub async fn record_access(&self, record: &FileAccessRecord) -> Result<bool, AppError> {
        if record.key.is_empty() || record.employee_id.is_empty() || record.company_id.is_empty()
        {
            return Err(AppError::Validation(
                "Key, employee id and company id are required".to_string(),
            ));
        }

        if self
            .repo
            .find_principal(&record.employee_id, &record.company_id)
            .await?
            .is_none()
        {
            tracing::warn!(
                key = %record.key,
                employee_id = %record.employee_id,
                "Refusing access record for unregistered principal"
            );
            return Ok(false);
        }

        self.repo.insert_file_access(record).await?;
        tracing::info!(key = %record.key, visibility = %record.visibility, "Recorded file access");
        Ok(true)
    }

    /// Decision for one key: `None` when the key has no access record.
    ///
    /// An unregistered principal is denied, PUBLIC objects included.
    pub async fn access_decision(
        &self,
        key: &str,
        principal: &Principal,
    ) -> Result<Option<bool>, AppError> {
        if key.is_empty() {
            return Err(AppError::Validation("Key is required".to_string()));
        }

        let Some(record) = self.repo.find_file_access(key).await? else {
            return Ok(None);
        };

        if !self.is_registered(principal).await? {
            return Ok(Some(false));
        }

        Ok(Some(record.grants(principal)))
    }

    pub async fn check_access(&self, key: &str, principal: &Principal) -> Result<bool, AppError> {
        Ok(self.access_decision(key, principal).await?.unwrap_or(false))
    }

    /// Decisions for many keys in one round trip. Keys without a record are absent
    /// from the result.
    pub async fn check_access_batch(
        &self,
        keys: &[String],
        principal: &Principal,
    ) -> Result<HashMap<String, bool>, AppError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        if !self.is_registered(principal).await? {
            return Ok(keys.iter().map(|key| (key.clone(), false)).collect());
        }

        let records = self.repo.find_file_accesses(keys).await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let allowed = record.grants(principal);
                (record.key, allowed)
            })
            .collect())
    }

    async fn is_registered(&self, principal: &Principal) -> Result<bool, AppError> {
        Ok(self
            .repo
            .find_principal(&principal.id, &principal.company_id)
            .await?
            .is_some())
    }
}
