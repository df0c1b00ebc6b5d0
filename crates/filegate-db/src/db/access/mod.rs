//! Principals and per-object visibility records

mod memory;
mod postgres;
mod store;

pub use memory::InMemoryAccessRepository;
pub use postgres::PgAccessRepository;
pub use store::AccessControlStore;

use filegate_core::models::{FileAccessRecord, Principal};
use filegate_core::AppError;

/// Persistence for registered principals and their file access records
///
/// Implementations only store and fetch. The visibility predicate lives in
/// [`AccessControlStore`].
#[async_trait::async_trait]
pub trait AccessRepository: Send + Sync {
    async fn find_principal(
        &self,
        id: &str,
        company_id: &str,
    ) -> Result<Option<Principal>, AppError>;

    /// Insert a principal. Inserting an already registered principal is a no-op.
    async fn insert_principal(&self, principal: &Principal) -> Result<(), AppError>;

    /// Insert an access record. `AlreadyExists` when the key already has one.
    async fn insert_file_access(&self, record: &FileAccessRecord) -> Result<(), AppError>;

    async fn find_file_access(&self, key: &str) -> Result<Option<FileAccessRecord>, AppError>;

    /// Records for every key in `keys` that has one, in one round trip.
    async fn find_file_accesses(&self, keys: &[String]) -> Result<Vec<FileAccessRecord>, AppError>;
}
