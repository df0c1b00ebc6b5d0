use super::AccessRepository;
use filegate_core::models::{FileAccessRecord, PermissionLevel, Principal};
use filegate_core::AppError;
use sqlx::{PgPool, Row};

/// PostgreSQL access repository over the `employees` and `files` tables
#[derive(Clone)]
pub struct PgAccessRepository {
    pool: PgPool,
}

impl PgAccessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AccessRepository for PgAccessRepository {
    #[tracing::instrument(skip(self), fields(db.table = "employees", db.operation = "select"))]
    async fn find_principal(
        &self,
        id: &str,
        company_id: &str,
    ) -> Result<Option<Principal>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, company_id, permission_level
            FROM employees
            WHERE id = $1 AND company_id = $2
            "#,
        )
        .bind(id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let level: i32 = row.get("permission_level");
        let permission_level = PermissionLevel::try_from(i64::from(level))
            .map_err(|e| AppError::Internal(format!("Corrupt employee row: {}", e)))?;

        Ok(Some(Principal::new(
            row.get::<String, _>("id"),
            row.get::<String, _>("company_id"),
            permission_level,
        )))
    }

    #[tracing::instrument(skip(self, principal), fields(db.table = "employees", db.operation = "insert", db.record_id = %principal.id))]
    async fn insert_principal(&self, principal: &Principal) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO employees (id, company_id, permission_level)
            VALUES ($1, $2, $3)
            ON CONFLICT (id, company_id) DO NOTHING
            "#,
        )
        .bind(&principal.id)
        .bind(&principal.company_id)
        .bind(i64::from(principal.permission_level) as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "files", db.operation = "insert", db.record_id = %record.key))]
    async fn insert_file_access(&self, record: &FileAccessRecord) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO files (name, employee_id, company_id, visibility)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&record.key)
        .bind(&record.employee_id)
        .bind(&record.company_id)
        .bind(record.visibility)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                AppError::AlreadyExists(format!("File {} already has an access record", record.key)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn find_file_access(&self, key: &str) -> Result<Option<FileAccessRecord>, AppError> {
        let record = sqlx::query_as::<_, FileAccessRecord>(
            r#"
            SELECT name AS key, employee_id, company_id, visibility
            FROM files
            WHERE name = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self, keys), fields(db.table = "files", db.operation = "select_batch", db.limit = keys.len()))]
    async fn find_file_accesses(&self, keys: &[String]) -> Result<Vec<FileAccessRecord>, AppError> {
        let records = sqlx::query_as::<_, FileAccessRecord>(
            r#"
            SELECT name AS key, employee_id, company_id, visibility
            FROM files
            WHERE name = ANY($1)
            "#,
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
