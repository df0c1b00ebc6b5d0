//! Configuration module
//!
//! Settings are read from the environment (optionally seeded from a `.env` file) and
//! checked by `validate()` before the server starts.

use std::env;

use crate::backend_types::{StateBackend, StorageBackend};

const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SIGNED_URL_TTL_SECONDS: u64 = 300;
/// Longest lifetime a signed URL token may be given (7 days).
pub const MAX_SIGNED_URL_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
const MAX_UPLOAD_SIZE_BYTES: usize = 100 * 1024 * 1024;
const LOCAL_STORAGE_PATH: &str = "./data/objects";

/// Process level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub jwt_secret: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// `json` switches the log formatter to JSON lines
    pub log_format: Option<String>,
}

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base: BaseConfig,
    // Object storage
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers
    // Access records and signed URL tokens
    pub metadata_backend: StateBackend,
    pub token_store_backend: StateBackend,
    pub database_url: Option<String>,
    pub signed_url_ttl_seconds: u64,
    pub max_upload_size_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct Config(pub Box<GatewayConfig>);

impl Config {
    pub fn new(config: GatewayConfig) -> Self {
        Config(Box::new(config))
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = GatewayConfig::from_env()?;
        let config = Config(Box::new(config));
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.0.validate()
    }

    pub fn is_production(&self) -> bool {
        let env = self.0.base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.0.base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.0.base.environment
    }

    pub fn jwt_secret(&self) -> &str {
        &self.0.base.jwt_secret
    }

    pub fn db_max_connections(&self) -> u32 {
        self.0.base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.0.base.db_timeout_seconds
    }

    pub fn log_json(&self) -> bool {
        self.0
            .base
            .log_format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.0.storage_backend
    }

    pub fn local_storage_path(&self) -> &str {
        &self.0.local_storage_path
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.0.s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.0.s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.0.s3_endpoint.as_deref()
    }

    pub fn metadata_backend(&self) -> StateBackend {
        self.0.metadata_backend
    }

    pub fn token_store_backend(&self) -> StateBackend {
        self.0.token_store_backend
    }

    pub fn database_url(&self) -> Option<&str> {
        self.0.database_url.as_deref()
    }

    pub fn signed_url_ttl_seconds(&self) -> u64 {
        self.0.signed_url_ttl_seconds
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.0.max_upload_size_bytes
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let base = BaseConfig {
            server_port: env::var("SERVER_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
            environment,
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            log_format: env::var("LOG_FORMAT").ok(),
        };

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .parse::<StorageBackend>()?;

        let metadata_backend = env::var("METADATA_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse::<StateBackend>()?;

        // tokens follow the metadata store unless told otherwise
        let token_store_backend = match env::var("TOKEN_STORE_BACKEND") {
            Ok(value) => value.parse::<StateBackend>()?,
            Err(_) => metadata_backend,
        };

        Ok(GatewayConfig {
            base,
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| LOCAL_STORAGE_PATH.to_string()),
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            metadata_backend,
            token_store_backend,
            database_url: env::var("DATABASE_URL").ok(),
            signed_url_ttl_seconds: env::var("SIGNED_URL_TTL_SECONDS")
                .unwrap_or_else(|_| SIGNED_URL_TTL_SECONDS.to_string())
                .parse()
                .unwrap_or(SIGNED_URL_TTL_SECONDS),
            max_upload_size_bytes: env::var("MAX_UPLOAD_SIZE_BYTES")
                .unwrap_or_else(|_| MAX_UPLOAD_SIZE_BYTES.to_string())
                .parse()
                .unwrap_or(MAX_UPLOAD_SIZE_BYTES),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        let needs_postgres = self.metadata_backend == StateBackend::Postgres
            || self.token_store_backend == StateBackend::Postgres;
        if needs_postgres {
            match self.database_url.as_deref() {
                Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {}
                Some(_) => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ))
                }
                None => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be set when using the postgres backend"
                    ))
                }
            }
        }

        if self.signed_url_ttl_seconds == 0 {
            return Err(anyhow::anyhow!("SIGNED_URL_TTL_SECONDS must be positive"));
        }
        if self.signed_url_ttl_seconds > MAX_SIGNED_URL_TTL_SECONDS {
            return Err(anyhow::anyhow!(
                "SIGNED_URL_TTL_SECONDS must not exceed {} seconds",
                MAX_SIGNED_URL_TTL_SECONDS
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> GatewayConfig {
        GatewayConfig {
            base: BaseConfig {
                server_port: SERVER_PORT,
                environment: "test".to_string(),
                jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
                db_max_connections: MAX_CONNECTIONS,
                db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
                log_format: None,
            },
            storage_backend: StorageBackend::Local,
            local_storage_path: "/tmp/filegate".to_string(),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            metadata_backend: StateBackend::Memory,
            token_store_backend: StateBackend::Memory,
            database_url: None,
            signed_url_ttl_seconds: SIGNED_URL_TTL_SECONDS,
            max_upload_size_bytes: MAX_UPLOAD_SIZE_BYTES,
        }
    }

    #[test]
    fn test_memory_config_is_valid() {
        assert!(memory_config().validate().is_ok());
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let mut config = memory_config();
        config.base.jwt_secret = "short".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let mut config = memory_config();
        config.token_store_backend = StateBackend::Postgres;
        assert!(config.validate().is_err());

        config.database_url = Some("mysql://localhost/db".to_string());
        assert!(config.validate().is_err());

        config.database_url = Some("postgres://localhost/filegate".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_s3_requires_bucket_and_region() {
        let mut config = memory_config();
        config.storage_backend = StorageBackend::S3;
        assert!(config.validate().is_err());
        config.s3_bucket = Some("objects".to_string());
        assert!(config.validate().is_err());
        config.s3_region = Some("auto".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_signed_url_ttl_bounds() {
        let mut config = memory_config();
        config.signed_url_ttl_seconds = 0;
        assert!(config.validate().is_err());

        config.signed_url_ttl_seconds = MAX_SIGNED_URL_TTL_SECONDS;
        assert!(config.validate().is_ok());

        config.signed_url_ttl_seconds = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("SIGNED_URL_TTL_SECONDS"));
    }

    #[test]
    fn test_is_production() {
        let mut inner = memory_config();
        inner.base.environment = "Production".to_string();
        assert!(Config::new(inner).is_production());
        assert!(!Config::new(memory_config()).is_production());
    }
}
