//! Filegate Core Library
//!
//! Domain models, error types, configuration and the principal credential codec
//! shared by the gateway, its stores and the client.

pub mod backend_types;
pub mod config;
pub mod error;
pub mod keys;
pub mod models;
pub mod token;

// Re-export commonly used types
pub use backend_types::{StateBackend, StorageBackend};
pub use config::{BaseConfig, Config, GatewayConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use token::{AuthError, TokenClaims, TokenCodec};
