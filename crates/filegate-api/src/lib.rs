//! Filegate API Library
//!
//! HTTP handlers, middleware and application setup for the storage gateway.

mod api_doc;
mod handlers;
mod middleware;
pub mod services;
pub mod setup;
mod telemetry;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use error::ErrorResponse;
pub use setup::routes::setup_routes;
pub use state::{AppState, SecurityConfig, UploadConfig};
