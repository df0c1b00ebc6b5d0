//! Database repositories for data access layer
//!
//! Repositories are organized into access/ (principals and per-object visibility
//! records) and token/ (signed download tokens). Each area exposes a storage trait,
//! its PostgreSQL and in-memory implementations and the store that callers use.
//
// Access control (employees, files)
pub mod access;
//
// Signed download tokens
pub mod token;
//
// Pool and migrations
pub mod pool;
//
pub use access::{
    AccessControlStore, AccessRepository, InMemoryAccessRepository, PgAccessRepository,
};
pub use pool::{connect, run_migrations};
pub use token::{
    InMemoryTokenKvStore, PgTokenKvStore, SignedUrlTokenStore, TokenKvStore,
    DEFAULT_SIGNED_URL_TTL_SECONDS,
};
