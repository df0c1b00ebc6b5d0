//! Filegate Database Library
//!
//! Persistence for visibility records, registered principals and one-time
//! download tokens, with PostgreSQL and in-memory backends.

pub mod db;

pub use db::*;
