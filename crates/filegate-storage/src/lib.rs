//! Filegate Storage Library
//!
//! Object storage abstraction for the gateway, with S3 and local filesystem
//! implementations. Both backends own the multipart session state: upload ids,
//! accepted parts and final assembly.
//!
//! Keys reaching a backend are already sanitised. Backends still refuse keys with
//! `..` segments or a leading `/`.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use filegate_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, ObjectBody, Storage, StorageError, StorageResult};
