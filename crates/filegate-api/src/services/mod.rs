pub mod multipart;

pub use multipart::MultipartUploadCoordinator;
