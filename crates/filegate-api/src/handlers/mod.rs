//! HTTP handlers

pub mod download;
pub mod files;

use crate::error::HttpAppError;
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use filegate_core::AppError;
use filegate_storage::ObjectBody;

/// Stream an object to the client as an attachment-style download.
pub(crate) fn object_response(object: ObjectBody) -> Result<Response, HttpAppError> {
    let metadata = object.metadata;
    let disposition = HeaderValue::from_str(&format!("filename=\"{}\"", metadata.key))
        .map_err(|_| AppError::Internal(format!("Key {} is not a valid header value", metadata.key)))?;

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, disposition);

    if !metadata.http_etag.is_empty() {
        builder = builder.header(header::ETAG, metadata.http_etag.as_str());
    }

    builder = match metadata.range {
        Some(range) => builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_LENGTH, range.length)
            .header(
                header::CONTENT_RANGE,
                format!(
                    "bytes {}-{}/{}",
                    range.offset,
                    (range.offset + range.length).saturating_sub(1),
                    metadata.size
                ),
            ),
        None => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, metadata.size),
    };

    builder
        .body(Body::from_stream(object.body))
        .map_err(|e| HttpAppError(AppError::Internal(format!("Failed to build response: {}", e))))
}
