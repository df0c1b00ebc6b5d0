//! Object handlers on `/files`: reads, listings, direct and multipart uploads.

use crate::auth::AuthPrincipal;
use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::object_response;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Multipart, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use filegate_core::keys::{sanitize_key, validate_key};
use filegate_core::models::{
    FileCreateStartBody, GetOptions, MultipartUploadResponse, ObjectList, RangeSpec, UploadedPart,
    Visibility,
};
use filegate_core::AppError;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use validator::Validate;

pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 1000;

/// Query parameters accepted on `/files`
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct FilesQuery {
    /// Object key
    pub key: Option<String>,
    /// Page size for listings (1..=1000)
    pub limit: Option<String>,
    /// Listing cursor from a previous page
    pub cursor: Option<String>,
    /// Byte range: `bytes=a-b`, `a-b`, `a-` or `-n`
    pub range: Option<String>,
    /// Etag that must match for the read to proceed
    #[serde(rename = "onlyIf")]
    pub only_if: Option<String>,
    /// Multipart session id
    pub upload_id: Option<String>,
    /// Visibility applied on completion (default PRIVATE)
    pub visibility: Option<String>,
}

impl FilesQuery {
    fn key(&self) -> Option<String> {
        self.key
            .as_deref()
            .map(sanitize_key)
            .filter(|k| !k.is_empty())
    }
}

fn checked_key(raw: &str) -> Result<String, AppError> {
    let key = sanitize_key(raw);
    validate_key(&key).map_err(AppError::InvalidInput)?;
    Ok(key)
}

fn parse_visibility(raw: Option<&str>) -> Result<Visibility, AppError> {
    match raw {
        Some(v) if !v.trim().is_empty() => v.trim().parse().map_err(AppError::InvalidInput),
        _ => Ok(Visibility::default()),
    }
}

/// Fetch one object or list objects
#[utoipa::path(
    get,
    path = "/files",
    tag = "files",
    params(FilesQuery),
    responses(
        (status = 200, description = "Object content", content_type = "application/octet-stream"),
        (status = 206, description = "Partial object content, or a page of object metadata"),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Object not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, principal, query), fields(employee_id = %principal.0.id, operation = "get_files"))]
pub async fn get_files(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    Query(query): Query<FilesQuery>,
) -> Result<Response, HttpAppError> {
    match query.key() {
        Some(key) => fetch_object(&state, &principal, &key, &query).await,
        None => list_objects(&state, &principal, &query).await,
    }
}

async fn fetch_object(
    state: &AppState,
    principal: &AuthPrincipal,
    key: &str,
    query: &FilesQuery,
) -> Result<Response, HttpAppError> {
    match state.access.access_decision(key, &principal.0).await? {
        None => return Err(AppError::NotFound("File not found".to_string()).into()),
        Some(false) => return Err(AppError::Forbidden("Access denied".to_string()).into()),
        Some(true) => {}
    }

    let range = query
        .range
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .map(RangeSpec::parse)
        .transpose()
        .map_err(AppError::InvalidInput)?;
    let options = GetOptions {
        range,
        only_if_etag: query.only_if.clone().filter(|e| !e.is_empty()),
    };

    let object = state
        .storage
        .get(key, &options)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    tracing::info!(key = %key, size_bytes = object.metadata.size, "Serving object");
    object_response(object)
}

async fn list_objects(
    state: &AppState,
    principal: &AuthPrincipal,
    query: &FilesQuery,
) -> Result<Response, HttpAppError> {
    let limit = match query.limit.as_deref() {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|l| (1..=MAX_LIST_LIMIT).contains(l))
            .ok_or_else(|| {
                AppError::InvalidInput(format!("limit must be between 1 and {}", MAX_LIST_LIMIT))
            })?,
        None => DEFAULT_LIST_LIMIT,
    };
    let cursor = query.cursor.as_deref().filter(|c| !c.is_empty());

    let page = state.storage.list(limit, cursor).await?;
    if page.objects.is_empty() {
        return Err(AppError::NotFound("No objects found".to_string()).into());
    }

    let keys: Vec<String> = page.objects.iter().map(|o| o.key.clone()).collect();
    let decisions = state.access.check_access_batch(&keys, &principal.0).await?;

    let objects = page
        .objects
        .into_iter()
        .filter(|o| decisions.get(&o.key).copied().unwrap_or(false))
        .collect::<Vec<_>>();

    tracing::debug!(
        visible = objects.len(),
        listed = keys.len(),
        truncated = page.truncated,
        "Listed objects"
    );

    let body = ObjectList {
        objects,
        truncated: page.truncated,
        cursor: page.cursor,
    };
    Ok((StatusCode::PARTIAL_CONTENT, Json(body)).into_response())
}

/// Start a multipart session (object body) or complete one (array body)
#[utoipa::path(
    post,
    path = "/files",
    tag = "files",
    params(FilesQuery),
    request_body(content = FileCreateStartBody, description = "Start body, or an array of parts to complete"),
    responses(
        (status = 200, description = "Session started, or object metadata after completion", body = MultipartUploadResponse),
        (status = 400, description = "Invalid body or manifest", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 500, description = "Access could not be recorded", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, principal, query, body), fields(employee_id = %principal.0.id, operation = "post_files"))]
pub async fn post_files(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    Query(query): Query<FilesQuery>,
    body: Bytes,
) -> Result<Response, HttpAppError> {
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid request body: {}", e)))?;

    if value.is_array() {
        let parts: Vec<UploadedPart> = serde_json::from_value(value)
            .map_err(|e| AppError::InvalidInput(format!("Invalid part manifest: {}", e)))?;
        for part in &parts {
            part.validate().map_err(AppError::from)?;
        }

        let upload_id = query
            .upload_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::InvalidInput("upload_id is required".to_string()))?;
        let key = query
            .key()
            .ok_or_else(|| AppError::InvalidInput("key is required".to_string()))?;
        let visibility = parse_visibility(query.visibility.as_deref())?;

        let metadata = state
            .uploads
            .complete(&key, upload_id, &principal.0, visibility, parts)
            .await?;
        return Ok(Json(metadata).into_response());
    }

    let start: FileCreateStartBody = serde_json::from_value(value)
        .map_err(|e| AppError::InvalidInput(format!("Invalid request body: {}", e)))?;
    start.validate().map_err(AppError::from)?;
    let key = checked_key(&start.key)?;

    let session = state
        .uploads
        .start(&key, &principal.0, start.visibility)
        .await?;
    tracing::info!(key = %key, upload_id = %session.upload_id, "Multipart upload started");
    Ok(Json(session).into_response())
}

#[derive(Default)]
struct PutForm {
    file: Option<Bytes>,
    key: Option<String>,
    visibility: Option<String>,
    upload_id: Option<String>,
    part: Option<String>,
}

async fn read_put_form(mut multipart: Multipart) -> Result<PutForm, AppError> {
    let mut form = PutForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let read_err = |e: axum::extract::multipart::MultipartError| {
            AppError::InvalidInput(format!("Failed to read field {}: {}", name, e))
        };
        match name.as_str() {
            "file" => form.file = Some(field.bytes().await.map_err(read_err)?),
            "key" => form.key = Some(field.text().await.map_err(read_err)?),
            "visibility" => form.visibility = Some(field.text().await.map_err(read_err)?),
            "upload_id" => form.upload_id = Some(field.text().await.map_err(read_err)?),
            "part" => form.part = Some(field.text().await.map_err(read_err)?),
            _ => {}
        }
    }
    Ok(form)
}

/// Upload a small object directly, or one part of a multipart session
#[utoipa::path(
    put,
    path = "/files",
    tag = "files",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Object stored; body is the object metadata"),
        (status = 201, description = "Part stored", body = UploadedPart),
        (status = 400, description = "Invalid form, duplicate key or file too large", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 500, description = "Access could not be recorded", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, principal, headers, multipart), fields(employee_id = %principal.0.id, operation = "put_files"))]
pub async fn put_files(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, HttpAppError> {
    if exceeds_upload_limit(&headers, state.upload.max_upload_size_bytes) {
        return Err(AppError::PayloadTooLarge("File size too large".to_string()).into());
    }

    let form = read_put_form(multipart).await?;
    let key = checked_key(
        form.key
            .as_deref()
            .ok_or_else(|| AppError::InvalidInput("key is required".to_string()))?,
    )?;
    let file = form
        .file
        .ok_or_else(|| AppError::InvalidInput("file is required".to_string()))?;
    if file.len() > state.upload.max_upload_size_bytes {
        return Err(AppError::PayloadTooLarge("File size too large".to_string()).into());
    }

    if let Some(upload_id) = form.upload_id.as_deref().filter(|id| !id.is_empty()) {
        let part_number = form
            .part
            .as_deref()
            .ok_or_else(|| AppError::InvalidInput("part is required".to_string()))?
            .trim()
            .parse::<i64>()
            .map_err(|_| AppError::InvalidInput("Invalid part number".to_string()))?;

        let part = state
            .uploads
            .accept_part(&key, upload_id, part_number, file)
            .await?;
        return Ok((StatusCode::CREATED, Json(part)).into_response());
    }

    let visibility = parse_visibility(form.visibility.as_deref())?;
    let metadata = state
        .uploads
        .put_object(&key, &principal.0, visibility, file)
        .await?;

    tracing::info!(key = %key, size_bytes = metadata.size, visibility = %visibility, "Object stored");
    Ok(Json(metadata).into_response())
}

/// Abort a multipart session; other deletes are not supported
#[utoipa::path(
    delete,
    path = "/files",
    tag = "files",
    params(FilesQuery),
    responses(
        (status = 204, description = "Multipart session aborted"),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 501, description = "Object deletion is not implemented", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, principal, query), fields(employee_id = %principal.0.id, operation = "delete_files"))]
pub async fn delete_files(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    Query(query): Query<FilesQuery>,
) -> Result<Response, HttpAppError> {
    let upload_id = query.upload_id.as_deref().filter(|id| !id.is_empty());
    match (upload_id, query.key()) {
        (Some(upload_id), Some(key)) => {
            state.uploads.abort(&key, upload_id).await?;
            tracing::info!(key = %key, upload_id = %upload_id, "Multipart upload aborted");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        _ => Err(AppError::NotImplemented("Not implemented".to_string()).into()),
    }
}

/// `content-length` is the only size signal available before the body is read
pub(crate) fn exceeds_upload_limit(headers: &HeaderMap, max_bytes: usize) -> bool {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .is_some_and(|len| len > max_bytes as u64)
}
