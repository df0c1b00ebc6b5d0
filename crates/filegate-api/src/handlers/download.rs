//! One-time download links on `/download/{key}`.
//!
//! `GET /download/{key}/token` issues a token for an authenticated principal with
//! access to `key`. The `/token` suffix is optional: a request without a `token`
//! query value is always an issue request. `GET /download/{key}?token=` redeems a
//! token without a credential.

use crate::auth::authenticate;
use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::object_response;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use filegate_core::keys::sanitize_key;
use filegate_core::models::GetOptions;
use filegate_core::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

const TOKEN_SUFFIX: &str = "/token";

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DownloadQuery {
    /// One-time token from the issue endpoint
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// Issue or redeem a one-time download token
#[utoipa::path(
    get,
    path = "/download/{key}",
    tag = "download",
    params(
        ("key" = String, Path, description = "Object key, optionally followed by /token"),
        DownloadQuery
    ),
    responses(
        (status = 200, description = "Token issued, or object content on redemption", body = TokenResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential when issuing", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Object not found or token for another key", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, headers, query), fields(operation = "download"))]
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    if let Some(token) = query.token.as_deref() {
        return redeem(&state, &sanitize_key(&path), token).await;
    }

    let key = path.strip_suffix(TOKEN_SUFFIX).unwrap_or(&path);
    issue(&state, &sanitize_key(key), &headers).await
}

async fn issue(state: &AppState, key: &str, headers: &HeaderMap) -> Result<Response, HttpAppError> {
    let principal = authenticate(state, headers).await?;
    if key.is_empty() {
        return Err(AppError::InvalidInput("key is required".to_string()).into());
    }

    match state.access.access_decision(key, &principal).await? {
        None => return Err(AppError::NotFound("File not found".to_string()).into()),
        Some(false) => return Err(AppError::Forbidden("Access denied".to_string()).into()),
        Some(true) => {}
    }

    let token = state.tokens.issue(key, &principal).await?;
    Ok(Json(TokenResponse { token }).into_response())
}

async fn redeem(state: &AppState, key: &str, token: &str) -> Result<Response, HttpAppError> {
    let (token_key, principal) = state
        .tokens
        .redeem(token)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired token".to_string()))?;

    if token_key != key {
        tracing::warn!(requested = %key, "Download token presented for a different key");
        return Err(AppError::NotFound("File not found".to_string()).into());
    }

    let object = state
        .storage
        .get(key, &GetOptions::default())
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    tracing::info!(key = %key, employee_id = %principal.id, "Serving signed download");
    object_response(object)
}
