use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use filegate_core::models::Principal;
use filegate_core::{AppError, TokenCodec};
use std::sync::Arc;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Verify the request credential and register its principal.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Principal, AppError> {
    let credential = headers
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))?;

    let principal = TokenCodec::verify(credential, &state.security.jwt_secret).map_err(|e| {
        tracing::debug!(reason = %e, "Credential rejected");
        AppError::Unauthorized("Unauthorized".to_string())
    })?;

    state.access.ensure_principal_registered(&principal).await?;

    Ok(principal)
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(principal) => {
            tracing::debug!(
                employee_id = %principal.id,
                company_id = %principal.company_id,
                "Authenticated request"
            );
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}

/// Principal attached by [`auth_middleware`]
///
/// Extracted from request parts so it composes with `Multipart`.
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub Principal);

impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthPrincipal)
            .ok_or_else(|| HttpAppError(AppError::Unauthorized("Unauthorized".to_string())))
    }
}
