//! Route configuration and setup.

use crate::api_doc;
use crate::auth::auth_middleware;
use crate::error::HttpAppError;
use crate::handlers;
use crate::middleware::{cors_layer, preflight_no_content};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    response::Response,
    routing::get,
    Json, Router,
};
use filegate_core::AppError;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and the text fields around the file
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the application router
pub fn setup_routes(state: Arc<AppState>) -> Router {
    let body_limit = state.upload.max_upload_size_bytes + MULTIPART_OVERHEAD_BYTES;

    let file_routes = Router::new()
        .route(
            "/files",
            get(handlers::files::get_files)
                .post(handlers::files::post_files)
                .put(handlers::files::put_files)
                .delete(handlers::files::delete_files)
                .fallback(method_not_allowed),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Token redemption carries no credential, issuing authenticates in the handler
    let download_routes = Router::new().route(
        "/download/{*key}",
        get(handlers::download::download).fallback(method_not_allowed),
    );

    let openapi = api_doc::get_openapi_spec();

    // Server-level concurrency limit
    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        body_limit_bytes = body_limit,
        "HTTP limits enabled"
    );

    Router::new()
        .merge(file_routes)
        .merge(download_routes)
        .route("/openapi.json", get(move || async move { Json(openapi) }))
        .merge(utoipa_rapidoc::RapiDoc::new("/openapi.json").path("/docs"))
        .fallback(not_found)
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .layer(axum::middleware::from_fn(preflight_no_content))
        .with_state(state)
}

async fn not_found() -> Response {
    use axum::response::IntoResponse;
    HttpAppError(AppError::NotFound("Not found".to_string())).into_response()
}

async fn method_not_allowed() -> Response {
    use axum::response::IntoResponse;
    HttpAppError(AppError::MethodNotAllowed("Method not allowed".to_string())).into_response()
}
