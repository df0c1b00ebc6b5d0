use axum::http::{header, HeaderName, Method, StatusCode};
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

const MAX_AGE: Duration = Duration::from_secs(86400);

/// Open CORS policy
///
/// Every `OPTIONS` request is treated as a preflight and answered before routing or
/// authentication. Other responses carry `Access-Control-Allow-Origin: *`.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ])
        .max_age(MAX_AGE)
}

/// Preflight answers from `CorsLayer` go out as 204.
pub async fn preflight_no_content(request: Request, next: Next) -> Response {
    let preflight = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}
