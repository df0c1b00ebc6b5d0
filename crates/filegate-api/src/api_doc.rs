//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use filegate_core::models;

/// Returns the OpenAPI document served at `/openapi.json`.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Filegate API",
        version = "0.1.0",
        description = "Access-controlled object storage gateway. Files are uploaded directly or in parts, listed and downloaded by authenticated employees, and shared through one-time download links."
    ),
    paths(
        handlers::files::get_files,
        handlers::files::post_files,
        handlers::files::put_files,
        handlers::files::delete_files,
        handlers::download::download,
    ),
    components(
        schemas(
            error::ErrorResponse,
            models::Visibility,
            models::FileCreateStartBody,
            models::MultipartUploadResponse,
            models::UploadedPart,
            handlers::download::TokenResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "files", description = "Upload, list and fetch objects"),
        (name = "download", description = "One-time download links")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    crate::auth::API_KEY_HEADER,
                ))),
            );
        }
    }
}
