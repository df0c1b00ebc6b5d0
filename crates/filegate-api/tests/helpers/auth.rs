use super::TEST_JWT_SECRET;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use filegate_core::models::{PermissionLevel, Principal};
use filegate_core::{TokenClaims, TokenCodec};

pub const API_KEY_HEADER: &str = "X-API-Key";

/// A test employee with a signed credential.
pub struct TestUser {
    pub principal: Principal,
    pub credential: String,
}

/// Mint a credential for `id`@`company_id`, valid for an hour.
pub fn test_user(id: &str, company_id: &str) -> TestUser {
    let principal = Principal::new(id, company_id, PermissionLevel::Write);
    let credential = TokenCodec::issue(
        &TokenClaims::for_principal(&principal, 3600),
        TEST_JWT_SECRET,
    )
    .expect("Failed to mint credential");
    TestUser {
        principal,
        credential,
    }
}

/// A credential that expired a minute ago.
pub fn expired_credential(id: &str, company_id: &str) -> String {
    let principal = Principal::new(id, company_id, PermissionLevel::Read);
    TokenCodec::issue(&TokenClaims::for_principal(&principal, -60), TEST_JWT_SECRET)
        .expect("Failed to mint credential")
}

/// Direct upload of `content` under `key`.
pub async fn upload(
    client: &TestServer,
    user: &TestUser,
    key: &str,
    content: &[u8],
    visibility: &str,
) -> TestResponse {
    let form = MultipartForm::new()
        .add_text("key", key.to_string())
        .add_text("visibility", visibility.to_string())
        .add_part(
            "file",
            Part::bytes(bytes::Bytes::copy_from_slice(content)).file_name("upload.bin"),
        );

    client
        .put("/files")
        .add_header(API_KEY_HEADER, user.credential.clone())
        .multipart(form)
        .await
}
