//! Principal credentials.
//!
//! A credential is `base64url(header).base64url(payload).base64url(HMAC-SHA256(secret, header.payload))`
//! with a JSON payload `{id, company_id, exp, permission_level}`. Decoding accepts both
//! padded and unpadded base64url; encoding never pads.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::models::{PermissionLevel, Principal};

const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Malformed credential: {0}")]
    Malformed(String),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Credential expired")]
    Expired,
    #[error("Invalid claim: {0}")]
    InvalidClaim(String),
}

/// Claims minted into a credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub id: String,
    pub company_id: String,
    /// Unix seconds; fractional values are allowed
    pub exp: f64,
    pub permission_level: i64,
}

impl TokenClaims {
    /// Claims for `principal` expiring `ttl_seconds` from now.
    pub fn for_principal(principal: &Principal, ttl_seconds: i64) -> Self {
        Self {
            id: principal.id.clone(),
            company_id: principal.company_id.clone(),
            exp: (Utc::now().timestamp() + ttl_seconds) as f64,
            permission_level: principal.permission_level.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    id: Option<String>,
    company_id: Option<String>,
    exp: Option<f64>,
    permission_level: Option<i64>,
}

/// Stateless credential codec
pub struct TokenCodec;

impl TokenCodec {
    /// Verify a credential against the current time.
    pub fn verify(credential: &str, secret: &str) -> Result<Principal, AuthError> {
        let now = Utc::now().timestamp_millis() as f64 / 1000.0;
        Self::verify_at(credential, secret, now)
    }

    /// Verify a credential as of `now` (unix seconds).
    pub fn verify_at(credential: &str, secret: &str, now: f64) -> Result<Principal, AuthError> {
        let segments: Vec<&str> = credential.trim().split('.').collect();
        let [header_b64, payload_b64, signature_b64] = segments[..] else {
            return Err(AuthError::Malformed(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        };

        BASE64_URL
            .decode(header_b64)
            .map_err(|e| AuthError::Malformed(format!("header: {}", e)))?;
        let payload = BASE64_URL
            .decode(payload_b64)
            .map_err(|e| AuthError::Malformed(format!("payload: {}", e)))?;
        let signature = BASE64_URL
            .decode(signature_b64)
            .map_err(|e| AuthError::Malformed(format!("signature: {}", e)))?;

        let expected = sign(secret, header_b64, payload_b64)?;
        if !bool::from(expected.as_slice().ct_eq(signature.as_slice())) {
            return Err(AuthError::InvalidSignature);
        }

        let claims: RawClaims = serde_json::from_slice(&payload)
            .map_err(|e| AuthError::Malformed(format!("payload json: {}", e)))?;

        let exp = claims
            .exp
            .ok_or_else(|| AuthError::InvalidClaim("exp is required".to_string()))?;
        if exp <= now {
            return Err(AuthError::Expired);
        }

        let id = claims
            .id
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AuthError::InvalidClaim("id is required".to_string()))?;
        let company_id = claims
            .company_id
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AuthError::InvalidClaim("company_id is required".to_string()))?;
        let permission_level = claims
            .permission_level
            .ok_or_else(|| AuthError::InvalidClaim("permission_level is required".to_string()))
            .and_then(|level| PermissionLevel::try_from(level).map_err(AuthError::InvalidClaim))?;

        Ok(Principal {
            id,
            company_id,
            permission_level,
        })
    }

    /// Mint a credential. Used by clients and tests; the gateway only verifies.
    pub fn issue(claims: &TokenClaims, secret: &str) -> Result<String, AuthError> {
        let header = serde_json::json!({"alg": "HS256", "typ": "JWT"});
        let header_b64 = BASE64_URL.encode(header.to_string());
        let payload = serde_json::to_vec(claims)
            .map_err(|e| AuthError::Malformed(format!("payload json: {}", e)))?;
        let payload_b64 = BASE64_URL.encode(payload);
        let signature = sign(secret, &header_b64, &payload_b64)?;
        Ok(format!(
            "{}.{}.{}",
            header_b64,
            payload_b64,
            BASE64_URL.encode(signature)
        ))
    }
}

fn sign(secret: &str, header_b64: &str, payload_b64: &str) -> Result<Vec<u8>, AuthError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::Malformed(format!("hmac key: {}", e)))?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(payload_b64.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-with-at-least-32-characters!";

    fn claims(exp: f64) -> TokenClaims {
        TokenClaims {
            id: "emp-1".to_string(),
            company_id: "acme".to_string(),
            exp,
            permission_level: 2,
        }
    }

    #[test]
    fn test_issue_then_verify() {
        let token = TokenCodec::issue(&claims(2_000.5), SECRET).unwrap();
        let principal = TokenCodec::verify_at(&token, SECRET, 1_000.0).unwrap();
        assert_eq!(principal.id, "emp-1");
        assert_eq!(principal.company_id, "acme");
        assert_eq!(principal.permission_level, PermissionLevel::Write);
    }

    #[test]
    fn test_expired_credential() {
        let token = TokenCodec::issue(&claims(1_000.0), SECRET).unwrap();
        assert_eq!(
            TokenCodec::verify_at(&token, SECRET, 1_000.0),
            Err(AuthError::Expired)
        );
        assert_eq!(
            TokenCodec::verify_at(&token, SECRET, 5_000.0),
            Err(AuthError::Expired)
        );
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let token = TokenCodec::issue(&claims(2_000.0), SECRET).unwrap();
        assert_eq!(
            TokenCodec::verify_at(&token, "another-secret-another-secret-xx", 1_000.0),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_tampered_payload_is_invalid_signature() {
        let token = TokenCodec::issue(&claims(2_000.0), SECRET).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let forged = TokenClaims {
            company_id: "globex".to_string(),
            ..claims(2_000.0)
        };
        parts[1] = BASE64_URL.encode(serde_json::to_vec(&forged).unwrap());
        assert_eq!(
            TokenCodec::verify_at(&parts.join("."), SECRET, 1_000.0),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_structural_errors_are_malformed() {
        assert!(matches!(
            TokenCodec::verify_at("abc.def", SECRET, 0.0),
            Err(AuthError::Malformed(_))
        ));
        assert!(matches!(
            TokenCodec::verify_at("a.b.c.d", SECRET, 0.0),
            Err(AuthError::Malformed(_))
        ));
        assert!(matches!(
            TokenCodec::verify_at("!!.??.**", SECRET, 0.0),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn test_padded_signature_is_accepted() {
        let token = TokenCodec::issue(&claims(2_000.0), SECRET).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        // a 32-byte HMAC encodes to 43 chars, one short of a padded quantum
        parts[2].push('=');
        assert!(TokenCodec::verify_at(&parts.join("."), SECRET, 1_000.0).is_ok());
    }

    #[test]
    fn test_invalid_permission_level_is_invalid_claim() {
        let token = TokenCodec::issue(
            &TokenClaims {
                permission_level: 9,
                ..claims(2_000.0)
            },
            SECRET,
        )
        .unwrap();
        assert!(matches!(
            TokenCodec::verify_at(&token, SECRET, 1_000.0),
            Err(AuthError::InvalidClaim(_))
        ));
    }

    #[test]
    fn test_empty_company_is_invalid_claim() {
        let token = TokenCodec::issue(
            &TokenClaims {
                company_id: String::new(),
                ..claims(2_000.0)
            },
            SECRET,
        )
        .unwrap();
        assert!(matches!(
            TokenCodec::verify_at(&token, SECRET, 1_000.0),
            Err(AuthError::InvalidClaim(_))
        ));
    }
}
