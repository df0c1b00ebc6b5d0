use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::Visibility;

/// Highest part number accepted for a multipart session
pub const MAX_PART_NUMBER: u32 = 1_000_000;

/// Request body that starts a multipart session
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct FileCreateStartBody {
    #[validate(length(min = 1, message = "Key is required"))]
    pub key: String,
    #[serde(default)]
    pub visibility: Visibility,
}

/// Response to a multipart start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MultipartUploadResponse {
    pub key: String,
    pub upload_id: String,
}

/// One accepted part, as returned by a part upload and echoed back in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPart {
    #[validate(length(min = 1, message = "Part etag is required"))]
    pub etag: String,
    #[validate(range(max = 1_000_000, message = "Invalid part number"))]
    pub part_number: u32,
}

impl UploadedPart {
    pub fn new(part_number: u32, etag: impl Into<String>) -> Self {
        Self {
            etag: etag.into(),
            part_number,
        }
    }
}

/// Check a client supplied part number.
pub fn validate_part_number(part_number: i64) -> Result<u32, String> {
    if !(0..=MAX_PART_NUMBER as i64).contains(&part_number) {
        return Err("Invalid part number".to_string());
    }
    Ok(part_number as u32)
}

/// Sort a manifest ascending by part number.
pub fn sort_manifest(parts: &mut [UploadedPart]) {
    parts.sort_by_key(|p| p.part_number);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_number_bounds() {
        assert_eq!(validate_part_number(0), Ok(0));
        assert_eq!(validate_part_number(1_000_000), Ok(1_000_000));
        assert!(validate_part_number(-1).is_err());
        assert!(validate_part_number(1_000_001).is_err());
    }

    #[test]
    fn test_manifest_wire_shape() {
        let parts: Vec<UploadedPart> =
            serde_json::from_str(r#"[{"etag":"b","partNumber":2},{"etag":"a","partNumber":1}]"#)
                .unwrap();
        let mut parts = parts;
        sort_manifest(&mut parts);
        assert_eq!(parts[0], UploadedPart::new(1, "a"));
        assert_eq!(parts[1].part_number, 2);
    }

    #[test]
    fn test_start_body_requires_key() {
        let body = FileCreateStartBody {
            key: String::new(),
            visibility: Visibility::Public,
        };
        assert!(body.validate().is_err());
    }
}
