//! Object key normalisation.

/// Normalise a client supplied key or query value: spaces become `_`,
/// leading and trailing `/` are removed.
pub fn sanitize_key(raw: &str) -> String {
    raw.replace(' ', "_").trim_matches('/').to_string()
}

/// Reject keys that cannot name an object.
pub fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("Key is required".to_string());
    }
    if key.starts_with('/') {
        return Err("Key cannot start with a slash".to_string());
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err("Key cannot contain '..' segments".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("/reports/q1 final.pdf/"), "reports/q1_final.pdf");
        assert_eq!(sanitize_key("plain"), "plain");
        assert_eq!(sanitize_key("///"), "");
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("a/b.txt").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/a").is_err());
        assert!(validate_key("a/../b").is_err());
    }
}
