use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stored object description returned by uploads, completions and listings.
///
/// Field names follow the object-store wire shape (`httpEtag`, `storageClass`, ...).
/// Unknown fields sent by newer servers are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub key: String,
    #[serde(default)]
    pub version: String,
    pub size: u64,
    pub etag: String,
    #[serde(default)]
    pub http_etag: String,
    pub uploaded: DateTime<Utc>,
    #[serde(default)]
    pub http_metadata: HashMap<String, String>,
    #[serde(default)]
    pub custom_metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ByteRange>,
    #[serde(default)]
    pub checksums: Checksums,
    #[serde(default = "default_storage_class")]
    pub storage_class: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_storage_class() -> String {
    "Standard".to_string()
}

impl ObjectMetadata {
    pub fn new(key: impl Into<String>, size: u64, etag: impl Into<String>) -> Self {
        let etag = etag.into();
        Self {
            key: key.into(),
            version: String::new(),
            size,
            http_etag: format!("\"{}\"", etag),
            etag,
            uploaded: Utc::now(),
            http_metadata: HashMap::new(),
            custom_metadata: HashMap::new(),
            range: None,
            checksums: Checksums::default(),
            storage_class: default_storage_class(),
            extra: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksums {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectList {
    pub objects: Vec<ObjectMetadata>,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Byte range of a partial read, as resolved against the object size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

/// Requested range before the object size is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `a-b`, inclusive on both ends
    Bounded { start: u64, end: u64 },
    /// `a-`
    From { start: u64 },
    /// `-n`
    Suffix { length: u64 },
}

impl RangeSpec {
    /// Parse `bytes=a-b`, `a-b`, `a-` or `-n`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let spec = raw.trim();
        let spec = spec.strip_prefix("bytes=").unwrap_or(spec);
        let (start, end) = spec
            .split_once('-')
            .ok_or_else(|| format!("Invalid range: {}", raw))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u64>()
                .map_err(|_| format!("Invalid range: {}", raw))
        };
        match (start.trim().is_empty(), end.trim().is_empty()) {
            (true, true) => Err(format!("Invalid range: {}", raw)),
            (true, false) => Ok(RangeSpec::Suffix { length: parse(end)? }),
            (false, true) => Ok(RangeSpec::From { start: parse(start)? }),
            (false, false) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if end < start {
                    return Err(format!("Invalid range: {}", raw));
                }
                Ok(RangeSpec::Bounded { start, end })
            }
        }
    }

    /// Resolve against an object of `size` bytes. `None` when unsatisfiable.
    pub fn resolve(&self, size: u64) -> Option<ByteRange> {
        let (offset, end_exclusive) = match *self {
            RangeSpec::Bounded { start, end } => (start, end.saturating_add(1).min(size)),
            RangeSpec::From { start } => (start, size),
            RangeSpec::Suffix { length } => (size.saturating_sub(length), size),
        };
        if offset >= size || end_exclusive <= offset {
            return None;
        }
        Some(ByteRange {
            offset,
            length: end_exclusive - offset,
        })
    }
}

/// Options for a single-object read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub range: Option<RangeSpec>,
    /// Read only if the stored etag matches
    pub only_if_etag: Option<String>,
}

impl GetOptions {
    pub fn is_empty(&self) -> bool {
        self.range.is_none() && self.only_if_etag.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_parse_forms() {
        assert_eq!(
            RangeSpec::parse("bytes=0-99").unwrap(),
            RangeSpec::Bounded { start: 0, end: 99 }
        );
        assert_eq!(RangeSpec::parse("10-").unwrap(), RangeSpec::From { start: 10 });
        assert_eq!(RangeSpec::parse("-5").unwrap(), RangeSpec::Suffix { length: 5 });
        assert!(RangeSpec::parse("9-3").is_err());
        assert!(RangeSpec::parse("-").is_err());
        assert!(RangeSpec::parse("abc").is_err());
    }

    #[test]
    fn test_range_resolve_clamps_to_size() {
        let range = RangeSpec::Bounded { start: 5, end: 500 }.resolve(10).unwrap();
        assert_eq!(range, ByteRange { offset: 5, length: 5 });

        let suffix = RangeSpec::Suffix { length: 3 }.resolve(10).unwrap();
        assert_eq!(suffix, ByteRange { offset: 7, length: 3 });

        assert!(RangeSpec::From { start: 10 }.resolve(10).is_none());
    }

    #[test]
    fn test_object_metadata_keeps_unknown_fields() {
        let json = serde_json::json!({
            "key": "reports/q1.pdf",
            "version": "v1",
            "size": 12,
            "etag": "abc",
            "httpEtag": "\"abc\"",
            "uploaded": "2024-01-01T00:00:00Z",
            "storageClass": "Standard",
            "ssecKeyMd5": "zzz"
        });
        let meta: ObjectMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(meta.key, "reports/q1.pdf");
        assert_eq!(meta.extra.get("ssecKeyMd5"), Some(&serde_json::json!("zzz")));

        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["ssecKeyMd5"], "zzz");
        assert_eq!(back["httpEtag"], "\"abc\"");
    }
}
