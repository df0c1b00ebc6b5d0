use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission level carried in the credential.
///
/// Serialized as its integer value (`1`, `2`, `3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum PermissionLevel {
    Read = 1,
    Write = 2,
    Admin = 3,
}

impl TryFrom<i64> for PermissionLevel {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PermissionLevel::Read),
            2 => Ok(PermissionLevel::Write),
            3 => Ok(PermissionLevel::Admin),
            other => Err(format!("invalid permission level: {}", other)),
        }
    }
}

impl From<PermissionLevel> for i64 {
    fn from(level: PermissionLevel) -> Self {
        level as i64
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Read => write!(f, "read"),
            PermissionLevel::Write => write!(f, "write"),
            PermissionLevel::Admin => write!(f, "admin"),
        }
    }
}

/// The authenticated employee attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub company_id: String,
    pub permission_level: PermissionLevel,
}

impl Principal {
    pub fn new(
        id: impl Into<String>,
        company_id: impl Into<String>,
        permission_level: PermissionLevel,
    ) -> Self {
        Self {
            id: id.into(),
            company_id: company_id.into(),
            permission_level,
        }
    }

    /// Both identifiers are present.
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.company_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_level_serializes_as_integer() {
        let principal = Principal::new("emp-1", "acme", PermissionLevel::Write);
        let json = serde_json::to_value(&principal).unwrap();
        assert_eq!(json["permission_level"], 2);

        let parsed: Principal = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, principal);
    }

    #[test]
    fn test_permission_level_rejects_unknown_value() {
        let result: Result<PermissionLevel, _> = serde_json::from_str("7");
        assert!(result.is_err());
    }
}
