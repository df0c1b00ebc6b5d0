use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use super::Principal;

/// Visibility tier of a stored object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "file_visibility", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    /// Any principal
    Public,
    /// Same company
    Internal,
    /// Same employee and company
    #[default]
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "PUBLIC",
            Visibility::Internal => "INTERNAL",
            Visibility::Private => "PRIVATE",
        }
    }

    /// Evaluate this tier for a record owned by `owner_id`/`owner_company`.
    pub fn permits(&self, owner_id: &str, owner_company: &str, principal: &Principal) -> bool {
        match self {
            Visibility::Public => true,
            Visibility::Internal => owner_company == principal.company_id,
            Visibility::Private => {
                owner_id == principal.id && owner_company == principal.company_id
            }
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PUBLIC" => Ok(Visibility::Public),
            "INTERNAL" => Ok(Visibility::Internal),
            "PRIVATE" => Ok(Visibility::Private),
            _ => Err(format!(
                "Invalid visibility: {}. Must be one of PUBLIC, INTERNAL, PRIVATE",
                s
            )),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility grant for one object key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FileAccessRecord {
    pub key: String,
    pub employee_id: String,
    pub company_id: String,
    pub visibility: Visibility,
}

impl FileAccessRecord {
    pub fn for_principal(key: impl Into<String>, principal: &Principal, visibility: Visibility) -> Self {
        Self {
            key: key.into(),
            employee_id: principal.id.clone(),
            company_id: principal.company_id.clone(),
            visibility,
        }
    }

    pub fn grants(&self, principal: &Principal) -> bool {
        self.visibility
            .permits(&self.employee_id, &self.company_id, principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PermissionLevel;

    fn owner() -> Principal {
        Principal::new("emp-1", "acme", PermissionLevel::Write)
    }

    #[test]
    fn test_visibility_tiers() {
        let coworker = Principal::new("emp-2", "acme", PermissionLevel::Read);
        let outsider = Principal::new("emp-1", "globex", PermissionLevel::Read);

        let public = FileAccessRecord::for_principal("a", &owner(), Visibility::Public);
        assert!(public.grants(&outsider));

        let internal = FileAccessRecord::for_principal("b", &owner(), Visibility::Internal);
        assert!(internal.grants(&coworker));
        assert!(!internal.grants(&outsider));

        let private = FileAccessRecord::for_principal("c", &owner(), Visibility::Private);
        assert!(private.grants(&owner()));
        assert!(!private.grants(&coworker));
        // same employee id under a different company is a different principal
        assert!(!private.grants(&outsider));
    }

    #[test]
    fn test_visibility_parse_case_insensitive() {
        assert_eq!("public".parse::<Visibility>().unwrap(), Visibility::Public);
        assert_eq!("Internal".parse::<Visibility>().unwrap(), Visibility::Internal);
        assert!("secret".parse::<Visibility>().is_err());
        assert_eq!(
            serde_json::to_string(&Visibility::Private).unwrap(),
            "\"PRIVATE\""
        );
    }
}
