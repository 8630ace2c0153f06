//! Role model - optionally organization-scoped bundles of permissions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Role entity.
///
/// A role without an organization is system-wide. System-default roles are
/// immutable and apply in every organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<String>,
    #[serde(default)]
    pub is_system_default: bool,
}

impl Role {
    /// Create a new role.
    pub fn new(name: String, organization_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description: None,
            organization_id,
            permission_ids: Vec::new(),
            is_system_default: false,
        }
    }

    pub fn with_permissions<I, S>(mut self, permission_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permission_ids = permission_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn system_default(mut self) -> Self {
        self.is_system_default = true;
        self
    }

    /// Owning organization; an empty id counts as system-wide.
    pub fn organization(&self) -> Option<&str> {
        self.organization_id.as_deref().filter(|o| !o.is_empty())
    }

    /// Whether this role takes part in a request scoped to `org_id`.
    ///
    /// Only an org-scoped, non-default role facing a different non-empty
    /// organization is excluded.
    pub fn applies_to_org(&self, org_id: Option<&str>) -> bool {
        if self.is_system_default {
            return true;
        }
        match (org_id.filter(|o| !o.is_empty()), self.organization()) {
            (Some(requested), Some(own)) => requested == own,
            _ => true,
        }
    }
}

/// Request to create a role.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub description: Option<String>,
    pub organization_id: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<String>,
}

/// Partial update of a role. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub permission_ids: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_wide_role_applies_everywhere() {
        let role = Role::new("Viewer".to_string(), None);
        assert!(role.applies_to_org(None));
        assert!(role.applies_to_org(Some("org-1")));
    }

    #[test]
    fn test_empty_organization_is_system_wide() {
        let role = Role::new("Viewer".to_string(), Some(String::new()));
        assert_eq!(role.organization(), None);
        assert!(role.applies_to_org(Some("org-2")));
    }

    #[test]
    fn test_org_scoped_role_excluded_from_other_org() {
        let role = Role::new("Editor".to_string(), Some("org-1".to_string()));
        assert!(role.applies_to_org(Some("org-1")));
        assert!(!role.applies_to_org(Some("org-2")));
        assert!(role.applies_to_org(None));
        assert!(role.applies_to_org(Some("")));
    }

    #[test]
    fn test_system_default_role_never_excluded() {
        let role = Role::new("Admin".to_string(), Some("org-1".to_string())).system_default();
        assert!(role.applies_to_org(Some("org-2")));
    }
}
