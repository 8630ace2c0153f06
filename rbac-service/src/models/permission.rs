//! Permission model and the (resource, action) matching rule.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Matches any resource or any action, depending on the field it occupies.
pub const WILDCARD: &str = "*";

/// A grant of `action` on `resource`. Either field may be [`WILDCARD`].
///
/// Literal fields compare case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub is_system_default: bool,
}

/// How a permission satisfied a request, from most to least specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    /// Exact resource and exact action.
    Exact,
    /// Exact resource, wildcard action.
    AnyAction,
    /// Wildcard resource, exact action.
    AnyResource,
    /// Wildcard resource and wildcard action.
    Everything,
}

impl Permission {
    pub fn new(name: String, resource: String, action: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description: None,
            resource,
            action,
            organization_id: None,
            is_system_default: false,
        }
    }

    /// Test this permission against a requested `(resource, action)` pair.
    pub fn matches(&self, resource: &str, action: &str) -> Option<MatchKind> {
        let exact_resource = self.resource == resource;
        let exact_action = self.action == action;
        let any_resource = self.resource == WILDCARD;
        let any_action = self.action == WILDCARD;

        if exact_resource && exact_action {
            Some(MatchKind::Exact)
        } else if exact_resource && any_action {
            Some(MatchKind::AnyAction)
        } else if any_resource && exact_action {
            Some(MatchKind::AnyResource)
        } else if any_resource && any_action {
            Some(MatchKind::Everything)
        } else {
            None
        }
    }

    pub fn has_wildcard_resource(&self) -> bool {
        self.resource == WILDCARD
    }

    pub fn has_wildcard_action(&self) -> bool {
        self.action == WILDCARD
    }

    /// Name reported as the matched rule; unnamed permissions fall back to `resource:action`.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("{}:{}", self.resource, self.action)
        } else {
            self.name.clone()
        }
    }
}

/// Request to create a permission.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePermissionRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "resource must not be empty"))]
    pub resource: String,
    #[validate(length(min = 1, message = "action must not be empty"))]
    pub action: String,
    pub organization_id: Option<String>,
}
