//! Per-call access-check request and response. Neither is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AccessRequest {
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "resource is required"))]
    pub resource: String,
    #[validate(length(min = 1, message = "action is required"))]
    pub action: String,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl AccessRequest {
    pub fn new(
        user_id: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            resource: resource.into(),
            action: action.into(),
            org_id: None,
            context: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn in_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Organization scope; empty counts as unscoped.
    pub fn org(&self) -> Option<&str> {
        self.org_id.as_deref().filter(|o| !o.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessResponse {
    pub allowed: bool,
    pub explanation: String,
    pub matched_rule: Option<String>,
    pub user_roles: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl AccessResponse {
    pub fn granted(explanation: String, matched_rule: String, user_roles: Vec<String>) -> Self {
        Self {
            allowed: true,
            explanation,
            matched_rule: Some(matched_rule),
            user_roles,
            timestamp: Utc::now(),
        }
    }

    pub fn denied(explanation: String, user_roles: Vec<String>) -> Self {
        Self {
            allowed: false,
            explanation,
            matched_rule: None,
            user_roles,
            timestamp: Utc::now(),
        }
    }
}
