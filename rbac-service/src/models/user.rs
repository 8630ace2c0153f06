use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// User identity as seen by the access-control core.
///
/// Owned by the identity subsystem; this crate only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub active: bool,
    #[serde(default)]
    pub role_ids: Vec<String>,
    #[serde(default)]
    pub organization_ids: Vec<String>,
}

impl User {
    pub fn new(username: String, email: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            active: true,
            role_ids: Vec::new(),
            organization_ids: Vec::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, role_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_ids = role_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_organizations<I, S>(mut self, organization_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.organization_ids = organization_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Assigned role ids with duplicates dropped, first occurrence kept.
    pub fn unique_role_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.role_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}
