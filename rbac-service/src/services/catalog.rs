//! Resource and action inventories used to expand wildcard permissions.

use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Every resource known to the system.
    async fn list_resources(&self) -> Result<Vec<String>, anyhow::Error>;
    /// Every action that applies to `resource`.
    async fn list_actions(&self, resource: &str) -> Result<Vec<String>, anyhow::Error>;
}

/// Catalog fixed at startup, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    resources: Vec<String>,
    default_actions: Vec<String>,
    actions: HashMap<String, Vec<String>>,
}

impl StaticCatalog {
    /// `default_actions` apply to every resource without its own action list.
    pub fn new(resources: Vec<String>, default_actions: Vec<String>) -> Self {
        Self {
            resources,
            default_actions,
            actions: HashMap::new(),
        }
    }

    pub fn with_actions(mut self, resource: impl Into<String>, actions: Vec<String>) -> Self {
        self.actions.insert(resource.into(), actions);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.default_actions.is_empty() && self.actions.is_empty()
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn list_resources(&self) -> Result<Vec<String>, anyhow::Error> {
        Ok(self.resources.clone())
    }

    async fn list_actions(&self, resource: &str) -> Result<Vec<String>, anyhow::Error> {
        Ok(self
            .actions
            .get(resource)
            .unwrap_or(&self.default_actions)
            .clone())
    }
}
