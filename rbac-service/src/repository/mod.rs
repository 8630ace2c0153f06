//! Storage capabilities consumed by the access-control and token services.
//!
//! Lookups return `Ok(None)` when the record does not exist; the service
//! layer turns that into the matching domain error.

mod memory;
mod mongo;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Permission, Role, Token, TokenType, User};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Duplicate record")]
    Duplicate,

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Criteria for [`RoleRepository::find_many`]. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct RoleFilter {
    pub name: Option<String>,
    pub organization_id: Option<String>,
}

impl RoleFilter {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            organization_id: None,
        }
    }

    pub fn matches(&self, role: &Role) -> bool {
        self.name.as_ref().map_or(true, |name| &role.name == name)
            && self
                .organization_id
                .as_deref()
                .map_or(true, |org| role.organization_id.as_deref() == Some(org))
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Role>, RepositoryError>;
    async fn find_many(&self, filter: &RoleFilter) -> Result<Vec<Role>, RepositoryError>;
    async fn insert(&self, role: &Role) -> Result<(), RepositoryError>;
    /// Replace the stored role with the same id. Returns `false` if none exists.
    async fn update(&self, role: &Role) -> Result<bool, RepositoryError>;
    async fn delete(&self, id: &str) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Permission>, RepositoryError>;
    /// Permissions for `ids` in request order; unknown ids are omitted.
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Permission>, RepositoryError>;
    async fn insert(&self, permission: &Permission) -> Result<(), RepositoryError>;
}

/// Token store. `(token_type, token_value)` is unique; storing a duplicate
/// fails with [`RepositoryError::Duplicate`].
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn store_token(&self, token: &Token) -> Result<(), RepositoryError>;
    async fn find_token_by_value(
        &self,
        token_type: TokenType,
        value: &str,
    ) -> Result<Option<Token>, RepositoryError>;
    async fn find_tokens_by_user(
        &self,
        token_type: TokenType,
        user_id: &str,
    ) -> Result<Vec<Token>, RepositoryError>;
    async fn delete_token(&self, token_type: TokenType, value: &str)
        -> Result<bool, RepositoryError>;
    async fn delete_tokens_by_user(
        &self,
        token_type: TokenType,
        user_id: &str,
    ) -> Result<u64, RepositoryError>;
    async fn delete_expired_tokens(&self) -> Result<u64, RepositoryError>;

    /// Remove and return a token in one step.
    ///
    /// Backends must override this with an atomic find-and-delete; the
    /// default lets two concurrent callers both observe the record.
    async fn consume_token(
        &self,
        token_type: TokenType,
        value: &str,
    ) -> Result<Option<Token>, RepositoryError> {
        let token = self.find_token_by_value(token_type, value).await?;
        if token.is_some() && !self.delete_token(token_type, value).await? {
            return Ok(None);
        }
        Ok(token)
    }
}
