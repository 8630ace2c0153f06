use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{
    PermissionRepository, RepositoryError, RoleFilter, RoleRepository, TokenRepository,
    UserRepository,
};
use crate::models::{Permission, Role, Token, TokenType, User};

/// In-process store implementing every repository capability.
///
/// Each map sits behind its own mutex and belongs to the instance, so tests
/// and runs never share state.
#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<HashMap<String, User>>,
    roles: Mutex<HashMap<String, Role>>,
    permissions: Mutex<HashMap<String, Permission>>,
    tokens: Mutex<HashMap<(TokenType, String), Token>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|e| RepositoryError::Backend(anyhow::anyhow!("In-memory store mutex poisoned: {}", e)))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user. Users are owned by the identity subsystem,
    /// so this is the only write path.
    pub fn put_user(&self, user: User) -> Result<(), RepositoryError> {
        lock(&self.users)?.insert(user.id.clone(), user);
        Ok(())
    }

    /// Insert or replace a role, bypassing the admin rules. Used for seeding.
    pub fn put_role(&self, role: Role) -> Result<(), RepositoryError> {
        lock(&self.roles)?.insert(role.id.clone(), role);
        Ok(())
    }

    /// Insert or replace a permission. Used for seeding.
    pub fn put_permission(&self, permission: Permission) -> Result<(), RepositoryError> {
        lock(&self.permissions)?.insert(permission.id.clone(), permission);
        Ok(())
    }

    /// Number of stored tokens of `token_type`.
    pub fn token_count(&self, token_type: TokenType) -> Result<usize, RepositoryError> {
        Ok(lock(&self.tokens)?
            .keys()
            .filter(|(t, _)| *t == token_type)
            .count())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        Ok(lock(&self.users)?.get(id).cloned())
    }
}

#[async_trait]
impl RoleRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Role>, RepositoryError> {
        Ok(lock(&self.roles)?.get(id).cloned())
    }

    async fn find_many(&self, filter: &RoleFilter) -> Result<Vec<Role>, RepositoryError> {
        Ok(lock(&self.roles)?
            .values()
            .filter(|role| filter.matches(role))
            .cloned()
            .collect())
    }

    async fn insert(&self, role: &Role) -> Result<(), RepositoryError> {
        let mut roles = lock(&self.roles)?;
        if roles.contains_key(&role.id) {
            return Err(RepositoryError::Duplicate);
        }
        roles.insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn update(&self, role: &Role) -> Result<bool, RepositoryError> {
        let mut roles = lock(&self.roles)?;
        match roles.get_mut(&role.id) {
            Some(existing) => {
                *existing = role.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        Ok(lock(&self.roles)?.remove(id).is_some())
    }
}

#[async_trait]
impl PermissionRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Permission>, RepositoryError> {
        Ok(lock(&self.permissions)?.get(id).cloned())
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Permission>, RepositoryError> {
        let permissions = lock(&self.permissions)?;
        Ok(ids
            .iter()
            .filter_map(|id| permissions.get(id).cloned())
            .collect())
    }

    async fn insert(&self, permission: &Permission) -> Result<(), RepositoryError> {
        let mut permissions = lock(&self.permissions)?;
        if permissions.contains_key(&permission.id) {
            return Err(RepositoryError::Duplicate);
        }
        permissions.insert(permission.id.clone(), permission.clone());
        Ok(())
    }
}

#[async_trait]
impl TokenRepository for InMemoryStore {
    async fn store_token(&self, token: &Token) -> Result<(), RepositoryError> {
        let mut tokens = lock(&self.tokens)?;
        let key = (token.token_type, token.token_value.clone());
        if tokens.contains_key(&key) {
            return Err(RepositoryError::Duplicate);
        }
        tokens.insert(key, token.clone());
        Ok(())
    }

    async fn find_token_by_value(
        &self,
        token_type: TokenType,
        value: &str,
    ) -> Result<Option<Token>, RepositoryError> {
        Ok(lock(&self.tokens)?
            .get(&(token_type, value.to_string()))
            .cloned())
    }

    async fn find_tokens_by_user(
        &self,
        token_type: TokenType,
        user_id: &str,
    ) -> Result<Vec<Token>, RepositoryError> {
        Ok(lock(&self.tokens)?
            .values()
            .filter(|t| t.token_type == token_type && t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_token(
        &self,
        token_type: TokenType,
        value: &str,
    ) -> Result<bool, RepositoryError> {
        Ok(lock(&self.tokens)?
            .remove(&(token_type, value.to_string()))
            .is_some())
    }

    async fn delete_tokens_by_user(
        &self,
        token_type: TokenType,
        user_id: &str,
    ) -> Result<u64, RepositoryError> {
        let mut tokens = lock(&self.tokens)?;
        let before = tokens.len();
        tokens.retain(|_, t| !(t.token_type == token_type && t.user_id == user_id));
        Ok((before - tokens.len()) as u64)
    }

    async fn delete_expired_tokens(&self) -> Result<u64, RepositoryError> {
        let mut tokens = lock(&self.tokens)?;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired());
        Ok((before - tokens.len()) as u64)
    }

    async fn consume_token(
        &self,
        token_type: TokenType,
        value: &str,
    ) -> Result<Option<Token>, RepositoryError> {
        Ok(lock(&self.tokens)?.remove(&(token_type, value.to_string())))
    }
}
