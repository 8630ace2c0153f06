//! Resolution of a user's effective roles and permissions.
//!
//! Role and permission loads are best-effort: a record that is missing or
//! fails to load is logged and skipped, never fatal. Only the user lookup
//! surfaces errors.

use std::collections::HashSet;
use std::sync::Arc;

use crate::models::{Permission, Role, User};
use crate::repository::{PermissionRepository, RoleRepository, UserRepository};
use crate::services::RbacError;

#[derive(Clone)]
pub struct PermissionResolver {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    permissions: Arc<dyn PermissionRepository>,
}

impl PermissionResolver {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        permissions: Arc<dyn PermissionRepository>,
    ) -> Self {
        Self {
            users,
            roles,
            permissions,
        }
    }

    pub async fn load_user(&self, user_id: &str) -> Result<User, RbacError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(RbacError::UserNotFound)
    }

    pub async fn load_role(&self, role_id: &str) -> Option<Role> {
        match self.roles.find_by_id(role_id).await {
            Ok(Some(role)) => Some(role),
            Ok(None) => {
                tracing::warn!(role_id = %role_id, "Assigned role does not exist, skipping");
                None
            }
            Err(e) => {
                tracing::warn!(role_id = %role_id, error = %e, "Failed to load role, skipping");
                None
            }
        }
    }

    /// Roles held by `user` that take part in a request scoped to `org_id`.
    pub async fn resolve_roles(&self, user: &User, org_id: Option<&str>) -> Vec<Role> {
        let mut roles = Vec::with_capacity(user.role_ids.len());
        for role_id in user.unique_role_ids() {
            let Some(role) = self.load_role(role_id).await else {
                continue;
            };
            if role.applies_to_org(org_id) {
                roles.push(role);
            } else {
                tracing::debug!(
                    user_id = %user.id,
                    role = %role.name,
                    org_id = ?org_id,
                    "Role excluded by organization scope"
                );
            }
        }
        roles
    }

    /// Permissions granted by `role`.
    ///
    /// If the batch lookup fails, each id is retried on its own so one bad
    /// record does not hide the rest.
    pub async fn role_permissions(&self, role: &Role) -> Vec<Permission> {
        if role.permission_ids.is_empty() {
            return Vec::new();
        }
        match self.permissions.find_by_ids(&role.permission_ids).await {
            Ok(permissions) => permissions,
            Err(e) => {
                tracing::warn!(
                    role = %role.name,
                    error = %e,
                    "Batch permission lookup failed, loading individually"
                );
                let mut permissions = Vec::with_capacity(role.permission_ids.len());
                for id in &role.permission_ids {
                    match self.permissions.find_by_id(id).await {
                        Ok(Some(permission)) => permissions.push(permission),
                        Ok(None) => {}
                        Err(e) => tracing::warn!(
                            permission_id = %id,
                            error = %e,
                            "Failed to load permission, skipping"
                        ),
                    }
                }
                permissions
            }
        }
    }

    /// Union of permissions across the user's applicable roles, de-duplicated by id.
    pub async fn resolve_permissions(&self, user: &User, org_id: Option<&str>) -> Vec<Permission> {
        let mut seen = HashSet::new();
        let mut permissions = Vec::new();
        for role in self.resolve_roles(user, org_id).await {
            for permission in self.role_permissions(&role).await {
                if seen.insert(permission.id.clone()) {
                    permissions.push(permission);
                }
            }
        }
        permissions
    }
}
