//! Role and permission administration rules.
//!
//! System-default roles are immutable, role names are unique within an
//! organization, and roles may only reference existing permissions.

use std::collections::HashSet;
use std::sync::Arc;

use validator::Validate;

use crate::models::{CreatePermissionRequest, CreateRoleRequest, Permission, Role, UpdateRoleRequest};
use crate::repository::{PermissionRepository, RepositoryError, RoleFilter, RoleRepository};
use crate::services::RbacError;

#[derive(Clone)]
pub struct RoleAdminService {
    roles: Arc<dyn RoleRepository>,
    permissions: Arc<dyn PermissionRepository>,
}

impl RoleAdminService {
    pub fn new(roles: Arc<dyn RoleRepository>, permissions: Arc<dyn PermissionRepository>) -> Self {
        Self { roles, permissions }
    }

    pub async fn create_permission(
        &self,
        req: CreatePermissionRequest,
    ) -> Result<Permission, RbacError> {
        req.validate()
            .map_err(|e| RbacError::InvalidPermissions(e.to_string()))?;

        let mut permission = Permission::new(req.name, req.resource, req.action);
        permission.description = req.description;
        permission.organization_id = req.organization_id.filter(|o| !o.is_empty());

        self.permissions.insert(&permission).await?;
        tracing::info!(
            permission_id = %permission.id,
            resource = %permission.resource,
            action = %permission.action,
            "Permission created"
        );
        Ok(permission)
    }

    pub async fn create_role(&self, req: CreateRoleRequest) -> Result<Role, RbacError> {
        req.validate()?;

        let organization_id = req.organization_id.filter(|o| !o.is_empty());
        self.ensure_name_available(&req.name, organization_id.as_deref(), None)
            .await?;
        let permission_ids = self.checked_permission_ids(req.permission_ids).await?;

        let mut role = Role::new(req.name, organization_id).with_permissions(permission_ids);
        role.description = req.description;

        self.roles.insert(&role).await.map_err(|e| match e {
            RepositoryError::Duplicate => RbacError::DuplicateRoleName,
            other => RbacError::Repository(other),
        })?;
        tracing::info!(role_id = %role.id, role = %role.name, "Role created");
        Ok(role)
    }

    pub async fn update_role(&self, role_id: &str, req: UpdateRoleRequest) -> Result<Role, RbacError> {
        req.validate()?;

        let mut role = self.load_mutable_role(role_id).await?;

        if let Some(name) = req.name {
            if name != role.name {
                self.ensure_name_available(&name, role.organization(), Some(&role.id))
                    .await?;
                role.name = name;
            }
        }
        if let Some(description) = req.description {
            role.description = Some(description);
        }
        if let Some(permission_ids) = req.permission_ids {
            role.permission_ids = self.checked_permission_ids(permission_ids).await?;
        }

        if !self.roles.update(&role).await? {
            return Err(RbacError::RoleNotFound);
        }
        tracing::info!(role_id = %role.id, role = %role.name, "Role updated");
        Ok(role)
    }

    pub async fn delete_role(&self, role_id: &str) -> Result<(), RbacError> {
        let role = self.load_mutable_role(role_id).await?;
        if !self.roles.delete(&role.id).await? {
            return Err(RbacError::RoleNotFound);
        }
        tracing::info!(role_id = %role.id, role = %role.name, "Role deleted");
        Ok(())
    }

    async fn load_mutable_role(&self, role_id: &str) -> Result<Role, RbacError> {
        let role = self
            .roles
            .find_by_id(role_id)
            .await?
            .ok_or(RbacError::RoleNotFound)?;
        if role.is_system_default {
            tracing::warn!(role_id = %role.id, role = %role.name, "Rejected change to system default role");
            return Err(RbacError::SystemRoleModification);
        }
        Ok(role)
    }

    async fn ensure_name_available(
        &self,
        name: &str,
        organization_id: Option<&str>,
        except_role_id: Option<&str>,
    ) -> Result<(), RbacError> {
        let taken = self
            .roles
            .find_many(&RoleFilter::by_name(name))
            .await?
            .iter()
            .any(|r| r.organization() == organization_id && Some(r.id.as_str()) != except_role_id);
        if taken {
            return Err(RbacError::DuplicateRoleName);
        }
        Ok(())
    }

    /// De-duplicate `ids` and verify each refers to an existing permission.
    async fn checked_permission_ids(&self, ids: Vec<String>) -> Result<Vec<String>, RbacError> {
        let mut seen = HashSet::new();
        let ids: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        if ids.is_empty() {
            return Ok(ids);
        }

        let found: HashSet<String> = self
            .permissions
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        let missing: Vec<&str> = ids
            .iter()
            .filter(|id| !found.contains(*id))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(RbacError::InvalidPermissions(format!(
                "unknown permission ids: {}",
                missing.join(", ")
            )));
        }
        Ok(ids)
    }
}
