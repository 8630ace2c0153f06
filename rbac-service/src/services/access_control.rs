//! Access checks and derived resource/action inventories.
//!
//! Every call re-reads the current role and permission state; nothing is
//! cached between calls.

use std::collections::BTreeSet;
use std::sync::Arc;

use validator::Validate;

use crate::models::{AccessRequest, AccessResponse, MatchKind, Permission, Role, WILDCARD};
use crate::services::{Catalog, PermissionResolver, RbacError};

#[derive(Clone)]
pub struct AccessControlService {
    resolver: PermissionResolver,
    catalog: Option<Arc<dyn Catalog>>,
}

/// Best match found while evaluating a detailed check.
struct Grant<'a> {
    kind: MatchKind,
    role: &'a Role,
    permission: Permission,
}

impl AccessControlService {
    pub fn new(resolver: PermissionResolver, catalog: Option<Arc<dyn Catalog>>) -> Self {
        Self { resolver, catalog }
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    /// Decide whether the request is allowed.
    ///
    /// Roles are evaluated in assignment order and the first matching
    /// permission wins. Inactive users are always denied.
    pub async fn check_access(&self, req: &AccessRequest) -> Result<bool, RbacError> {
        req.validate()?;
        let user = self.resolver.load_user(&req.user_id).await?;

        if !user.active {
            tracing::info!(user_id = %user.id, "Access denied: user is inactive");
            return Ok(false);
        }

        for role_id in user.unique_role_ids() {
            let Some(role) = self.resolver.load_role(role_id).await else {
                continue;
            };
            if !role.applies_to_org(req.org()) {
                continue;
            }
            let permissions = self.resolver.role_permissions(&role).await;
            if let Some(permission) = permissions
                .iter()
                .find(|p| p.matches(&req.resource, &req.action).is_some())
            {
                tracing::debug!(
                    user_id = %user.id,
                    resource = %req.resource,
                    action = %req.action,
                    role = %role.name,
                    permission = %permission.display_name(),
                    "Access granted"
                );
                return Ok(true);
            }
        }

        tracing::debug!(
            user_id = %user.id,
            resource = %req.resource,
            action = %req.action,
            org_id = ?req.org(),
            "Access denied: no matching permission"
        );
        Ok(false)
    }

    /// Same decision as [`check_access`](Self::check_access), with an explanation,
    /// the most specific matching permission and every role considered.
    pub async fn check_access_detailed(
        &self,
        req: &AccessRequest,
    ) -> Result<AccessResponse, RbacError> {
        req.validate()?;
        let user = self.resolver.load_user(&req.user_id).await?;

        if !user.active {
            return Ok(AccessResponse::denied(
                format!("Access denied: user '{}' is inactive", user.username),
                Vec::new(),
            ));
        }

        let roles = self.resolver.resolve_roles(&user, req.org()).await;
        let user_roles: Vec<String> = roles.iter().map(|r| r.name.clone()).collect();

        if roles.is_empty() {
            return Ok(AccessResponse::denied(
                format!(
                    "Access denied: user '{}' holds no roles applicable to this request",
                    user.username
                ),
                user_roles,
            ));
        }

        let mut best: Option<Grant<'_>> = None;
        for role in &roles {
            for permission in self.resolver.role_permissions(role).await {
                let Some(kind) = permission.matches(&req.resource, &req.action) else {
                    continue;
                };
                if best.as_ref().map_or(true, |b| kind < b.kind) {
                    best = Some(Grant {
                        kind,
                        role,
                        permission,
                    });
                }
            }
            if matches!(best, Some(Grant { kind: MatchKind::Exact, .. })) {
                break;
            }
        }

        let response = match best {
            Some(grant) => {
                let rule = grant.permission.display_name();
                AccessResponse::granted(
                    format!(
                        "Access granted: role '{}' allows '{}' on '{}' via permission '{}'",
                        grant.role.name, req.action, req.resource, rule
                    ),
                    rule,
                    user_roles,
                )
            }
            None => AccessResponse::denied(
                format!(
                    "Access denied: none of the user's roles allow '{}' on '{}'",
                    req.action, req.resource
                ),
                user_roles,
            ),
        };

        tracing::debug!(
            user_id = %user.id,
            resource = %req.resource,
            action = %req.action,
            allowed = response.allowed,
            matched_rule = ?response.matched_rule,
            "Detailed access check"
        );
        Ok(response)
    }

    /// Detailed check that turns a denial into [`RbacError::AccessDenied`].
    pub async fn require_access(&self, req: &AccessRequest) -> Result<AccessResponse, RbacError> {
        let response = self.check_access_detailed(req).await?;
        if response.allowed {
            Ok(response)
        } else {
            Err(RbacError::AccessDenied {
                resource: req.resource.clone(),
                action: req.action.clone(),
            })
        }
    }

    /// Union of the user's permissions across all roles, de-duplicated by id.
    pub async fn get_user_permissions(&self, user_id: &str) -> Result<Vec<Permission>, RbacError> {
        let user = self.resolver.load_user(user_id).await?;
        Ok(self.resolver.resolve_permissions(&user, None).await)
    }

    /// Like [`get_user_permissions`](Self::get_user_permissions), excluding
    /// roles scoped to another organization.
    pub async fn get_user_permissions_in_org(
        &self,
        user_id: &str,
        org_id: &str,
    ) -> Result<Vec<Permission>, RbacError> {
        let user = self.resolver.load_user(user_id).await?;
        Ok(self.resolver.resolve_permissions(&user, Some(org_id)).await)
    }

    /// Distinct resources the user holds any permission on, sorted.
    ///
    /// A wildcard resource expands to the catalog's resources, or stays as
    /// `"*"` when no catalog can answer.
    pub async fn get_user_resources(&self, user_id: &str) -> Result<Vec<String>, RbacError> {
        let permissions = self.get_user_permissions(user_id).await?;

        let mut resources = BTreeSet::new();
        let mut wildcard = false;
        for permission in &permissions {
            if permission.has_wildcard_resource() {
                wildcard = true;
            } else {
                resources.insert(permission.resource.clone());
            }
        }

        if wildcard {
            resources.extend(self.expand_resources().await);
        }
        Ok(resources.into_iter().collect())
    }

    /// Distinct actions the user may perform on `resource`, sorted.
    ///
    /// A wildcard action expands to the catalog's actions for `resource`, or
    /// stays as `"*"` when no catalog can answer.
    pub async fn get_user_actions(
        &self,
        user_id: &str,
        resource: &str,
    ) -> Result<Vec<String>, RbacError> {
        if resource.is_empty() {
            return Err(RbacError::InvalidInput("resource is required".to_string()));
        }
        let permissions = self.get_user_permissions(user_id).await?;

        let mut actions = BTreeSet::new();
        let mut wildcard = false;
        for permission in permissions
            .iter()
            .filter(|p| p.resource == resource || p.has_wildcard_resource())
        {
            if permission.has_wildcard_action() {
                wildcard = true;
            } else {
                actions.insert(permission.action.clone());
            }
        }

        if wildcard {
            actions.extend(self.expand_actions(resource).await);
        }
        Ok(actions.into_iter().collect())
    }

    /// Unscoped access check.
    pub async fn has_permission(
        &self,
        user_id: &str,
        resource: &str,
        action: &str,
    ) -> Result<bool, RbacError> {
        self.check_access(&AccessRequest::new(user_id, resource, action))
            .await
    }

    async fn expand_resources(&self) -> Vec<String> {
        let Some(catalog) = &self.catalog else {
            return vec![WILDCARD.to_string()];
        };
        match catalog.list_resources().await {
            Ok(resources) if !resources.is_empty() => resources,
            Ok(_) => vec![WILDCARD.to_string()],
            Err(e) => {
                tracing::warn!(error = %e, "Resource catalog unavailable, returning wildcard");
                vec![WILDCARD.to_string()]
            }
        }
    }

    async fn expand_actions(&self, resource: &str) -> Vec<String> {
        let Some(catalog) = &self.catalog else {
            return vec![WILDCARD.to_string()];
        };
        match catalog.list_actions(resource).await {
            Ok(actions) if !actions.is_empty() => actions,
            Ok(_) => vec![WILDCARD.to_string()],
            Err(e) => {
                tracing::warn!(
                    resource = %resource,
                    error = %e,
                    "Action catalog unavailable, returning wildcard"
                );
                vec![WILDCARD.to_string()]
            }
        }
    }
}
