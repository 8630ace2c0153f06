//! Role-based access control core.
//!
//! Access decisions over users, roles and wildcard permissions, plus the
//! lifecycle of access, refresh, password-reset and email-verification
//! tokens. Storage is reached only through the traits in [`repository`].

pub mod config;
pub mod models;
pub mod repository;
pub mod services;

use secrecy::ExposeSecret;
use std::sync::Arc;

use crate::config::RbacConfig;
use crate::repository::{PermissionRepository, RoleRepository, TokenRepository, UserRepository};
use crate::services::{
    AccessControlService, Catalog, PermissionResolver, RbacError, RoleAdminService, TokenService,
    TokenSettings,
};

/// Every service wired against one backing store.
#[derive(Clone)]
pub struct RbacState {
    pub access: AccessControlService,
    pub roles: RoleAdminService,
    pub tokens: TokenService,
}

impl RbacState {
    /// Build the services from configuration.
    pub fn from_config<S>(config: &RbacConfig, store: Arc<S>) -> Result<Self, RbacError>
    where
        S: UserRepository + RoleRepository + PermissionRepository + TokenRepository + 'static,
    {
        Self::new(
            store,
            config.jwt.secret.expose_secret().as_bytes(),
            config.token_settings(),
            config.catalog(),
        )
    }

    pub fn new<S>(
        store: Arc<S>,
        secret: &[u8],
        settings: TokenSettings,
        catalog: Option<Arc<dyn Catalog>>,
    ) -> Result<Self, RbacError>
    where
        S: UserRepository + RoleRepository + PermissionRepository + TokenRepository + 'static,
    {
        let users: Arc<dyn UserRepository> = store.clone();
        let roles: Arc<dyn RoleRepository> = store.clone();
        let permissions: Arc<dyn PermissionRepository> = store.clone();
        let tokens: Arc<dyn TokenRepository> = store;

        let resolver = PermissionResolver::new(users, roles.clone(), permissions.clone());
        Ok(Self {
            access: AccessControlService::new(resolver, catalog),
            roles: RoleAdminService::new(roles, permissions),
            tokens: TokenService::new(secret, settings, tokens)?,
        })
    }
}
