//! Shared fixtures for rbac-service integration tests.
//!
//! Every fixture owns a fresh in-memory store, so tests never share state.

#![allow(dead_code)]

use rbac_service::models::{Permission, Role, User};
use rbac_service::repository::InMemoryStore;
use rbac_service::services::{Catalog, TokenSettings};
use rbac_service::RbacState;
use std::sync::Arc;

pub const TEST_SECRET: &[u8] = b"integration-test-secret-0123456789";

pub struct TestFixture {
    pub store: Arc<InMemoryStore>,
    pub state: RbacState,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::build(TokenSettings::default(), None)
    }

    pub fn with_settings(settings: TokenSettings) -> Self {
        Self::build(settings, None)
    }

    pub fn with_catalog(catalog: Arc<dyn Catalog>) -> Self {
        Self::build(TokenSettings::default(), Some(catalog))
    }

    fn build(settings: TokenSettings, catalog: Option<Arc<dyn Catalog>>) -> Self {
        init_test_tracing();
        let store = Arc::new(InMemoryStore::new());
        let state = RbacState::new(store.clone(), TEST_SECRET, settings, catalog)
            .expect("Failed to build services");
        Self { store, state }
    }

    pub fn permission(&self, name: &str, resource: &str, action: &str) -> Permission {
        let permission = Permission::new(name.to_string(), resource.to_string(), action.to_string());
        self.store
            .put_permission(permission.clone())
            .expect("Failed to seed permission");
        permission
    }

    pub fn role(&self, name: &str, organization_id: Option<&str>, permissions: &[&Permission]) -> Role {
        let role = Role::new(name.to_string(), organization_id.map(str::to_string))
            .with_permissions(permissions.iter().map(|p| p.id.clone()));
        self.store.put_role(role.clone()).expect("Failed to seed role");
        role
    }

    pub fn system_role(&self, name: &str, permissions: &[&Permission]) -> Role {
        let role = Role::new(name.to_string(), None)
            .with_permissions(permissions.iter().map(|p| p.id.clone()))
            .system_default();
        self.store.put_role(role.clone()).expect("Failed to seed role");
        role
    }

    pub fn user(&self, username: &str, roles: &[&Role]) -> User {
        let user = User::new(username.to_string(), format!("{}@example.com", username))
            .with_roles(roles.iter().map(|r| r.id.clone()));
        self.store.put_user(user.clone()).expect("Failed to seed user");
        user
    }

    pub fn put_user(&self, user: User) -> User {
        self.store.put_user(user.clone()).expect("Failed to seed user");
        user
    }
}

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}
