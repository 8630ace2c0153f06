mod common;

use async_trait::async_trait;
use common::TestFixture;
use rbac_service::models::{AccessRequest, Permission, Role, User};
use rbac_service::repository::{
    InMemoryStore, PermissionRepository, RepositoryError, RoleFilter, RoleRepository,
    UserRepository,
};
use rbac_service::services::{AccessControlService, PermissionResolver, RbacError, StaticCatalog};
use std::sync::Arc;

#[tokio::test]
async fn test_wildcard_admin_allows_everything() {
    let fx = TestFixture::new();
    let all = fx.permission("admin-all", "*", "*");
    let admin = fx.role("Admin", None, &[&all]);
    let user = fx.user("alice", &[&admin]);

    let req = AccessRequest::new(&user.id, "users", "delete");
    assert!(fx.state.access.check_access(&req).await.unwrap());

    let detailed = fx.state.access.check_access_detailed(&req).await.unwrap();
    assert!(detailed.allowed);
    assert_eq!(detailed.matched_rule.as_deref(), Some("admin-all"));
    assert_eq!(detailed.user_roles, vec!["Admin".to_string()]);
    assert!(detailed.explanation.contains("Admin"));
}

#[tokio::test]
async fn test_viewer_cannot_update() {
    let fx = TestFixture::new();
    let read = fx.permission("users-read", "users", "read");
    let viewer = fx.role("Viewer", None, &[&read]);
    let user = fx.user("bob", &[&viewer]);

    assert!(fx
        .state
        .access
        .check_access(&AccessRequest::new(&user.id, "users", "read"))
        .await
        .unwrap());

    let update = AccessRequest::new(&user.id, "users", "update");
    assert!(!fx.state.access.check_access(&update).await.unwrap());

    let detailed = fx.state.access.check_access_detailed(&update).await.unwrap();
    assert!(!detailed.allowed);
    assert!(detailed.matched_rule.is_none());
    assert_eq!(detailed.user_roles, vec!["Viewer".to_string()]);
}

#[tokio::test]
async fn test_org_scoped_role_excluded_for_other_org() {
    let fx = TestFixture::new();
    let write = fx.permission("docs-write", "documents", "write");
    let scoped = fx.role("R", Some("O1"), &[&write]);
    let user = fx.put_user(
        User::new("carol".to_string(), "carol@example.com".to_string())
            .with_roles([scoped.id.clone()])
            .with_organizations(["O1", "O2"]),
    );

    let base = AccessRequest::new(&user.id, "documents", "write");
    let access = &fx.state.access;

    assert!(!access
        .check_access(&base.clone().in_org("O2"))
        .await
        .unwrap());
    assert!(access.check_access(&base.clone().in_org("O1")).await.unwrap());
    assert!(access.check_access(&base).await.unwrap());
    // An empty org id is the same as none.
    assert!(access.check_access(&base.clone().in_org("")).await.unwrap());

    let detailed = access
        .check_access_detailed(&base.in_org("O2"))
        .await
        .unwrap();
    assert!(!detailed.allowed);
    assert!(detailed.user_roles.is_empty());
}

#[tokio::test]
async fn test_system_default_role_applies_in_every_org() {
    let fx = TestFixture::new();
    let read = fx.permission("audit-read", "audit", "read");
    let mut role = Role::new("Auditor".to_string(), Some("O1".to_string()))
        .with_permissions([read.id.clone()])
        .system_default();
    role.description = Some("Platform auditor".to_string());
    fx.store.put_role(role.clone()).unwrap();
    let user = fx.user("dave", &[&role]);

    let req = AccessRequest::new(&user.id, "audit", "read").in_org("O9");
    assert!(fx.state.access.check_access(&req).await.unwrap());
}

#[tokio::test]
async fn test_identical_state_gives_identical_answers() {
    let fx = TestFixture::new();
    let read = fx.permission("", "reports", "read");
    let any = fx.permission("reports-any", "reports", "*");
    let r1 = fx.role("Reader", None, &[&read]);
    let r2 = fx.role("Reporter", Some("O1"), &[&any]);
    let user = fx.user("erin", &[&r1, &r2]);

    let req = AccessRequest::new(&user.id, "reports", "export").in_org("O1");
    let first = fx.state.access.check_access_detailed(&req).await.unwrap();
    for _ in 0..5 {
        let again = fx.state.access.check_access_detailed(&req).await.unwrap();
        assert_eq!(again.allowed, first.allowed);
        assert_eq!(again.matched_rule, first.matched_rule);
        assert_eq!(again.user_roles, first.user_roles);
        assert_eq!(
            fx.state.access.check_access(&req).await.unwrap(),
            first.allowed
        );
    }
    assert!(first.allowed);
    assert_eq!(first.matched_rule.as_deref(), Some("reports-any"));
}

#[tokio::test]
async fn test_detailed_check_prefers_most_specific_match() {
    let fx = TestFixture::new();
    let everything = fx.permission("everything", "*", "*");
    let exact = fx.permission("", "invoices", "approve");
    let admin = fx.role("Admin", None, &[&everything]);
    let approver = fx.role("Approver", None, &[&exact]);
    let user = fx.user("frank", &[&admin, &approver]);

    let req = AccessRequest::new(&user.id, "invoices", "approve");
    let detailed = fx.state.access.check_access_detailed(&req).await.unwrap();

    assert!(detailed.allowed);
    // Unnamed permissions are reported as resource:action.
    assert_eq!(detailed.matched_rule.as_deref(), Some("invoices:approve"));
    assert!(detailed.explanation.contains("Approver"));
    assert_eq!(
        detailed.user_roles,
        vec!["Admin".to_string(), "Approver".to_string()]
    );
}

#[tokio::test]
async fn test_inactive_user_denied() {
    let fx = TestFixture::new();
    let all = fx.permission("admin-all", "*", "*");
    let admin = fx.role("Admin", None, &[&all]);
    let mut user = User::new("gina".to_string(), "gina@example.com".to_string())
        .with_roles([admin.id.clone()]);
    user.active = false;
    let user = fx.put_user(user);

    let req = AccessRequest::new(&user.id, "users", "read");
    assert!(!fx.state.access.check_access(&req).await.unwrap());

    let detailed = fx.state.access.check_access_detailed(&req).await.unwrap();
    assert!(!detailed.allowed);
    assert!(detailed.explanation.contains("inactive"));
}

#[tokio::test]
async fn test_user_without_roles_denied() {
    let fx = TestFixture::new();
    let user = fx.user("hank", &[]);

    let req = AccessRequest::new(&user.id, "users", "read");
    assert!(!fx.state.access.check_access(&req).await.unwrap());
    let detailed = fx.state.access.check_access_detailed(&req).await.unwrap();
    assert!(!detailed.allowed);
    assert!(detailed.user_roles.is_empty());
}

#[tokio::test]
async fn test_invalid_requests_rejected() {
    let fx = TestFixture::new();
    let user = fx.user("ivy", &[]);

    for req in [
        AccessRequest::new("", "users", "read"),
        AccessRequest::new(&user.id, "", "read"),
        AccessRequest::new(&user.id, "users", ""),
    ] {
        assert!(matches!(
            fx.state.access.check_access(&req).await,
            Err(RbacError::InvalidInput(_))
        ));
        assert!(matches!(
            fx.state.access.check_access_detailed(&req).await,
            Err(RbacError::InvalidInput(_))
        ));
    }
}

#[tokio::test]
async fn test_unknown_user_not_found() {
    let fx = TestFixture::new();
    let req = AccessRequest::new("missing", "users", "read");

    assert!(matches!(
        fx.state.access.check_access(&req).await,
        Err(RbacError::UserNotFound)
    ));
    assert!(matches!(
        fx.state.access.get_user_permissions("missing").await,
        Err(RbacError::UserNotFound)
    ));
    assert!(matches!(
        fx.state.access.get_user_resources("missing").await,
        Err(RbacError::UserNotFound)
    ));
}

#[tokio::test]
async fn test_dangling_role_is_skipped() {
    let fx = TestFixture::new();
    let read = fx.permission("users-read", "users", "read");
    let viewer = fx.role("Viewer", None, &[&read]);
    let user = fx.put_user(
        User::new("jack".to_string(), "jack@example.com".to_string())
            .with_roles(["deleted-role".to_string(), viewer.id.clone()]),
    );

    let req = AccessRequest::new(&user.id, "users", "read");
    assert!(fx.state.access.check_access(&req).await.unwrap());
    let detailed = fx.state.access.check_access_detailed(&req).await.unwrap();
    assert_eq!(detailed.user_roles, vec!["Viewer".to_string()]);
}

#[tokio::test]
async fn test_require_access() {
    let fx = TestFixture::new();
    let read = fx.permission("users-read", "users", "read");
    let viewer = fx.role("Viewer", None, &[&read]);
    let user = fx.user("kate", &[&viewer]);

    let ok = fx
        .state
        .access
        .require_access(&AccessRequest::new(&user.id, "users", "read"))
        .await
        .unwrap();
    assert!(ok.allowed);

    let denied = fx
        .state
        .access
        .require_access(&AccessRequest::new(&user.id, "users", "delete"))
        .await;
    match denied {
        Err(RbacError::AccessDenied { resource, action }) => {
            assert_eq!(resource, "users");
            assert_eq!(action, "delete");
        }
        other => panic!("expected AccessDenied, got {:?}", other.map(|r| r.allowed)),
    }
}

#[tokio::test]
async fn test_has_permission_ignores_org_scope() {
    let fx = TestFixture::new();
    let write = fx.permission("docs-write", "documents", "write");
    let scoped = fx.role("Writer", Some("O1"), &[&write]);
    let user = fx.user("leo", &[&scoped]);

    assert!(fx
        .state
        .access
        .has_permission(&user.id, "documents", "write")
        .await
        .unwrap());
    assert!(!fx
        .state
        .access
        .has_permission(&user.id, "documents", "delete")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_user_permissions_are_deduplicated() {
    let fx = TestFixture::new();
    let read = fx.permission("users-read", "users", "read");
    let write = fx.permission("users-write", "users", "write");
    let r1 = fx.role("Reader", None, &[&read]);
    let r2 = fx.role("Editor", Some("O1"), &[&read, &write]);
    let user = fx.user("mia", &[&r1, &r2, &r1]);

    let all = fx.state.access.get_user_permissions(&user.id).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec![read.id.as_str(), write.id.as_str()]);

    let other_org = fx
        .state
        .access
        .get_user_permissions_in_org(&user.id, "O2")
        .await
        .unwrap();
    assert_eq!(other_org.len(), 1);
    assert_eq!(other_org[0].id, read.id);
}

#[tokio::test]
async fn test_resources_and_actions_without_catalog() {
    let fx = TestFixture::new();
    let users_read = fx.permission("", "users", "read");
    let users_write = fx.permission("", "users", "write");
    let billing_any = fx.permission("", "billing", "*");
    let role = fx.role("Mixed", None, &[&users_write, &users_read, &billing_any]);
    let user = fx.user("nick", &[&role]);

    let resources = fx.state.access.get_user_resources(&user.id).await.unwrap();
    assert_eq!(resources, vec!["billing".to_string(), "users".to_string()]);

    let actions = fx
        .state
        .access
        .get_user_actions(&user.id, "users")
        .await
        .unwrap();
    assert_eq!(actions, vec!["read".to_string(), "write".to_string()]);

    let billing = fx
        .state
        .access
        .get_user_actions(&user.id, "billing")
        .await
        .unwrap();
    assert_eq!(billing, vec!["*".to_string()]);

    let none = fx
        .state
        .access
        .get_user_actions(&user.id, "orders")
        .await
        .unwrap();
    assert!(none.is_empty());

    assert!(matches!(
        fx.state.access.get_user_actions(&user.id, "").await,
        Err(RbacError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_wildcard_resource_falls_back_without_catalog() {
    let fx = TestFixture::new();
    let all = fx.permission("admin-all", "*", "*");
    let admin = fx.role("Admin", None, &[&all]);
    let user = fx.user("olga", &[&admin]);

    assert_eq!(
        fx.state.access.get_user_resources(&user.id).await.unwrap(),
        vec!["*".to_string()]
    );
    assert_eq!(
        fx.state
            .access
            .get_user_actions(&user.id, "anything")
            .await
            .unwrap(),
        vec!["*".to_string()]
    );
}

#[tokio::test]
async fn test_wildcards_expand_through_catalog() {
    let catalog = StaticCatalog::new(
        vec!["users".to_string(), "billing".to_string()],
        vec!["read".to_string(), "write".to_string()],
    )
    .with_actions("billing", vec!["refund".to_string()]);
    let fx = TestFixture::with_catalog(Arc::new(catalog));

    let all = fx.permission("admin-all", "*", "*");
    let orders = fx.permission("", "orders", "ship");
    let admin = fx.role("Admin", None, &[&all, &orders]);
    let user = fx.user("pete", &[&admin]);

    assert_eq!(
        fx.state.access.get_user_resources(&user.id).await.unwrap(),
        vec![
            "billing".to_string(),
            "orders".to_string(),
            "users".to_string()
        ]
    );
    assert_eq!(
        fx.state
            .access
            .get_user_actions(&user.id, "billing")
            .await
            .unwrap(),
        vec!["refund".to_string()]
    );
    assert_eq!(
        fx.state
            .access
            .get_user_actions(&user.id, "orders")
            .await
            .unwrap(),
        vec![
            "read".to_string(),
            "ship".to_string(),
            "write".to_string()
        ]
    );
}

#[tokio::test]
async fn test_empty_catalog_falls_back_to_wildcard() {
    let fx = TestFixture::with_catalog(Arc::new(StaticCatalog::default()));
    let all = fx.permission("admin-all", "*", "*");
    let admin = fx.role("Admin", None, &[&all]);
    let user = fx.user("quinn", &[&admin]);

    assert_eq!(
        fx.state.access.get_user_resources(&user.id).await.unwrap(),
        vec!["*".to_string()]
    );
}

/// Store wrapper whose role and permission lookups fail for chosen ids.
struct FlakyStore {
    inner: Arc<InMemoryStore>,
    broken_role: String,
    broken_permission: String,
}

fn backend_failure() -> RepositoryError {
    RepositoryError::Backend(anyhow::anyhow!("simulated outage"))
}

#[async_trait]
impl UserRepository for FlakyStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        UserRepository::find_by_id(self.inner.as_ref(), id).await
    }
}

#[async_trait]
impl RoleRepository for FlakyStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Role>, RepositoryError> {
        if id == self.broken_role {
            return Err(backend_failure());
        }
        RoleRepository::find_by_id(self.inner.as_ref(), id).await
    }

    async fn find_many(&self, filter: &RoleFilter) -> Result<Vec<Role>, RepositoryError> {
        self.inner.find_many(filter).await
    }

    async fn insert(&self, role: &Role) -> Result<(), RepositoryError> {
        RoleRepository::insert(self.inner.as_ref(), role).await
    }

    async fn update(&self, role: &Role) -> Result<bool, RepositoryError> {
        self.inner.update(role).await
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        self.inner.delete(id).await
    }
}

#[async_trait]
impl PermissionRepository for FlakyStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Permission>, RepositoryError> {
        if id == self.broken_permission {
            return Err(backend_failure());
        }
        PermissionRepository::find_by_id(self.inner.as_ref(), id).await
    }

    async fn find_by_ids(&self, _ids: &[String]) -> Result<Vec<Permission>, RepositoryError> {
        Err(backend_failure())
    }

    async fn insert(&self, permission: &Permission) -> Result<(), RepositoryError> {
        PermissionRepository::insert(self.inner.as_ref(), permission).await
    }
}

#[tokio::test]
async fn test_failed_loads_are_skipped() {
    let fx = TestFixture::new();
    let broken = fx.permission("broken", "users", "delete");
    let read = fx.permission("users-read", "users", "read");
    let broken_role = fx.role("Broken", None, &[&read]);
    let viewer = fx.role("Viewer", None, &[&broken, &read]);
    let user = fx.user("rita", &[&broken_role, &viewer]);

    let flaky = Arc::new(FlakyStore {
        inner: fx.store.clone(),
        broken_role: broken_role.id.clone(),
        broken_permission: broken.id.clone(),
    });
    let resolver = PermissionResolver::new(flaky.clone(), flaky.clone(), flaky);
    let access = AccessControlService::new(resolver, None);

    let read_req = AccessRequest::new(&user.id, "users", "read");
    assert!(access.check_access(&read_req).await.unwrap());
    let detailed = access.check_access_detailed(&read_req).await.unwrap();
    assert_eq!(detailed.user_roles, vec!["Viewer".to_string()]);

    // The permission that failed to load grants nothing.
    assert!(!access
        .check_access(&AccessRequest::new(&user.id, "users", "delete"))
        .await
        .unwrap());

    let permissions = access.get_user_permissions(&user.id).await.unwrap();
    assert_eq!(permissions.len(), 1);
    assert_eq!(permissions[0].id, read.id);
}
