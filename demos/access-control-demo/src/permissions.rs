//! In-memory permission store and the two demo strategies.

use dashmap::DashMap;
use gatehouse::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Users, role grants and access-key grants.
///
/// Cheap to clone; clones share the same tables.
#[derive(Clone, Default)]
pub struct PermissionStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    users: DashMap<String, Vec<String>>,
    role_grants: DashMap<String, HashSet<String>>,
    key_grants: DashMap<String, HashSet<String>>,
    lookups: AtomicUsize,
}

impl PermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, sub: &str, roles: &[&str]) -> &Self {
        self.inner.users.insert(
            sub.to_string(),
            roles.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    pub fn grant_role(&self, role: &str, resource: &str) -> &Self {
        self.inner
            .role_grants
            .entry(role.to_string())
            .or_default()
            .insert(resource.to_string());
        self
    }

    pub fn grant_key(&self, access_key: &str, resource: &str) -> &Self {
        self.inner
            .key_grants
            .entry(access_key.to_string())
            .or_default()
            .insert(resource.to_string());
        self
    }

    pub fn roles_of(&self, sub: &str) -> Option<Vec<String>> {
        self.inner.users.get(sub).map(|roles| roles.clone())
    }

    /// Every resource key the principal holds, through its roles or its
    /// access key.
    pub fn effective_grants(&self, principal: &Principal) -> HashSet<String> {
        self.inner.lookups.fetch_add(1, Ordering::SeqCst);
        let mut grants = HashSet::new();
        for role in principal.roles() {
            if let Some(keys) = self.inner.role_grants.get(role) {
                grants.extend(keys.iter().cloned());
            }
        }
        if let Some(key) = principal.access_key() {
            if let Some(keys) = self.inner.key_grants.get(key) {
                grants.extend(keys.iter().cloned());
            }
        }
        grants
    }

    /// Number of grant lookups served so far.
    pub fn lookups(&self) -> usize {
        self.inner.lookups.load(Ordering::SeqCst)
    }
}

/// Resource strategy registered per request: it loads the principal's grants
/// once and answers every check of the request from that snapshot.
pub struct ActionAccessStrategy {
    store: PermissionStore,
    grants: OnceLock<HashSet<String>>,
}

impl ActionAccessStrategy {
    pub fn new(store: PermissionStore) -> Self {
        Self {
            store,
            grants: OnceLock::new(),
        }
    }
}

impl ResourceAccessStrategy for ActionAccessStrategy {
    fn is_allowed<'a>(
        &'a self,
        principal: &'a Principal,
        resource: &'a ResourceDescriptor,
    ) -> BoxFuture<'a, Result<AccessDecision, StrategyError>> {
        Box::pin(async move {
            let grants = self
                .grants
                .get_or_init(|| self.store.effective_grants(principal));
            if grants.contains(resource.key()) {
                Ok(AccessDecision::allow())
            } else if principal.is_authenticated() || principal.access_key().is_some() {
                Ok(AccessDecision::deny_with("missing permission"))
            } else {
                Ok(AccessDecision::deny_with("not signed in"))
            }
        })
    }
}

/// Process-wide control strategy: a control is shown when the principal
/// holds the resource of the same name.
pub struct MenuControlStrategy {
    store: PermissionStore,
}

impl MenuControlStrategy {
    pub fn new(store: PermissionStore) -> Self {
        Self { store }
    }
}

impl ControlAccessStrategy for MenuControlStrategy {
    fn can_show<'a>(
        &'a self,
        principal: &'a Principal,
        control_key: &'a str,
    ) -> BoxFuture<'a, Result<bool, StrategyError>> {
        Box::pin(async move { Ok(self.store.effective_grants(principal).contains(control_key)) })
    }
}

/// The users and grants the demo starts with.
pub fn seed() -> PermissionStore {
    let store = PermissionStore::new();
    store
        .add_user("alice", &["admin"])
        .add_user("bob", &["clerk"])
        .grant_role("admin", "Orders.View")
        .grant_role("admin", "Orders.Edit")
        .grant_role("admin", "Orders.Delete")
        .grant_role("admin", "Admin.Dashboard")
        .grant_role("clerk", "Orders.View")
        .grant_role("clerk", "Orders.Edit")
        .grant_key("demo-key", "Orders.View");
    store
}
