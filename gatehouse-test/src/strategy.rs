//! Strategy doubles with call counters.

use dashmap::{DashMap, DashSet};
use gatehouse_core::{
    AccessDecision, BoxFuture, ControlAccessStrategy, Identity, Principal,
    ResourceAccessStrategy, ResourceDescriptor, StrategyError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ANYONE: &str = "*";

/// In-memory resource strategy that records every call.
///
/// Grants are `(subject, resource key)` pairs; `allow` grants a resource to
/// everyone, anonymous principals included. Clones share grants and
/// counters, so a test can keep one handle and register another.
///
/// ```ignore
/// let strategy = CountingResourceStrategy::new().allow_for("alice", "Orders.Delete");
/// let access = AccessControl::builder()
///     .add_resource_strategy(strategy.clone())
///     .add_control_strategy(StaticControlStrategy::new())
///     .build()?;
/// // ... send requests ...
/// assert_eq!(strategy.calls(), 1);
/// ```
#[derive(Clone, Default)]
pub struct CountingResourceStrategy {
    state: Arc<ResourceState>,
}

#[derive(Default)]
struct ResourceState {
    grants: DashSet<(String, String)>,
    calls: AtomicUsize,
    per_resource: DashMap<String, usize>,
    failing: AtomicBool,
    delay: std::sync::Mutex<Option<Duration>>,
}

impl CountingResourceStrategy {
    /// A strategy denying everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `key` to every principal.
    pub fn allow(self, key: &str) -> Self {
        self.grant(ANYONE, key);
        self
    }

    /// Grant `key` to the subject `sub`.
    pub fn allow_for(self, sub: &str, key: &str) -> Self {
        self.grant(sub, key);
        self
    }

    /// Fail every call with a [`StrategyError`].
    pub fn failing(self) -> Self {
        self.state.failing.store(true, Ordering::SeqCst);
        self
    }

    /// Wait `delay` before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        if let Ok(mut slot) = self.state.delay.lock() {
            *slot = Some(delay);
        }
        self
    }

    pub fn grant(&self, sub: &str, key: &str) {
        self.state.grants.insert((sub.to_string(), key.to_string()));
    }

    pub fn revoke(&self, sub: &str, key: &str) {
        self.state.grants.remove(&(sub.to_string(), key.to_string()));
    }

    /// Total number of `is_allowed` calls that reached the strategy.
    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Number of calls for the resource `key`.
    pub fn calls_for(&self, key: &str) -> usize {
        self.state.per_resource.get(key).map(|n| *n).unwrap_or(0)
    }

    fn granted(&self, principal: &Principal, key: &str) -> bool {
        let anyone = (ANYONE.to_string(), key.to_string());
        if self.state.grants.contains(&anyone) {
            return true;
        }
        principal
            .sub()
            .map(|sub| self.state.grants.contains(&(sub.to_string(), key.to_string())))
            .unwrap_or(false)
    }
}

impl ResourceAccessStrategy for CountingResourceStrategy {
    fn is_allowed<'a>(
        &'a self,
        principal: &'a Principal,
        resource: &'a ResourceDescriptor,
    ) -> BoxFuture<'a, Result<AccessDecision, StrategyError>> {
        Box::pin(async move {
            self.state.calls.fetch_add(1, Ordering::SeqCst);
            *self
                .state
                .per_resource
                .entry(resource.key().to_string())
                .or_insert(0) += 1;

            let delay = self.state.delay.lock().ok().and_then(|slot| *slot);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.state.failing.load(Ordering::SeqCst) {
                return Err(StrategyError::new("permission store unavailable"));
            }
            if self.granted(principal, resource.key()) {
                Ok(AccessDecision::allow())
            } else {
                Ok(AccessDecision::deny_with("no grant"))
            }
        })
    }
}

/// Control strategy answering from a fixed set of visible keys.
#[derive(Clone, Default)]
pub struct StaticControlStrategy {
    visible: Arc<DashSet<String>>,
    calls: Arc<AtomicUsize>,
}

impl StaticControlStrategy {
    /// A strategy hiding every control.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(self, key: &str) -> Self {
        self.visible.insert(key.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ControlAccessStrategy for StaticControlStrategy {
    fn can_show<'a>(
        &'a self,
        _principal: &'a Principal,
        control_key: &'a str,
    ) -> BoxFuture<'a, Result<bool, StrategyError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.visible.contains(control_key))
        })
    }
}

/// Minimal [`Identity`] for tests.
#[derive(Debug, Clone)]
pub struct TestIdentity {
    pub sub: String,
    pub roles: Vec<String>,
}

impl TestIdentity {
    pub fn new(sub: &str) -> Self {
        Self {
            sub: sub.to_string(),
            roles: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }
}

impl Identity for TestIdentity {
    fn sub(&self) -> &str {
        &self.sub
    }

    fn roles(&self) -> &[String] {
        &self.roles
    }
}
