//! Strategy registration.
//!
//! [`StrategyRegistry`] collects exactly one resource strategy and one
//! control strategy, with two registration semantics:
//!
//! - `add_*` replaces whatever was registered before (last one wins).
//! - `try_add_*` only registers when nothing is registered yet.
//!
//! [`StrategyRegistry::build`] fails fast when a capability is missing, so a
//! misconfigured application never starts serving requests.

use crate::error::AccessControlError;
use crate::lifetime::{StrategyLifetime, StrategyProvider};
use crate::principal::Principal;
use crate::scope::RequestScope;
use crate::strategy::{ControlAccessStrategy, ResourceAccessStrategy};
use std::sync::Arc;

/// Mutable registration surface for access strategies.
#[derive(Debug, Default, Clone)]
pub struct StrategyRegistry {
    resource: Option<StrategyProvider<dyn ResourceAccessStrategy>>,
    control: Option<StrategyProvider<dyn ControlAccessStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Resource strategy ──────────────────────────────────────────────

    /// Register a process-wide resource strategy, replacing any earlier one.
    pub fn add_resource_strategy(&mut self, strategy: impl ResourceAccessStrategy) -> &mut Self {
        let strategy: Arc<dyn ResourceAccessStrategy> = Arc::new(strategy);
        self.set_resource(StrategyProvider::singleton(strategy), false)
    }

    /// Register a process-wide resource strategy unless one is already registered.
    pub fn try_add_resource_strategy(
        &mut self,
        strategy: impl ResourceAccessStrategy,
    ) -> &mut Self {
        if self.resource.is_some() {
            tracing::debug!("resource strategy already registered, keeping the existing one");
            return self;
        }
        let strategy: Arc<dyn ResourceAccessStrategy> = Arc::new(strategy);
        self.set_resource(StrategyProvider::singleton(strategy), true)
    }

    /// Register a resource strategy factory with an explicit lifetime,
    /// replacing any earlier registration.
    pub fn add_resource_strategy_with_lifetime<S, F>(
        &mut self,
        lifetime: StrategyLifetime,
        factory: F,
    ) -> &mut Self
    where
        S: ResourceAccessStrategy,
        F: Fn() -> S + Send + Sync + 'static,
    {
        self.set_resource(resource_provider(lifetime, factory), false)
    }

    /// Like [`add_resource_strategy_with_lifetime`](Self::add_resource_strategy_with_lifetime)
    /// but keeps an existing registration.
    pub fn try_add_resource_strategy_with_lifetime<S, F>(
        &mut self,
        lifetime: StrategyLifetime,
        factory: F,
    ) -> &mut Self
    where
        S: ResourceAccessStrategy,
        F: Fn() -> S + Send + Sync + 'static,
    {
        if self.resource.is_some() {
            tracing::debug!("resource strategy already registered, keeping the existing one");
            return self;
        }
        self.set_resource(resource_provider(lifetime, factory), true)
    }

    // ── Control strategy ───────────────────────────────────────────────

    /// Register a process-wide control strategy, replacing any earlier one.
    pub fn add_control_strategy(&mut self, strategy: impl ControlAccessStrategy) -> &mut Self {
        let strategy: Arc<dyn ControlAccessStrategy> = Arc::new(strategy);
        self.set_control(StrategyProvider::singleton(strategy), false)
    }

    /// Register a process-wide control strategy unless one is already registered.
    pub fn try_add_control_strategy(&mut self, strategy: impl ControlAccessStrategy) -> &mut Self {
        if self.control.is_some() {
            tracing::debug!("control strategy already registered, keeping the existing one");
            return self;
        }
        let strategy: Arc<dyn ControlAccessStrategy> = Arc::new(strategy);
        self.set_control(StrategyProvider::singleton(strategy), true)
    }

    pub fn add_control_strategy_with_lifetime<S, F>(
        &mut self,
        lifetime: StrategyLifetime,
        factory: F,
    ) -> &mut Self
    where
        S: ControlAccessStrategy,
        F: Fn() -> S + Send + Sync + 'static,
    {
        self.set_control(control_provider(lifetime, factory), false)
    }

    pub fn try_add_control_strategy_with_lifetime<S, F>(
        &mut self,
        lifetime: StrategyLifetime,
        factory: F,
    ) -> &mut Self
    where
        S: ControlAccessStrategy,
        F: Fn() -> S + Send + Sync + 'static,
    {
        if self.control.is_some() {
            tracing::debug!("control strategy already registered, keeping the existing one");
            return self;
        }
        self.set_control(control_provider(lifetime, factory), true)
    }

    // ── Introspection ──────────────────────────────────────────────────

    pub fn has_resource_strategy(&self) -> bool {
        self.resource.is_some()
    }

    pub fn has_control_strategy(&self) -> bool {
        self.control.is_some()
    }

    /// Freeze the registrations. Fails if either capability is missing.
    pub fn build(&self) -> Result<StrategySet, AccessControlError> {
        let resource = self.resource.clone().ok_or_else(|| {
            AccessControlError::Configuration("no resource access strategy registered".into())
        })?;
        let control = self.control.clone().ok_or_else(|| {
            AccessControlError::Configuration("no control access strategy registered".into())
        })?;
        tracing::debug!(
            resource_lifetime = %resource.lifetime(),
            control_lifetime = %control.lifetime(),
            "access strategies registered"
        );
        Ok(StrategySet { resource, control })
    }

    fn set_resource(
        &mut self,
        provider: StrategyProvider<dyn ResourceAccessStrategy>,
        first: bool,
    ) -> &mut Self {
        if !first && self.resource.is_some() {
            tracing::debug!("replacing previously registered resource strategy");
        }
        self.resource = Some(provider);
        self
    }

    fn set_control(
        &mut self,
        provider: StrategyProvider<dyn ControlAccessStrategy>,
        first: bool,
    ) -> &mut Self {
        if !first && self.control.is_some() {
            tracing::debug!("replacing previously registered control strategy");
        }
        self.control = Some(provider);
        self
    }
}

fn resource_provider<S, F>(
    lifetime: StrategyLifetime,
    factory: F,
) -> StrategyProvider<dyn ResourceAccessStrategy>
where
    S: ResourceAccessStrategy,
    F: Fn() -> S + Send + Sync + 'static,
{
    StrategyProvider::from_factory(lifetime, move || {
        Arc::new(factory()) as Arc<dyn ResourceAccessStrategy>
    })
}

fn control_provider<S, F>(
    lifetime: StrategyLifetime,
    factory: F,
) -> StrategyProvider<dyn ControlAccessStrategy>
where
    S: ControlAccessStrategy,
    F: Fn() -> S + Send + Sync + 'static,
{
    StrategyProvider::from_factory(lifetime, move || {
        Arc::new(factory()) as Arc<dyn ControlAccessStrategy>
    })
}

/// The frozen, complete set of strategies. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StrategySet {
    resource: StrategyProvider<dyn ResourceAccessStrategy>,
    control: StrategyProvider<dyn ControlAccessStrategy>,
}

impl StrategySet {
    /// Open the scope for one request on behalf of `principal`.
    pub fn open_scope(&self, principal: Principal) -> RequestScope {
        RequestScope::new(principal, self.resource.scope(), self.control.scope())
    }

    pub fn resource_lifetime(&self) -> StrategyLifetime {
        self.resource.lifetime()
    }

    pub fn control_lifetime(&self) -> StrategyLifetime {
        self.control.lifetime()
    }
}
