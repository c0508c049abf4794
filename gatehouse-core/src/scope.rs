//! Per-request evaluation scope.

use crate::control::ControlGate;
use crate::decision::AccessDecision;
use crate::error::AccessControlError;
use crate::lifetime::ScopedStrategy;
use crate::principal::Principal;
use crate::resource::ResourceDescriptor;
use crate::strategy::{ControlAccessStrategy, ResourceAccessStrategy};
use dashmap::DashMap;
use std::sync::Arc;

/// Everything a single request needs to be evaluated: the principal, the
/// strategy instances for this request, and the control-visibility memo.
///
/// A scope belongs to one request. It is cheap to clone and is stored in the
/// request extensions so that the middleware, the policy layer and the
/// handler all share the same instances.
#[derive(Clone)]
pub struct RequestScope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    principal: Principal,
    resource: ScopedStrategy<dyn ResourceAccessStrategy>,
    control: ScopedStrategy<dyn ControlAccessStrategy>,
    shown: DashMap<String, bool>,
}

impl RequestScope {
    pub(crate) fn new(
        principal: Principal,
        resource: ScopedStrategy<dyn ResourceAccessStrategy>,
        control: ScopedStrategy<dyn ControlAccessStrategy>,
    ) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                principal,
                resource,
                control,
                shown: DashMap::new(),
            }),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.inner.principal
    }

    /// Ask the resource strategy whether this request's principal may access `resource`.
    ///
    /// A strategy fault is returned as [`AccessControlError::Strategy`],
    /// never folded into a denial.
    pub async fn check(
        &self,
        resource: &ResourceDescriptor,
    ) -> Result<AccessDecision, AccessControlError> {
        let principal = &self.inner.principal;
        let strategy = self.inner.resource.get();
        let decision = strategy.is_allowed(principal, resource).await?;

        tracing::debug!(
            subject = principal.sub().unwrap_or("<anonymous>"),
            resource = %resource,
            allowed = decision.allowed,
            reason = decision.reason.as_deref().unwrap_or(""),
            "resource access evaluated"
        );
        Ok(decision)
    }

    /// Ask the control strategy whether the control `control_key` is shown.
    ///
    /// Answers are memoized for the lifetime of the scope, so repeated calls
    /// with the same key within one request always agree. Faults are not
    /// memoized.
    pub async fn can_show(&self, control_key: &str) -> Result<bool, AccessControlError> {
        if let Some(shown) = self.inner.shown.get(control_key) {
            tracing::trace!(control = control_key, shown = *shown, "control memo hit");
            return Ok(*shown);
        }

        let strategy = self.inner.control.get();
        let shown = strategy
            .can_show(&self.inner.principal, control_key)
            .await?;

        // First answer wins if two renders raced on the same key.
        let shown = *self
            .inner
            .shown
            .entry(control_key.to_string())
            .or_insert(shown);
        tracing::trace!(control = control_key, shown, "control access evaluated");
        Ok(shown)
    }

    /// View-side handle for control checks.
    pub fn controls(&self) -> ControlGate {
        ControlGate::new(self.clone())
    }
}

impl std::fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScope")
            .field("principal", &self.inner.principal)
            .field("resource_lifetime", &self.inner.resource.lifetime())
            .field("control_lifetime", &self.inner.control.lifetime())
            .finish()
    }
}
