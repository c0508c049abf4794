//! The assembled access control handle and its builder.

use crate::error::AccessRejection;
use crate::middleware::AccessControlLayer;
use crate::options::{AccessControlOptions, UnauthorizedAction};
use crate::policy::{AccessAuthorizationHandler, AccessRequirement, PolicyLayer};
use axum::extract::MatchedPath;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, Method};
use axum::response::{IntoResponse, Response};
use gatehouse_core::{
    AccessControlConfig, AccessControlError, AccessDecision, ControlAccessStrategy,
    CurrentIdentity, EnforcementMode, Principal, RequestScope, ResourceAccessStrategy,
    ResourceDescriptor, ResourceTable, ResourceTableBuilder, StrategyLifetime, StrategyRegistry,
    StrategySet,
};
use http::Extensions;
use std::sync::Arc;

/// Request extension recording the resource an earlier stage of this
/// request already admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmittedResource(pub ResourceDescriptor);

/// Clonable handle to the configured access control pipeline.
///
/// Built once at startup with [`AccessControl::builder`], then handed to the
/// global [`AccessControlLayer`] and to per-route policy layers. Every
/// enforcement path goes through the same strategies and the same request
/// scope.
///
/// ```ignore
/// let access = AccessControl::builder()
///     .add_resource_strategy_with_lifetime(StrategyLifetime::PerRequest, || AclStrategy::new(store.clone()))
///     .add_control_strategy(MenuStrategy)
///     .protect(Method::POST, "/Orders/Delete", "Orders.Delete")
///     .build()?;
///
/// let app = Router::new()
///     .route("/Orders/Delete", post(delete_order))
///     .route("/Reports", get(reports).route_layer(access.require("Reports.View")?))
///     .layer(access.layer());
/// ```
#[derive(Clone)]
pub struct AccessControl {
    inner: Arc<AccessControlInner>,
}

struct AccessControlInner {
    strategies: StrategySet,
    resources: ResourceTable,
    options: AccessControlOptions,
}

impl AccessControl {
    pub fn builder() -> AccessControlBuilder {
        AccessControlBuilder::new()
    }

    pub fn options(&self) -> &AccessControlOptions {
        &self.inner.options
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.inner.resources
    }

    pub fn strategies(&self) -> &StrategySet {
        &self.inner.strategies
    }

    /// The global middleware layer.
    pub fn layer(&self) -> AccessControlLayer {
        AccessControlLayer::new(self.clone())
    }

    /// A policy layer requiring access to the resource `key`.
    pub fn require(
        &self,
        key: impl AsRef<str>,
    ) -> Result<PolicyLayer<AccessAuthorizationHandler>, AccessControlError> {
        let resource = ResourceDescriptor::new(key)?;
        Ok(PolicyLayer::new(AccessAuthorizationHandler::new(
            self.clone(),
            AccessRequirement::Resource(resource),
        )))
    }

    /// A policy layer requiring access to whatever resource the resource
    /// table maps the matched route to.
    pub fn require_endpoint(&self) -> PolicyLayer<AccessAuthorizationHandler> {
        PolicyLayer::new(AccessAuthorizationHandler::new(
            self.clone(),
            AccessRequirement::Endpoint,
        ))
    }

    /// Build the principal for a request: the authenticated identity if an
    /// upstream layer attached one, plus the access header when present.
    pub fn principal_for(&self, headers: &HeaderMap, extensions: &Extensions) -> Principal {
        let mut principal = match extensions.get::<CurrentIdentity>() {
            Some(identity) => Principal::from(identity.clone()),
            None => Principal::anonymous(),
        };
        if let Some(key) = access_key(headers, &self.inner.options.access_header_key) {
            principal = principal.with_access_key(key);
        }
        principal
    }

    /// The request scope for this request, opened and stored in the request
    /// extensions on first use.
    pub fn scope_for(&self, parts: &mut Parts) -> RequestScope {
        if let Some(scope) = parts.extensions.get::<RequestScope>() {
            return scope.clone();
        }
        let principal = self.principal_for(&parts.headers, &parts.extensions);
        let scope = self.inner.strategies.open_scope(principal);
        parts.extensions.insert(scope.principal().clone());
        parts.extensions.insert(scope.clone());
        scope
    }

    /// Look up the resource protecting `method path`.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<ResourceDescriptor> {
        self.inner.resources.resolve(method, path).cloned()
    }

    /// Look up the resource protecting the request.
    ///
    /// Inside a router the matched route pattern is used as is. Outside one
    /// (the layer wrapping the whole `Router`) there is no `MatchedPath` yet,
    /// so the concrete path is matched against the registered patterns.
    pub fn resolve_parts(&self, parts: &Parts) -> Option<ResourceDescriptor> {
        match parts.extensions.get::<MatchedPath>() {
            Some(matched) => self.resolve(&parts.method, matched.as_str()),
            None => self
                .inner
                .resources
                .resolve_path(&parts.method, parts.uri.path())
                .cloned(),
        }
    }

    /// Evaluate `resource` within `scope`.
    pub async fn check(
        &self,
        scope: &RequestScope,
        resource: &ResourceDescriptor,
    ) -> Result<AccessDecision, AccessControlError> {
        scope.check(resource).await
    }

    /// Decide and enforce access to `resource` for the request described by
    /// `parts`. `Err` carries the response to send instead of calling the
    /// handler.
    pub(crate) async fn enforce(
        &self,
        parts: &mut Parts,
        resource: ResourceDescriptor,
    ) -> Result<(), Response> {
        let scope = self.scope_for(parts);

        if let Some(AdmittedResource(admitted)) = parts.extensions.get::<AdmittedResource>() {
            if *admitted == resource {
                tracing::trace!(resource = %resource, "resource already admitted for this request");
                return Ok(());
            }
        }

        tracing::trace!(
            method = %parts.method,
            path = parts.uri.path(),
            resource = %resource,
            "protected resource resolved"
        );
        parts.extensions.insert(resource.clone());

        match self.check(&scope, &resource).await {
            Ok(decision) if decision.allowed => {
                parts.extensions.insert(AdmittedResource(resource));
                Ok(())
            }
            Ok(decision) => {
                tracing::debug!(
                    subject = scope.principal().sub().unwrap_or("<anonymous>"),
                    resource = %resource,
                    reason = decision.reason.as_deref().unwrap_or(""),
                    "access denied"
                );
                Err(self.inner.options.unauthorized.respond(parts).await)
            }
            Err(error) => Err(AccessRejection::fault(Some(resource.key()), error).into_response()),
        }
    }
}

impl std::fmt::Debug for AccessControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessControl")
            .field("strategies", &self.inner.strategies)
            .field("resources", &self.inner.resources.len())
            .field("options", &self.inner.options)
            .finish()
    }
}

fn access_key(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Registration surface for [`AccessControl`].
///
/// Strategy registration follows two rules: `add_*` replaces an earlier
/// registration, `try_add_*` keeps it. [`build`](Self::build) fails when
/// either strategy is missing or any option was invalid.
#[derive(Default)]
pub struct AccessControlBuilder {
    registry: StrategyRegistry,
    options: AccessControlOptions,
    resources: ResourceTableBuilder,
    errors: Vec<AccessControlError>,
    options_customized: bool,
}

impl AccessControlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_resource_strategy(mut self, strategy: impl ResourceAccessStrategy) -> Self {
        self.registry.add_resource_strategy(strategy);
        self
    }

    pub fn try_add_resource_strategy(mut self, strategy: impl ResourceAccessStrategy) -> Self {
        self.registry.try_add_resource_strategy(strategy);
        self
    }

    pub fn add_resource_strategy_with_lifetime<S, F>(
        mut self,
        lifetime: StrategyLifetime,
        factory: F,
    ) -> Self
    where
        S: ResourceAccessStrategy,
        F: Fn() -> S + Send + Sync + 'static,
    {
        self.registry
            .add_resource_strategy_with_lifetime(lifetime, factory);
        self
    }

    pub fn try_add_resource_strategy_with_lifetime<S, F>(
        mut self,
        lifetime: StrategyLifetime,
        factory: F,
    ) -> Self
    where
        S: ResourceAccessStrategy,
        F: Fn() -> S + Send + Sync + 'static,
    {
        self.registry
            .try_add_resource_strategy_with_lifetime(lifetime, factory);
        self
    }

    pub fn add_control_strategy(mut self, strategy: impl ControlAccessStrategy) -> Self {
        self.registry.add_control_strategy(strategy);
        self
    }

    pub fn try_add_control_strategy(mut self, strategy: impl ControlAccessStrategy) -> Self {
        self.registry.try_add_control_strategy(strategy);
        self
    }

    pub fn add_control_strategy_with_lifetime<S, F>(
        mut self,
        lifetime: StrategyLifetime,
        factory: F,
    ) -> Self
    where
        S: ControlAccessStrategy,
        F: Fn() -> S + Send + Sync + 'static,
    {
        self.registry
            .add_control_strategy_with_lifetime(lifetime, factory);
        self
    }

    pub fn try_add_control_strategy_with_lifetime<S, F>(
        mut self,
        lifetime: StrategyLifetime,
        factory: F,
    ) -> Self
    where
        S: ControlAccessStrategy,
        F: Fn() -> S + Send + Sync + 'static,
    {
        self.registry
            .try_add_control_strategy_with_lifetime(lifetime, factory);
        self
    }

    /// Register both strategies as process-wide instances, keeping any
    /// earlier registration.
    pub fn strategies(
        self,
        resource: impl ResourceAccessStrategy,
        control: impl ControlAccessStrategy,
    ) -> Self {
        self.try_add_resource_strategy(resource)
            .try_add_control_strategy(control)
    }

    pub fn options(mut self, options: AccessControlOptions) -> Self {
        self.options = options;
        self.options_customized = true;
        self
    }

    /// Adjust the options in place.
    pub fn configure(mut self, f: impl FnOnce(&mut AccessControlOptions)) -> Self {
        f(&mut self.options);
        self.options_customized = true;
        self
    }

    pub fn access_header_key(mut self, key: &str) -> Self {
        self.options_customized = true;
        let key = key.trim();
        if key.is_empty() {
            self.errors
                .push(AccessControlError::MissingArgument("access_header_key"));
            return self;
        }
        match HeaderName::from_bytes(key.as_bytes()) {
            Ok(name) => self.options.access_header_key = name,
            Err(e) => self.errors.push(AccessControlError::InvalidConfig(format!(
                "invalid access header key '{key}': {e}"
            ))),
        }
        self
    }

    pub fn unauthorized(mut self, action: UnauthorizedAction) -> Self {
        self.options.unauthorized = action;
        self.options_customized = true;
        self
    }

    /// Redirect denied requests to `path`. An empty or malformed path makes
    /// [`build`](Self::build) fail.
    pub fn login_path(mut self, path: &str) -> Self {
        match UnauthorizedAction::redirect_to(path) {
            Ok(action) => return self.unauthorized(action),
            Err(e) => self.errors.push(e),
        }
        self
    }

    pub fn enforcement(mut self, mode: EnforcementMode) -> Self {
        self.options.enforcement = mode;
        self.options_customized = true;
        self
    }

    /// Protect `method path` with the resource `key`.
    pub fn protect(mut self, method: Method, path: impl Into<String>, key: impl AsRef<str>) -> Self {
        self.resources = self.resources.protect(method, path, key);
        self
    }

    /// Protect every method on `path` with the resource `key`.
    pub fn protect_any(mut self, path: impl Into<String>, key: impl AsRef<str>) -> Self {
        self.resources = self.resources.protect_any(path, key);
        self
    }

    /// Merge an existing resource table.
    pub fn resources(mut self, table: &ResourceTable) -> Self {
        self.resources = self.resources.extend(table);
        self
    }

    /// Take options and resource rules from a loaded configuration.
    ///
    /// The configured options replace every option set before this call;
    /// resource rules are merged. Call it first and refine afterwards:
    ///
    /// ```ignore
    /// AccessControl::builder()
    ///     .from_config(&config)
    ///     .unauthorized(UnauthorizedAction::forbidden())
    /// ```
    pub fn from_config(mut self, config: &AccessControlConfig) -> Self {
        if self.options_customized {
            tracing::warn!("from_config replaces access control options set earlier on the builder");
        }
        match AccessControlOptions::from_config(config) {
            Ok(options) => self.options = options,
            Err(e) => self.errors.push(e),
        }
        match config.resource_table() {
            Ok(table) => self.resources = self.resources.extend(&table),
            Err(e) => self.errors.push(e),
        }
        self
    }

    pub fn build(mut self) -> Result<AccessControl, AccessControlError> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        let strategies = self.registry.build()?;
        let resources = self.resources.build()?;

        tracing::info!(
            protected_endpoints = resources.len(),
            enforcement = ?self.options.enforcement,
            access_header = %self.options.access_header_key,
            "access control configured"
        );

        Ok(AccessControl {
            inner: Arc::new(AccessControlInner {
                strategies,
                resources,
                options: self.options,
            }),
        })
    }
}
