//! Per-route authorization policies.
//!
//! An [`AuthorizationPolicy`] runs before a route handler and either lets the
//! request through or answers it. [`PolicyLayer`] installs one with
//! `route_layer`:
//!
//! ```ignore
//! Router::new()
//!     .route("/Orders/Delete", post(delete_order))
//!     .route_layer(access.require("Orders.Delete")?)
//! ```
//!
//! The access control policy ([`AccessAuthorizationHandler`]) evaluates its
//! [`AccessRequirement`] through the same [`AccessControl`] as the global
//! middleware, so both share the request scope and its strategy instances.

use crate::access::AccessControl;
use axum::http::request::Parts;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;
use gatehouse_core::ResourceDescriptor;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Conventional name of the access control policy.
pub const POLICY_NAME: &str = "AccessControl";

/// A check run before a route handler.
///
/// `Err` carries the response sent instead of calling the handler.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be used as an authorization policy",
    label = "this type does not implement `AuthorizationPolicy`"
)]
pub trait AuthorizationPolicy: Send + Sync + 'static {
    fn authorize<'a>(&'a self, parts: &'a mut Parts) -> BoxFuture<'a, Result<(), Response>>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<P: AuthorizationPolicy + ?Sized> AuthorizationPolicy for Arc<P> {
    fn authorize<'a>(&'a self, parts: &'a mut Parts) -> BoxFuture<'a, Result<(), Response>> {
        (**self).authorize(parts)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// What the access control policy checks.
#[derive(Debug, Clone)]
pub enum AccessRequirement {
    /// A fixed resource.
    Resource(ResourceDescriptor),
    /// The resource the resource table maps the matched route to. Routes
    /// without an entry are let through.
    Endpoint,
}

/// Enforces an [`AccessRequirement`] with an [`AccessControl`].
#[derive(Debug, Clone)]
pub struct AccessAuthorizationHandler {
    access: AccessControl,
    requirement: AccessRequirement,
}

impl AccessAuthorizationHandler {
    pub fn new(access: AccessControl, requirement: AccessRequirement) -> Self {
        Self {
            access,
            requirement,
        }
    }

    pub fn requirement(&self) -> &AccessRequirement {
        &self.requirement
    }
}

impl AuthorizationPolicy for AccessAuthorizationHandler {
    fn authorize<'a>(&'a self, parts: &'a mut Parts) -> BoxFuture<'a, Result<(), Response>> {
        Box::pin(async move {
            let resource = match &self.requirement {
                AccessRequirement::Resource(resource) => resource.clone(),
                AccessRequirement::Endpoint => match self.access.resolve_parts(parts) {
                    Some(resource) => resource,
                    None => {
                        tracing::trace!(
                            path = parts.uri.path(),
                            "no resource mapped for endpoint policy, forwarding"
                        );
                        return Ok(());
                    }
                },
            };
            self.access.enforce(parts, resource).await
        })
    }

    fn name(&self) -> &str {
        POLICY_NAME
    }
}

/// Tower layer running an [`AuthorizationPolicy`] before the inner service.
#[derive(Debug)]
pub struct PolicyLayer<P> {
    policy: Arc<P>,
}

impl<P> PolicyLayer<P> {
    pub fn new(policy: P) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }
}

impl<P> Clone for PolicyLayer<P> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
        }
    }
}

impl<S, P> Layer<S> for PolicyLayer<P> {
    type Service = PolicyService<S, P>;

    fn layer(&self, inner: S) -> Self::Service {
        PolicyService {
            inner,
            policy: self.policy.clone(),
        }
    }
}

/// Tower service produced by [`PolicyLayer`].
pub struct PolicyService<S, P> {
    inner: S,
    policy: Arc<P>,
}

impl<S: Clone, P> Clone for PolicyService<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S, P, B> Service<Request<B>> for PolicyService<S, P>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: 'static,
    P: AuthorizationPolicy,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let policy = self.policy.clone();

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            if let Err(response) = policy.authorize(&mut parts).await {
                tracing::debug!(
                    policy = policy.name(),
                    status = response.status().as_u16(),
                    "request rejected by policy"
                );
                return Ok(response);
            }
            inner.call(Request::from_parts(parts, body)).await
        })
    }
}
