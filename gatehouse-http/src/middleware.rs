//! Global access control middleware.
//!
//! Per request, the service:
//!
//! 1. opens the request scope (principal, strategy instances) and stores it
//!    in the request extensions;
//! 2. in [`EnforcementMode::Global`], resolves the endpoint against the
//!    resource table (matched route pattern, raw path as fallback);
//! 3. forwards untouched when no resource protects the endpoint;
//! 4. otherwise asks the resource strategy, forwarding on allow and answering
//!    with the unauthorized action on deny.
//!
//! Strategy faults produce a `500` and are never turned into a denial.
//! Dropping the response future drops any pending strategy call.

use crate::access::AccessControl;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;
use gatehouse_core::EnforcementMode;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer installing the access control middleware.
#[derive(Clone)]
pub struct AccessControlLayer {
    access: AccessControl,
}

impl AccessControlLayer {
    pub fn new(access: AccessControl) -> Self {
        Self { access }
    }
}

impl<S> Layer<S> for AccessControlLayer {
    type Service = AccessControlService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessControlService {
            inner,
            access: self.access.clone(),
        }
    }
}

/// Tower service enforcing access control before the inner service.
#[derive(Clone)]
pub struct AccessControlService<S> {
    inner: S,
    access: AccessControl,
}

impl<S, B> Service<Request<B>> for AccessControlService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let (mut parts, body) = req.into_parts();
        self.access.scope_for(&mut parts);

        let resource = match self.access.options().enforcement {
            EnforcementMode::Global => self.access.resolve_parts(&parts),
            EnforcementMode::PerEndpoint => None,
        };

        let Some(resource) = resource else {
            tracing::trace!(
                method = %parts.method,
                path = parts.uri.path(),
                "no protected resource, forwarding"
            );
            return ResponseFuture::Forward {
                inner: self.inner.call(Request::from_parts(parts, body)),
            };
        };

        // The ready service handles this request; the clone takes its place.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let access = self.access.clone();

        ResponseFuture::Evaluate {
            inner: Box::pin(async move {
                if let Err(response) = access.enforce(&mut parts, resource).await {
                    return Ok(response);
                }
                inner.call(Request::from_parts(parts, body)).await
            }),
        }
    }
}

pin_project! {
    /// Response future of [`AccessControlService`].
    #[project = ResponseFutureProj]
    pub enum ResponseFuture<F, E> {
        Forward {
            #[pin]
            inner: F,
        },
        Evaluate {
            inner: BoxFuture<'static, Result<Response, E>>,
        },
    }
}

impl<F, E> Future for ResponseFuture<F, E>
where
    F: Future<Output = Result<Response, E>>,
{
    type Output = Result<Response, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            ResponseFutureProj::Forward { inner } => inner.poll(cx),
            ResponseFutureProj::Evaluate { inner } => inner.as_mut().poll(cx),
        }
    }
}
