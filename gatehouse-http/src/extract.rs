//! Handler extractors backed by the request scope.

use crate::error::AccessRejection;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use gatehouse_core::{ControlGate, Principal, RequestScope};

/// The principal the access control layer evaluated this request for.
///
/// ```ignore
/// async fn whoami(CurrentPrincipal(principal): CurrentPrincipal) -> String {
///     principal.sub().unwrap_or("anonymous").to_string()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for CurrentPrincipal {
    type Rejection = AccessRejection;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let principal = parts
            .extensions
            .get::<RequestScope>()
            .map(|scope| scope.principal().clone());
        async move {
            principal
                .map(CurrentPrincipal)
                .ok_or(AccessRejection::MissingLayer("CurrentPrincipal"))
        }
    }
}

/// Control visibility checks for the current request.
///
/// Answers are memoized per request, so a template asking about the same
/// control twice always gets the same answer.
#[derive(Debug, Clone)]
pub struct Controls(pub ControlGate);

impl<S: Send + Sync> FromRequestParts<S> for Controls {
    type Rejection = AccessRejection;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let gate = parts
            .extensions
            .get::<RequestScope>()
            .map(RequestScope::controls);
        async move {
            gate.map(Controls)
                .ok_or(AccessRejection::MissingLayer("Controls"))
        }
    }
}
