//! Stand-in authentication: trusts an `X-User` header naming a known user.
//!
//! A real application would verify a session cookie or a bearer token here.
//! Whatever it does, its job ends with a `CurrentIdentity` in the request
//! extensions; access control takes it from there.

use crate::permissions::PermissionStore;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use gatehouse::prelude::*;

pub const USER_HEADER: &str = "x-user";

/// The authenticated user.
#[derive(Debug, Clone)]
pub struct DemoUser {
    pub sub: String,
    pub roles: Vec<String>,
}

impl Identity for DemoUser {
    fn sub(&self) -> &str {
        &self.sub
    }

    fn roles(&self) -> &[String] {
        &self.roles
    }
}

/// Middleware attaching the identity named by `X-User`, if the user exists.
pub async fn authenticate(
    State(store): State<PermissionStore>,
    mut req: Request,
    next: Next,
) -> Response {
    let user = req
        .headers()
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .and_then(|sub| store.roles_of(sub).map(|roles| (sub.to_string(), roles)));

    match user {
        Some((sub, roles)) => {
            tracing::debug!(user = %sub, "request authenticated");
            req.extensions_mut()
                .insert(CurrentIdentity::new(DemoUser { sub, roles }));
        }
        None => tracing::trace!("anonymous request"),
    }

    next.run(req).await
}
