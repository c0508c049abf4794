//! Options consumed by the access control middleware.

use axum::http::request::Parts;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use gatehouse_core::{
    login_location, AccessControlConfig, AccessControlError, EnforcementMode,
    UnauthorizedConfig, DEFAULT_LOGIN_PATH,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type ActionFn = dyn Fn(&Parts) -> BoxFuture<'static, Response> + Send + Sync;

/// The response produced for a denied request.
///
/// Runs exactly once per denial. The downstream handler is never called.
#[derive(Clone)]
pub struct UnauthorizedAction {
    kind: ActionKind,
}

#[derive(Clone)]
enum ActionKind {
    Redirect(HeaderValue),
    Forbidden,
    Custom(Arc<ActionFn>),
}

impl UnauthorizedAction {
    /// `302 Found` with `Location: path`.
    ///
    /// Fails with `MissingArgument` for an empty path and `InvalidConfig`
    /// when the path cannot be sent as a header value.
    pub fn redirect_to(path: impl AsRef<str>) -> Result<Self, AccessControlError> {
        Ok(Self {
            kind: ActionKind::Redirect(login_location(path.as_ref())?),
        })
    }

    /// `403 Forbidden` with `{"error": "Access denied"}`.
    pub fn forbidden() -> Self {
        Self {
            kind: ActionKind::Forbidden,
        }
    }

    /// A host-supplied action.
    ///
    /// ```ignore
    /// UnauthorizedAction::custom(|parts: &Parts| {
    ///     let path = parts.uri.path().to_string();
    ///     async move { (StatusCode::UNAUTHORIZED, format!("no access to {path}")).into_response() }
    /// })
    /// ```
    pub fn custom<F, Fut>(action: F) -> Self
    where
        F: Fn(&Parts) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let action: Arc<ActionFn> =
            Arc::new(move |parts: &Parts| -> BoxFuture<'static, Response> {
                Box::pin(action(parts))
            });
        Self {
            kind: ActionKind::Custom(action),
        }
    }

    pub fn from_config(config: &UnauthorizedConfig) -> Result<Self, AccessControlError> {
        match config {
            UnauthorizedConfig::Redirect { login_path } => Self::redirect_to(login_path),
            UnauthorizedConfig::Forbidden => Ok(Self::forbidden()),
        }
    }

    pub(crate) async fn respond(&self, parts: &Parts) -> Response {
        match &self.kind {
            ActionKind::Redirect(location) => {
                (StatusCode::FOUND, [(header::LOCATION, location.clone())]).into_response()
            }
            ActionKind::Forbidden => (
                StatusCode::FORBIDDEN,
                axum::Json(serde_json::json!({ "error": "Access denied" })),
            )
                .into_response(),
            ActionKind::Custom(action) => action(parts).await,
        }
    }
}

impl Default for UnauthorizedAction {
    fn default() -> Self {
        Self {
            kind: ActionKind::Redirect(HeaderValue::from_static(DEFAULT_LOGIN_PATH)),
        }
    }
}

impl fmt::Debug for UnauthorizedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActionKind::Redirect(path) => f.debug_tuple("Redirect").field(path).finish(),
            ActionKind::Forbidden => f.write_str("Forbidden"),
            ActionKind::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Middleware options.
///
/// | Option | Default |
/// |--------|---------|
/// | `access_header_key` | `X-Access-Key` |
/// | `unauthorized` | redirect to `/Account/Login` |
/// | `enforcement` | [`EnforcementMode::Global`] |
#[derive(Debug, Clone)]
pub struct AccessControlOptions {
    pub access_header_key: HeaderName,
    pub unauthorized: UnauthorizedAction,
    pub enforcement: EnforcementMode,
}

impl Default for AccessControlOptions {
    fn default() -> Self {
        Self {
            access_header_key: HeaderName::from_static("x-access-key"),
            unauthorized: UnauthorizedAction::default(),
            enforcement: EnforcementMode::default(),
        }
    }
}

impl AccessControlOptions {
    pub fn from_config(config: &AccessControlConfig) -> Result<Self, AccessControlError> {
        Ok(Self {
            access_header_key: config.header_name()?,
            unauthorized: UnauthorizedAction::from_config(&config.unauthorized)?,
            enforcement: config.enforcement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts() -> Parts {
        Request::builder()
            .uri("/Orders/Delete")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[tokio::test]
    async fn default_redirects_to_login() {
        let response = UnauthorizedAction::default().respond(&parts()).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/Account/Login");
    }

    #[tokio::test]
    async fn redirect_to_custom_path() {
        let action = UnauthorizedAction::redirect_to("/signin?next=orders").unwrap();
        let response = action.respond(&parts()).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/signin?next=orders");
    }

    #[test]
    fn redirect_to_rejects_unusable_paths() {
        assert!(matches!(
            UnauthorizedAction::redirect_to(""),
            Err(AccessControlError::MissingArgument("login_path"))
        ));
        assert!(matches!(
            UnauthorizedAction::redirect_to("/Account/Login\r\nSet-Cookie: x=1"),
            Err(AccessControlError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn forbidden_is_403() {
        let response = UnauthorizedAction::forbidden().respond(&parts()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn custom_sees_the_request() {
        let action = UnauthorizedAction::custom(|parts: &Parts| {
            let path = parts.uri.path().to_string();
            async move { (StatusCode::UNAUTHORIZED, path).into_response() }
        });
        let response = action.respond(&parts()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn options_from_config() {
        let config = AccessControlConfig::new()
            .with_access_header_key("X-Api-Key")
            .forbidden();
        let options = AccessControlOptions::from_config(&config).unwrap();
        assert_eq!(options.access_header_key.as_str(), "x-api-key");
        assert!(matches!(options.unauthorized.kind, ActionKind::Forbidden));
    }
}
