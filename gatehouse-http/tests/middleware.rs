use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use gatehouse_core::prelude::*;
use gatehouse_core::{AccessControlConfig, EnforcementMode};
use gatehouse_http::{AccessControl, AccessFault, UnauthorizedAction};
use gatehouse_test::{CountingResourceStrategy, StaticControlStrategy, TestApp, TestIdentity};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, ServiceExt};

/// Counts handler invocations.
#[derive(Clone, Default)]
struct Hits(Arc<AtomicUsize>);

impl Hits {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

fn routes(hits: &Hits) -> Router {
    let home = hits.clone();
    let delete = hits.clone();
    let order = hits.clone();
    Router::new()
        .route(
            "/Home/Index",
            get(move || {
                let hits = home.clone();
                async move {
                    hits.0.fetch_add(1, Ordering::SeqCst);
                    "home"
                }
            }),
        )
        .route(
            "/Orders/Delete",
            post(move || {
                let hits = delete.clone();
                async move {
                    hits.0.fetch_add(1, Ordering::SeqCst);
                    "deleted"
                }
            })
            .get(|| async { "confirm delete" }),
        )
        .route(
            "/orders/{id}",
            get(move || {
                let hits = order.clone();
                async move {
                    hits.0.fetch_add(1, Ordering::SeqCst);
                    "order"
                }
            }),
        )
}

fn builder(strategy: &CountingResourceStrategy) -> gatehouse_http::AccessControlBuilder {
    AccessControl::builder()
        .add_resource_strategy(strategy.clone())
        .add_control_strategy(StaticControlStrategy::new())
        .protect(Method::POST, "/Orders/Delete", "Orders.Delete")
        .protect_any("/orders/{id}", "Orders.View")
}

fn app(access: &AccessControl, hits: &Hits) -> TestApp {
    TestApp::new(routes(hits).layer(access.layer()))
}

#[tokio::test]
async fn unprotected_endpoint_skips_strategy() {
    let strategy = CountingResourceStrategy::new();
    let access = builder(&strategy).build().unwrap();
    let hits = Hits::default();
    let app = app(&access, &hits);

    app.get("/Home/Index").send().await.assert_ok().assert_text("home");
    app.get("/Home/Index")
        .identity(TestIdentity::new("alice"))
        .send()
        .await
        .assert_ok();

    assert_eq!(strategy.calls(), 0);
    assert_eq!(hits.count(), 2);
}

#[tokio::test]
async fn allowed_request_reaches_handler() {
    let strategy = CountingResourceStrategy::new().allow_for("alice", "Orders.Delete");
    let access = builder(&strategy).build().unwrap();
    let hits = Hits::default();
    let app = app(&access, &hits);

    app.post("/Orders/Delete")
        .identity(TestIdentity::new("alice"))
        .send()
        .await
        .assert_ok()
        .assert_text("deleted");

    assert_eq!(strategy.calls_for("Orders.Delete"), 1);
    assert_eq!(hits.count(), 1);
}

#[tokio::test]
async fn denied_request_redirects_to_login() {
    let strategy = CountingResourceStrategy::new().allow_for("alice", "Orders.Delete");
    let access = builder(&strategy).build().unwrap();
    let hits = Hits::default();
    let app = app(&access, &hits);

    app.post("/Orders/Delete")
        .identity(TestIdentity::new("bob"))
        .send()
        .await
        .assert_redirect_to("/Account/Login");
    app.post("/Orders/Delete")
        .send()
        .await
        .assert_redirect_to("/Account/Login");

    assert_eq!(strategy.calls(), 2);
    assert_eq!(hits.count(), 0);
}

#[tokio::test]
async fn denied_request_can_be_forbidden() {
    let strategy = CountingResourceStrategy::new();
    let access = builder(&strategy)
        .unauthorized(UnauthorizedAction::forbidden())
        .build()
        .unwrap();
    let hits = Hits::default();

    let response = app(&access, &hits)
        .post("/Orders/Delete")
        .send()
        .await
        .assert_forbidden();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Access denied");
    assert_eq!(hits.count(), 0);
}

#[tokio::test]
async fn unauthorized_action_runs_once_per_denial() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let strategy = CountingResourceStrategy::new();
    let access = builder(&strategy)
        .unauthorized(UnauthorizedAction::custom(move |parts: &Parts| {
            counter.fetch_add(1, Ordering::SeqCst);
            let path = parts.uri.path().to_string();
            async move { (StatusCode::UNAUTHORIZED, format!("denied: {path}")).into_response() }
        }))
        .build()
        .unwrap();
    let hits = Hits::default();

    app(&access, &hits)
        .post("/Orders/Delete")
        .send()
        .await
        .assert_status(StatusCode::UNAUTHORIZED)
        .assert_text("denied: /Orders/Delete");

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(hits.count(), 0);
}

#[tokio::test]
async fn protection_is_per_method() {
    let strategy = CountingResourceStrategy::new();
    let access = builder(&strategy).build().unwrap();
    let hits = Hits::default();

    app(&access, &hits)
        .get("/Orders/Delete")
        .send()
        .await
        .assert_ok()
        .assert_text("confirm delete");
    assert_eq!(strategy.calls(), 0);
}

#[tokio::test]
async fn route_patterns_are_matched() {
    let strategy = CountingResourceStrategy::new().allow("Orders.View");
    let access = builder(&strategy).build().unwrap();
    let hits = Hits::default();
    let app = app(&access, &hits);

    app.get("/orders/42").send().await.assert_ok();
    app.get("/orders/43").send().await.assert_ok();

    assert_eq!(strategy.calls_for("Orders.View"), 2);
    assert_eq!(hits.count(), 2);
}

#[tokio::test]
async fn layer_around_the_router_resolves_route_patterns() {
    let strategy = CountingResourceStrategy::new().allow_for("alice", "Orders.View");
    let access = builder(&strategy).build().unwrap();
    let hits = Hits::default();
    let service = access.layer().layer(routes(&hits));

    let request = Request::get("/orders/42").body(Body::empty()).unwrap();
    let response = service.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/Account/Login");
    assert_eq!(strategy.calls_for("Orders.View"), 1);
    assert_eq!(hits.count(), 0);

    let mut request = Request::get("/orders/43").body(Body::empty()).unwrap();
    request
        .extensions_mut()
        .insert(CurrentIdentity::new(TestIdentity::new("alice")));
    let response = service.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(strategy.calls_for("Orders.View"), 2);
    assert_eq!(hits.count(), 1);

    let request = Request::get("/Home/Index").body(Body::empty()).unwrap();
    let response = service.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(strategy.calls(), 2);
}

#[tokio::test]
async fn login_path_sets_the_redirect_target() {
    let strategy = CountingResourceStrategy::new();
    let access = builder(&strategy).login_path("/signin").build().unwrap();

    app(&access, &Hits::default())
        .post("/Orders/Delete")
        .send()
        .await
        .assert_redirect_to("/signin");
}

#[test]
fn unusable_login_path_fails_the_build() {
    let err = builder(&CountingResourceStrategy::new())
        .login_path("")
        .build()
        .unwrap_err();
    assert!(matches!(err, AccessControlError::MissingArgument("login_path")));

    let err = builder(&CountingResourceStrategy::new())
        .login_path("/Account/Login\nX-Injected: yes")
        .build()
        .unwrap_err();
    assert!(matches!(err, AccessControlError::InvalidConfig(_)));

    let config = AccessControlConfig::new().with_login_path("/signin\r\nSet-Cookie: x=1");
    let err = builder(&CountingResourceStrategy::new())
        .from_config(&config)
        .build()
        .unwrap_err();
    assert!(matches!(err, AccessControlError::InvalidConfig(_)));
}

#[tokio::test]
async fn options_after_from_config_refine_it() {
    let config = AccessControlConfig::new().with_login_path("/signin");

    // set before: replaced by the configuration
    let access = builder(&CountingResourceStrategy::new())
        .unauthorized(UnauthorizedAction::forbidden())
        .from_config(&config)
        .build()
        .unwrap();
    app(&access, &Hits::default())
        .post("/Orders/Delete")
        .send()
        .await
        .assert_redirect_to("/signin");

    let access = builder(&CountingResourceStrategy::new())
        .from_config(&config)
        .unauthorized(UnauthorizedAction::forbidden())
        .build()
        .unwrap();
    app(&access, &Hits::default())
        .post("/Orders/Delete")
        .send()
        .await
        .assert_forbidden();
}

/// Allows requests carrying the access key `secret`.
struct AccessKeyStrategy;

impl ResourceAccessStrategy for AccessKeyStrategy {
    fn is_allowed<'a>(
        &'a self,
        principal: &'a Principal,
        _resource: &'a ResourceDescriptor,
    ) -> BoxFuture<'a, Result<AccessDecision, StrategyError>> {
        Box::pin(async move { Ok((principal.access_key() == Some("secret")).into()) })
    }
}

#[tokio::test]
async fn default_access_header_is_read() {
    let access = AccessControl::builder()
        .strategies(AccessKeyStrategy, StaticControlStrategy::new())
        .protect(Method::POST, "/Orders/Delete", "Orders.Delete")
        .build()
        .unwrap();
    let app = app(&access, &Hits::default());

    app.post("/Orders/Delete")
        .header("X-Access-Key", "secret")
        .send()
        .await
        .assert_ok();
    app.post("/Orders/Delete")
        .header("X-Access-Key", "  ")
        .send()
        .await
        .assert_redirect_to("/Account/Login");
}

#[tokio::test]
async fn custom_access_header_replaces_default() {
    let access = AccessControl::builder()
        .strategies(AccessKeyStrategy, StaticControlStrategy::new())
        .access_header_key("X-Api-Key")
        .protect(Method::POST, "/Orders/Delete", "Orders.Delete")
        .build()
        .unwrap();
    let app = app(&access, &Hits::default());

    app.post("/Orders/Delete")
        .header("X-Api-Key", "secret")
        .send()
        .await
        .assert_ok();
    app.post("/Orders/Delete")
        .header("X-Access-Key", "secret")
        .send()
        .await
        .assert_redirect_to("/Account/Login");
}

#[tokio::test]
async fn strategy_fault_is_a_server_error() {
    let strategy = CountingResourceStrategy::new()
        .allow("Orders.Delete")
        .failing();
    let access = builder(&strategy).build().unwrap();
    let hits = Hits::default();

    let response = app(&access, &hits)
        .post("/Orders/Delete")
        .send()
        .await
        .assert_internal_error();

    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Authorization check failed");
    let fault = response.extensions.get::<AccessFault>().unwrap();
    assert_eq!(fault.resource.as_deref(), Some("Orders.Delete"));
    assert_eq!(hits.count(), 0);
}

#[test]
fn build_requires_both_strategies() {
    let err = AccessControl::builder()
        .add_control_strategy(StaticControlStrategy::new())
        .build()
        .unwrap_err();
    assert!(matches!(err, AccessControlError::Configuration(_)));

    let err = AccessControl::builder()
        .add_resource_strategy(CountingResourceStrategy::new())
        .build()
        .unwrap_err();
    assert!(matches!(err, AccessControlError::Configuration(_)));
}

#[test]
fn build_reports_invalid_options() {
    let err = AccessControl::builder()
        .strategies(CountingResourceStrategy::new(), StaticControlStrategy::new())
        .access_header_key("")
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        AccessControlError::MissingArgument("access_header_key")
    ));

    let err = AccessControl::builder()
        .strategies(CountingResourceStrategy::new(), StaticControlStrategy::new())
        .protect_any("/Orders/Delete", "")
        .build()
        .unwrap_err();
    assert!(matches!(err, AccessControlError::MissingArgument(_)));
}

#[tokio::test]
async fn add_replaces_and_try_add_keeps() {
    let first = CountingResourceStrategy::new();
    let second = CountingResourceStrategy::new().allow("Orders.Delete");

    let replaced = AccessControl::builder()
        .add_resource_strategy(first.clone())
        .add_resource_strategy(second.clone())
        .add_control_strategy(StaticControlStrategy::new())
        .protect(Method::POST, "/Orders/Delete", "Orders.Delete")
        .build()
        .unwrap();
    app(&replaced, &Hits::default())
        .post("/Orders/Delete")
        .send()
        .await
        .assert_ok();
    assert_eq!((first.calls(), second.calls()), (0, 1));

    let kept = AccessControl::builder()
        .try_add_resource_strategy(first.clone())
        .try_add_resource_strategy(second.clone())
        .add_control_strategy(StaticControlStrategy::new())
        .protect(Method::POST, "/Orders/Delete", "Orders.Delete")
        .build()
        .unwrap();
    app(&kept, &Hits::default())
        .post("/Orders/Delete")
        .send()
        .await
        .assert_redirect_to("/Account/Login");
    assert_eq!((first.calls(), second.calls()), (1, 1));
}

#[tokio::test]
async fn per_endpoint_mode_leaves_table_to_policies() {
    let strategy = CountingResourceStrategy::new();
    let access = builder(&strategy)
        .enforcement(EnforcementMode::PerEndpoint)
        .build()
        .unwrap();
    let hits = Hits::default();

    app(&access, &hits)
        .post("/Orders/Delete")
        .send()
        .await
        .assert_ok();
    assert_eq!(strategy.calls(), 0);
    assert_eq!(hits.count(), 1);
}

/// Sleeps forever and records whether its future was dropped.
struct Hanging {
    dropped: Arc<AtomicBool>,
    completed: Arc<AtomicBool>,
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl ResourceAccessStrategy for Hanging {
    fn is_allowed<'a>(
        &'a self,
        _principal: &'a Principal,
        _resource: &'a ResourceDescriptor,
    ) -> BoxFuture<'a, Result<AccessDecision, StrategyError>> {
        let flag = DropFlag(self.dropped.clone());
        let completed = self.completed.clone();
        Box::pin(async move {
            let _flag = flag;
            tokio::time::sleep(Duration::from_secs(30)).await;
            completed.store(true, Ordering::SeqCst);
            Ok(AccessDecision::allow())
        })
    }
}

#[tokio::test]
async fn dropping_the_request_cancels_the_strategy() {
    let dropped = Arc::new(AtomicBool::new(false));
    let completed = Arc::new(AtomicBool::new(false));
    let access = AccessControl::builder()
        .strategies(
            Hanging {
                dropped: dropped.clone(),
                completed: completed.clone(),
            },
            StaticControlStrategy::new(),
        )
        .protect(Method::POST, "/Orders/Delete", "Orders.Delete")
        .build()
        .unwrap();
    let hits = Hits::default();

    let response = app(&access, &hits)
        .post("/Orders/Delete")
        .send_with_timeout(Duration::from_millis(50))
        .await;

    assert!(response.is_none());
    assert!(dropped.load(Ordering::SeqCst));
    assert!(!completed.load(Ordering::SeqCst));
    assert_eq!(hits.count(), 0);
}

#[tokio::test]
async fn concurrent_requests_are_decided_independently() {
    let strategy = CountingResourceStrategy::new()
        .allow_for("alice", "Orders.Delete")
        .with_delay(Duration::from_millis(5));
    let access = builder(&strategy).build().unwrap();
    let hits = Hits::default();
    let app = app(&access, &hits);

    let requests = (0..40).map(|i| {
        let user = if i % 2 == 0 { "alice" } else { "bob" };
        let request = app
            .post("/Orders/Delete")
            .identity(TestIdentity::new(user));
        async move { (user, request.send().await.status) }
    });
    let results = futures_util::future::join_all(requests).await;

    for (user, status) in results {
        let expected = if user == "alice" {
            StatusCode::OK
        } else {
            StatusCode::FOUND
        };
        assert_eq!(status, expected, "user {user}");
    }
    assert_eq!(strategy.calls(), 40);
    assert_eq!(hits.count(), 20);
}
