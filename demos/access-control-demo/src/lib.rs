//! Demo application: an order back-office protected by Gatehouse.
//!
//! - `/Home/Index` is open to everyone.
//! - `/Orders` and `POST /Orders/Delete` are protected through the resource
//!   table in `application.yaml`.
//! - `/Admin/Dashboard` carries its own policy layer.
//! - The orders page shows edit/delete buttons only to users allowed to use
//!   them.

pub mod auth;
pub mod permissions;
pub mod routes;

use axum::Router;
use gatehouse::prelude::*;
use permissions::{ActionAccessStrategy, MenuControlStrategy, PermissionStore};
use tower_http::trace::TraceLayer;

/// Assemble the application router.
pub fn build_app(
    config: &AccessControlConfig,
    store: PermissionStore,
) -> Result<Router, AccessControlError> {
    let per_request = store.clone();
    let access = AccessControl::builder()
        .from_config(config)
        .add_resource_strategy_with_lifetime(StrategyLifetime::PerRequest, move || {
            ActionAccessStrategy::new(per_request.clone())
        })
        .add_control_strategy(MenuControlStrategy::new(store.clone()))
        .build()?;

    // Layers run outermost-last: tracing, then authentication, then access control.
    Ok(routes::router(&access)?
        .layer(access.layer())
        .layer(axum::middleware::from_fn_with_state(
            store,
            auth::authenticate,
        ))
        .layer(TraceLayer::new_for_http()))
}
