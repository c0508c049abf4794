//! Strategy traits supplied by the host application.
//!
//! Two capabilities, two traits:
//!
//! - [`ResourceAccessStrategy`] answers "may this principal invoke this
//!   resource?" and drives request admission.
//! - [`ControlAccessStrategy`] answers "should this UI control be shown to
//!   this principal?" and is consulted by view code, possibly many times per
//!   page.
//!
//! Both take `&self` and must be safe to call from concurrent requests.
//! Implementations may be async (e.g. querying a permission store) and
//! should return [`StrategyError`] on faults rather than denying.
//!
//! ```ignore
//! use futures_util::future::BoxFuture;
//! use gatehouse_core::prelude::*;
//!
//! struct RoleStrategy;
//!
//! impl ResourceAccessStrategy for RoleStrategy {
//!     fn is_allowed<'a>(
//!         &'a self,
//!         principal: &'a Principal,
//!         resource: &'a ResourceDescriptor,
//!     ) -> BoxFuture<'a, Result<AccessDecision, StrategyError>> {
//!         Box::pin(async move { Ok(principal.has_role(resource.key()).into()) })
//!     }
//! }
//! ```

use crate::decision::AccessDecision;
use crate::error::StrategyError;
use crate::principal::Principal;
use crate::resource::ResourceDescriptor;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// Decides whether a principal may access a protected resource.
pub trait ResourceAccessStrategy: Send + Sync + 'static {
    fn is_allowed<'a>(
        &'a self,
        principal: &'a Principal,
        resource: &'a ResourceDescriptor,
    ) -> BoxFuture<'a, Result<AccessDecision, StrategyError>>;
}

/// Decides whether a UI control should be rendered for a principal.
pub trait ControlAccessStrategy: Send + Sync + 'static {
    fn can_show<'a>(
        &'a self,
        principal: &'a Principal,
        control_key: &'a str,
    ) -> BoxFuture<'a, Result<bool, StrategyError>>;
}

impl<T: ResourceAccessStrategy + ?Sized> ResourceAccessStrategy for Arc<T> {
    fn is_allowed<'a>(
        &'a self,
        principal: &'a Principal,
        resource: &'a ResourceDescriptor,
    ) -> BoxFuture<'a, Result<AccessDecision, StrategyError>> {
        (**self).is_allowed(principal, resource)
    }
}

impl<T: ControlAccessStrategy + ?Sized> ControlAccessStrategy for Arc<T> {
    fn can_show<'a>(
        &'a self,
        principal: &'a Principal,
        control_key: &'a str,
    ) -> BoxFuture<'a, Result<bool, StrategyError>> {
        (**self).can_show(principal, control_key)
    }
}
