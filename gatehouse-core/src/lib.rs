//! Core decision pipeline for Gatehouse.
//!
//! This crate is framework-agnostic: it knows about principals, protected
//! resources, access strategies and their lifetimes, but nothing about
//! routers or responses. The axum integration lives in `gatehouse-http`.
//!
//! # Pieces
//!
//! - [`ResourceDescriptor`] / [`ResourceTable`]: which endpoints are
//!   protected, and by which resource key.
//! - [`ResourceAccessStrategy`] / [`ControlAccessStrategy`]: the two
//!   decisions the host application plugs in.
//! - [`StrategyRegistry`]: registration with `add` / `try_add` semantics and
//!   an explicit [`StrategyLifetime`].
//! - [`RequestScope`]: per-request state (principal, strategy instances and
//!   the control memo).
//! - [`AccessControlConfig`]: YAML/env configuration.
//!
//! # Example
//!
//! ```ignore
//! use gatehouse_core::prelude::*;
//!
//! let mut registry = StrategyRegistry::new();
//! registry
//!     .add_resource_strategy(MyAclStrategy::new(store.clone()))
//!     .add_control_strategy(MyControlStrategy);
//! let strategies = registry.build()?;
//!
//! let scope = strategies.open_scope(Principal::anonymous());
//! let decision = scope.check(&ResourceDescriptor::new("Orders.Delete")?).await?;
//! ```

pub mod config;
pub mod control;
pub mod decision;
pub mod error;
pub mod lifetime;
pub mod principal;
pub mod registry;
pub mod resource;
pub mod scope;
pub mod strategy;

pub use config::{
    login_location, AccessControlConfig, EnforcementMode, ResourceRule, UnauthorizedConfig,
    DEFAULT_ACCESS_HEADER_KEY, DEFAULT_LOGIN_PATH,
};
pub use control::ControlGate;
pub use decision::AccessDecision;
pub use error::{AccessControlError, StrategyError};
pub use lifetime::{ScopedStrategy, StrategyLifetime, StrategyProvider};
pub use principal::{CurrentIdentity, Identity, Principal};
pub use registry::{StrategyRegistry, StrategySet};
pub use resource::{Endpoint, ResourceDescriptor, ResourceTable, ResourceTableBuilder};
pub use scope::RequestScope;
pub use strategy::{ControlAccessStrategy, ResourceAccessStrategy};

// Strategy implementations return this future type.
pub use futures_util::future::BoxFuture;

pub mod prelude {
    //! Re-exports of the types strategy implementations need.
    pub use crate::{
        AccessControlError, AccessDecision, BoxFuture, ControlAccessStrategy, ControlGate,
        CurrentIdentity, Identity, Principal, ResourceAccessStrategy, ResourceDescriptor,
        StrategyError, StrategyLifetime, StrategyRegistry,
    };
}
