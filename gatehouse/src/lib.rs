//! Gatehouse: pluggable authorization for Axum.
//!
//! This facade crate re-exports the Gatehouse sub-crates through a single
//! dependency. Import everything you need with:
//!
//! ```ignore
//! use gatehouse::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature | Default | Crate            |
//! |---------|---------|------------------|
//! | `http`  | **yes** | `gatehouse-http` |

pub extern crate gatehouse_core;

// Everything from gatehouse-core at the top level.
pub use gatehouse_core::*;

#[cfg(feature = "http")]
pub use gatehouse_http;

#[cfg(feature = "http")]
pub use gatehouse_http::{
    AccessAuthorizationHandler, AccessControl, AccessControlBuilder, AccessControlLayer,
    AccessControlOptions, AccessFault, AccessRejection, AccessRequirement, AuthorizationPolicy,
    Controls, CurrentPrincipal, PolicyLayer, UnauthorizedAction, POLICY_NAME,
};

pub mod prelude {
    //! Types most applications need.
    pub use gatehouse_core::prelude::*;
    pub use gatehouse_core::{
        AccessControlConfig, EnforcementMode, ResourceTable, StrategyLifetime,
    };

    #[cfg(feature = "http")]
    pub use gatehouse_http::{
        AccessControl, AccessControlOptions, AuthorizationPolicy, Controls, CurrentPrincipal,
        PolicyLayer, UnauthorizedAction,
    };
}
