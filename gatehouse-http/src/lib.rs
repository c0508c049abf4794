//! Axum integration for Gatehouse.
//!
//! - [`AccessControl`] / [`AccessControlBuilder`]: strategy registration,
//!   options and the resource table, assembled once at startup.
//! - [`AccessControlLayer`]: global middleware enforcing the resource table.
//! - [`PolicyLayer`] with [`AccessAuthorizationHandler`]: per-route
//!   enforcement via `route_layer`.
//! - [`CurrentPrincipal`] / [`Controls`]: handler extractors.
//!
//! ```ignore
//! use gatehouse_http::AccessControl;
//!
//! let access = AccessControl::builder()
//!     .strategies(AclStrategy::new(store), MenuStrategy)
//!     .protect(Method::POST, "/Orders/Delete", "Orders.Delete")
//!     .build()?;
//!
//! let app = Router::new()
//!     .route("/Orders/Delete", post(delete_order))
//!     .layer(access.layer());
//! ```

pub mod access;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod options;
pub mod policy;

pub use access::{AccessControl, AccessControlBuilder, AdmittedResource};
pub use error::{AccessFault, AccessRejection};
pub use extract::{Controls, CurrentPrincipal};
pub use middleware::{AccessControlLayer, AccessControlService, ResponseFuture};
pub use options::{AccessControlOptions, UnauthorizedAction};
pub use policy::{
    AccessAuthorizationHandler, AccessRequirement, AuthorizationPolicy, PolicyLayer,
    PolicyService, POLICY_NAME,
};
