use std::fmt;
use std::sync::Arc;

/// Trait representing an authenticated identity (user, service account, etc.).
///
/// Implement this trait on the identity type your authentication layer
/// produces. Strategies only see it through [`Principal`].
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `Identity`",
    label = "this type cannot be used as an identity",
    note = "implement `Identity` for your user type so it can be wrapped in `CurrentIdentity`"
)]
pub trait Identity: Send + Sync + 'static {
    /// Unique subject identifier (e.g. user id, JWT "sub" claim).
    fn sub(&self) -> &str;

    /// Roles associated with this identity.
    fn roles(&self) -> &[String] {
        &[]
    }

    /// Raw claims, if available.
    fn claims(&self) -> Option<&serde_json::Value> {
        None
    }
}

/// The identity of the current request, as placed in request extensions by
/// the host's authentication layer.
///
/// ```ignore
/// req.extensions_mut().insert(CurrentIdentity::new(user));
/// ```
#[derive(Clone)]
pub struct CurrentIdentity(pub Arc<dyn Identity>);

impl CurrentIdentity {
    pub fn new(identity: impl Identity) -> Self {
        Self(Arc::new(identity))
    }
}

impl fmt::Debug for CurrentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CurrentIdentity").field(&self.0.sub()).finish()
    }
}

/// The principal a decision is made for: an identity (or none) plus the
/// optional access key supplied through the configured header.
#[derive(Clone, Default)]
pub struct Principal {
    identity: Option<Arc<dyn Identity>>,
    access_key: Option<String>,
}

impl Principal {
    /// A principal without identity and without access key.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(identity: Arc<dyn Identity>) -> Self {
        Self {
            identity: Some(identity),
            access_key: None,
        }
    }

    /// Attach the alternate credential read from the access header.
    pub fn with_access_key(mut self, key: impl Into<String>) -> Self {
        self.access_key = Some(key.into());
        self
    }

    pub fn identity(&self) -> Option<&dyn Identity> {
        self.identity.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Subject of the identity, if authenticated.
    pub fn sub(&self) -> Option<&str> {
        self.identity.as_deref().map(|i| i.sub())
    }

    pub fn roles(&self) -> &[String] {
        self.identity.as_deref().map(|i| i.roles()).unwrap_or(&[])
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles().iter().any(|r| r == role)
    }

    pub fn access_key(&self) -> Option<&str> {
        self.access_key.as_deref()
    }
}

impl From<CurrentIdentity> for Principal {
    fn from(current: CurrentIdentity) -> Self {
        Principal::authenticated(current.0)
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The access key is a credential and never printed.
        f.debug_struct("Principal")
            .field("sub", &self.sub())
            .field("access_key", &self.access_key.as_ref().map(|_| "***"))
            .finish()
    }
}
