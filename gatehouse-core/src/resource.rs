//! Protected resources and the endpoint registration table.
//!
//! Endpoints are tagged explicitly at startup instead of being discovered
//! at request time: the [`ResourceTable`] maps an [`Endpoint`] (method +
//! route pattern) to the [`ResourceDescriptor`] that protects it.
//!
//! ```
//! use gatehouse_core::resource::ResourceTable;
//! use http::Method;
//!
//! let table = ResourceTable::builder()
//!     .protect(Method::POST, "/Orders/Delete", "Orders.Delete")
//!     .protect_any("/Admin/{section}", "Admin.View")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(
//!     table.resolve(&Method::POST, "/Orders/Delete").map(|d| d.key()),
//!     Some("Orders.Delete")
//! );
//! assert!(table.resolve(&Method::GET, "/Home/Index").is_none());
//! ```

use crate::error::AccessControlError;
use http::Method;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Identifies a protected resource by its unique key (e.g. `"Orders.Delete"`).
///
/// Immutable and cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
    key: Arc<str>,
}

impl ResourceDescriptor {
    /// Create a descriptor. The key must not be empty.
    pub fn new(key: impl AsRef<str>) -> Result<Self, AccessControlError> {
        let key = key.as_ref().trim();
        if key.is_empty() {
            return Err(AccessControlError::MissingArgument("resource key"));
        }
        Ok(Self { key: Arc::from(key) })
    }

    /// Derive the conventional `"Controller.Action"` key.
    pub fn from_action(controller: &str, action: &str) -> Result<Self, AccessControlError> {
        let controller = controller.trim();
        let action = action.trim();
        if controller.is_empty() {
            return Err(AccessControlError::MissingArgument("controller"));
        }
        if action.is_empty() {
            return Err(AccessControlError::MissingArgument("action"));
        }
        Self::new(format!("{controller}.{action}"))
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResourceDescriptor").field(&&*self.key).finish()
    }
}

/// Registration key of an endpoint: HTTP method (or any) plus route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub method: Option<Method>,
    pub path: String,
}

impl Endpoint {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            path: path.into(),
        }
    }

    /// Endpoint matching every method on `path`.
    pub fn any(path: impl Into<String>) -> Self {
        Self {
            method: None,
            path: path.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{} {}", method, self.path),
            None => write!(f, "* {}", self.path),
        }
    }
}

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    CatchAll,
    Param,
    Static(String),
}

impl Segment {
    /// Matching priority: static beats `{param}` beats `{*rest}`.
    fn rank(&self) -> u8 {
        match self {
            Segment::Static(_) => 2,
            Segment::Param => 1,
            Segment::CatchAll => 0,
        }
    }
}

/// A registered path containing `{param}` or `{*rest}` segments.
#[derive(Debug, Clone)]
struct RoutePattern {
    path: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// `None` when `path` has no parameters.
    fn parse(path: &str) -> Option<Self> {
        let segments: Vec<Segment> = path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) if name.starts_with('*') => Segment::CatchAll,
                Some(name) if !name.is_empty() && !name.contains(['{', '}']) => Segment::Param,
                _ => Segment::Static(segment.to_string()),
            })
            .collect();
        if segments.iter().all(|s| matches!(s, Segment::Static(_))) {
            return None;
        }
        Some(Self {
            path: path.to_string(),
            segments,
        })
    }

    fn matches(&self, path: &str) -> bool {
        let mut parts = path.trim_start_matches('/').split('/');
        for segment in &self.segments {
            match segment {
                Segment::CatchAll => return parts.any(|part| !part.is_empty()),
                Segment::Param => match parts.next() {
                    Some(part) if !part.is_empty() => {}
                    _ => return false,
                },
                Segment::Static(expected) => {
                    if parts.next() != Some(expected.as_str()) {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }

    fn priority(&self) -> Vec<u8> {
        self.segments.iter().map(Segment::rank).collect()
    }
}

/// Immutable lookup table from endpoint to resource descriptor.
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    entries: HashMap<Endpoint, ResourceDescriptor>,
    // Distinct parameterised paths, most specific first.
    patterns: Vec<RoutePattern>,
}

impl ResourceTable {
    pub fn builder() -> ResourceTableBuilder {
        ResourceTableBuilder::default()
    }

    /// Resolve the descriptor protecting `method path`.
    ///
    /// Method-specific registrations win over any-method ones. Lookup is
    /// exact on the path, which should be the matched route pattern.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&ResourceDescriptor> {
        let exact = Endpoint {
            method: Some(method.clone()),
            path: path.to_string(),
        };
        self.entries.get(&exact).or_else(|| {
            self.entries.get(&Endpoint {
                method: None,
                path: exact.path,
            })
        })
    }

    /// Resolve the descriptor protecting a concrete request path such as
    /// `/orders/42`.
    ///
    /// Exact registrations are tried first, then parameterised ones
    /// (`/orders/{id}`, `/files/{*path}`) in router priority order: at each
    /// segment a static match is preferred over `{param}`, and `{param}`
    /// over a catch-all.
    pub fn resolve_path(&self, method: &Method, path: &str) -> Option<&ResourceDescriptor> {
        if let Some(descriptor) = self.resolve(method, path) {
            return Some(descriptor);
        }
        self.patterns
            .iter()
            .filter(|pattern| pattern.matches(path))
            .find_map(|pattern| self.resolve(method, &pattern.path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Endpoint, &ResourceDescriptor)> {
        self.entries.iter()
    }
}

/// Builder for [`ResourceTable`]. Errors are collected and reported by
/// [`build`](Self::build) so registrations can be chained.
#[derive(Debug, Default)]
pub struct ResourceTableBuilder {
    entries: HashMap<Endpoint, ResourceDescriptor>,
    errors: Vec<AccessControlError>,
}

impl ResourceTableBuilder {
    /// Protect `method path` with the resource `key`.
    pub fn protect(self, method: Method, path: impl Into<String>, key: impl AsRef<str>) -> Self {
        self.insert(Endpoint::new(method, path), key)
    }

    /// Protect every method on `path` with the resource `key`.
    pub fn protect_any(self, path: impl Into<String>, key: impl AsRef<str>) -> Self {
        self.insert(Endpoint::any(path), key)
    }

    /// Register an endpoint; a later registration for the same endpoint replaces the earlier one.
    pub fn insert(mut self, endpoint: Endpoint, key: impl AsRef<str>) -> Self {
        if endpoint.path.is_empty() {
            self.errors
                .push(AccessControlError::MissingArgument("endpoint path"));
            return self;
        }
        match ResourceDescriptor::new(key) {
            Ok(descriptor) => {
                if let Some(previous) = self.entries.insert(endpoint.clone(), descriptor) {
                    tracing::warn!(
                        endpoint = %endpoint,
                        previous = %previous,
                        "endpoint registered twice, keeping the latest resource"
                    );
                }
            }
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Merge every entry of an existing table.
    pub fn extend(mut self, table: &ResourceTable) -> Self {
        for (endpoint, descriptor) in table.iter() {
            self.entries.insert(endpoint.clone(), descriptor.clone());
        }
        self
    }

    pub fn build(mut self) -> Result<ResourceTable, AccessControlError> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        let paths: BTreeSet<&str> = self.entries.keys().map(|e| e.path.as_str()).collect();
        let mut patterns: Vec<RoutePattern> =
            paths.into_iter().filter_map(RoutePattern::parse).collect();
        patterns.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Ok(ResourceTable {
            entries: self.entries,
            patterns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_rejects_empty_key() {
        assert!(matches!(
            ResourceDescriptor::new("  "),
            Err(AccessControlError::MissingArgument("resource key"))
        ));
    }

    #[test]
    fn descriptor_from_action() {
        let d = ResourceDescriptor::from_action("Orders", "Delete").unwrap();
        assert_eq!(d.key(), "Orders.Delete");
        assert_eq!(d.to_string(), "Orders.Delete");
    }

    #[test]
    fn method_specific_entry_wins_over_any() {
        let table = ResourceTable::builder()
            .protect_any("/orders", "Orders.Any")
            .protect(Method::DELETE, "/orders", "Orders.Delete")
            .build()
            .unwrap();

        assert_eq!(
            table.resolve(&Method::DELETE, "/orders").unwrap().key(),
            "Orders.Delete"
        );
        assert_eq!(
            table.resolve(&Method::GET, "/orders").unwrap().key(),
            "Orders.Any"
        );
    }

    #[test]
    fn lookup_is_exact() {
        let table = ResourceTable::builder()
            .protect(Method::GET, "/orders/{id}", "Orders.View")
            .build()
            .unwrap();

        assert!(table.resolve(&Method::GET, "/orders/42").is_none());
        assert!(table.resolve(&Method::GET, "/orders/{id}").is_some());
        assert!(table.resolve(&Method::POST, "/orders/{id}").is_none());
    }

    #[test]
    fn concrete_path_resolves_through_its_pattern() {
        let table = ResourceTable::builder()
            .protect(Method::GET, "/orders/{id}", "Orders.View")
            .protect_any("/files/{*path}", "Files.Read")
            .build()
            .unwrap();

        assert_eq!(
            table.resolve_path(&Method::GET, "/orders/42").unwrap().key(),
            "Orders.View"
        );
        assert_eq!(
            table.resolve_path(&Method::PUT, "/files/a/b.txt").unwrap().key(),
            "Files.Read"
        );
        assert!(table.resolve_path(&Method::POST, "/orders/42").is_none());
        assert!(table.resolve_path(&Method::GET, "/orders").is_none());
        assert!(table.resolve_path(&Method::GET, "/orders/").is_none());
        assert!(table.resolve_path(&Method::GET, "/orders/42/items").is_none());
        assert!(table.resolve_path(&Method::GET, "/files/").is_none());
    }

    #[test]
    fn static_segments_take_priority_over_params() {
        let table = ResourceTable::builder()
            .protect(Method::GET, "/orders/{id}", "Orders.View")
            .protect(Method::GET, "/orders/export", "Orders.Export")
            .protect(Method::GET, "/{section}/export", "Section.Export")
            .build()
            .unwrap();

        assert_eq!(
            table.resolve_path(&Method::GET, "/orders/export").unwrap().key(),
            "Orders.Export"
        );
        assert_eq!(
            table.resolve_path(&Method::GET, "/reports/export").unwrap().key(),
            "Section.Export"
        );
        assert_eq!(
            table.resolve_path(&Method::GET, "/orders/7").unwrap().key(),
            "Orders.View"
        );
    }

    #[test]
    fn pattern_without_method_match_falls_through() {
        let table = ResourceTable::builder()
            .protect(Method::DELETE, "/orders/{id}", "Orders.Delete")
            .protect_any("/{collection}/{id}", "Records.Any")
            .build()
            .unwrap();

        assert_eq!(
            table.resolve_path(&Method::DELETE, "/orders/7").unwrap().key(),
            "Orders.Delete"
        );
        assert_eq!(
            table.resolve_path(&Method::GET, "/orders/7").unwrap().key(),
            "Records.Any"
        );
    }

    #[test]
    fn builder_reports_first_error() {
        let result = ResourceTable::builder()
            .protect(Method::GET, "/ok", "Ok")
            .protect(Method::GET, "/bad", "")
            .build();
        assert!(matches!(
            result,
            Err(AccessControlError::MissingArgument("resource key"))
        ));
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let table = ResourceTable::builder()
            .protect(Method::GET, "/a", "First")
            .protect(Method::GET, "/a", "Second")
            .build()
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve(&Method::GET, "/a").unwrap().key(), "Second");
    }
}
