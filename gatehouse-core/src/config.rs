//! Configuration for access control.

use crate::error::AccessControlError;
use crate::resource::{Endpoint, ResourceTable};
use http::{HeaderName, HeaderValue, Method};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Header carrying the alternate access key when none is configured.
pub const DEFAULT_ACCESS_HEADER_KEY: &str = "X-Access-Key";

/// Redirect target of the default unauthorized action.
pub const DEFAULT_LOGIN_PATH: &str = "/Account/Login";

const ENV_PREFIX: &str = "ACCESS_CONTROL_";

fn default_access_header_key() -> String {
    DEFAULT_ACCESS_HEADER_KEY.to_string()
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

/// Where access decisions are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// The middleware checks every request against the resource table.
    #[default]
    Global,
    /// The middleware only establishes the request scope; checks happen on
    /// routes carrying an access policy layer.
    PerEndpoint,
}

impl FromStr for EnforcementMode {
    type Err = AccessControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "global" => Ok(EnforcementMode::Global),
            "per_endpoint" => Ok(EnforcementMode::PerEndpoint),
            other => Err(AccessControlError::InvalidConfig(format!(
                "unknown enforcement mode '{other}'"
            ))),
        }
    }
}

/// What happens to a request that is denied.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UnauthorizedConfig {
    /// `302 Found` to the login path.
    Redirect {
        #[serde(default = "default_login_path")]
        login_path: String,
    },
    /// `403 Forbidden`.
    Forbidden,
}

impl Default for UnauthorizedConfig {
    fn default() -> Self {
        UnauthorizedConfig::Redirect {
            login_path: default_login_path(),
        }
    }
}

/// One protected endpoint, as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceRule {
    /// HTTP method; any method when omitted.
    #[serde(default)]
    pub method: Option<String>,
    /// Route pattern, e.g. `/Orders/Delete` or `/orders/{id}`.
    pub path: String,
    /// Resource key handed to the strategy.
    pub key: String,
}

/// Access control configuration.
///
/// Deserialized from the `access_control` section of a YAML document. All
/// fields have defaults, so an empty section is valid.
///
/// ```yaml
/// access_control:
///   access_header_key: X-Access-Key     # default
///   enforcement: global                 # global | per_endpoint
///   unauthorized:
///     action: redirect                  # redirect | forbidden
///     login_path: /Account/Login        # default
///   resources:
///     - path: /Orders/Delete
///       method: POST
///       key: Orders.Delete
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessControlConfig {
    #[serde(default = "default_access_header_key")]
    pub access_header_key: String,
    #[serde(default)]
    pub enforcement: EnforcementMode,
    #[serde(default)]
    pub unauthorized: UnauthorizedConfig,
    #[serde(default)]
    pub resources: Vec<ResourceRule>,
}

#[derive(Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    access_control: Option<AccessControlConfig>,
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            access_header_key: default_access_header_key(),
            enforcement: EnforcementMode::default(),
            unauthorized: UnauthorizedConfig::default(),
            resources: Vec::new(),
        }
    }
}

impl AccessControlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `access_control` section of a YAML document.
    ///
    /// A document without that section yields the defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AccessControlError> {
        let doc: ConfigDocument = serde_yaml::from_str(yaml)?;
        let config = doc.access_control.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AccessControlError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AccessControlError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load from a YAML file, then overlay `ACCESS_CONTROL_*` environment variables.
    ///
    /// A missing file is not an error: defaults are used.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AccessControlError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!(path = %path.display(), "no access control config file, using defaults");
            Self::default()
        };
        config.overlay_env(std::env::vars())?;
        Ok(config)
    }

    /// Apply environment overrides.
    ///
    /// Convention: `ACCESS_CONTROL_ACCESS_HEADER_KEY` overrides
    /// `access_control.access_header_key`. Also recognised:
    /// `ACCESS_CONTROL_ENFORCEMENT`, `ACCESS_CONTROL_UNAUTHORIZED`
    /// (`redirect` | `forbidden`) and `ACCESS_CONTROL_LOGIN_PATH`.
    pub fn overlay_env<I>(&mut self, vars: I) -> Result<(), AccessControlError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut login_override = None;
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "ACCESS_HEADER_KEY" => self.access_header_key = value,
                "ENFORCEMENT" => self.enforcement = value.parse()?,
                "UNAUTHORIZED" => {
                    self.unauthorized = match value.trim().to_ascii_lowercase().as_str() {
                        "forbidden" => UnauthorizedConfig::Forbidden,
                        "redirect" => UnauthorizedConfig::default(),
                        other => {
                            return Err(AccessControlError::InvalidConfig(format!(
                                "unknown unauthorized action '{other}'"
                            )))
                        }
                    }
                }
                "LOGIN_PATH" => login_override = Some(value),
                _ => {}
            }
        }
        // Applied last so it does not depend on variable ordering.
        if let (Some(path), UnauthorizedConfig::Redirect { login_path }) =
            (login_override, &mut self.unauthorized)
        {
            *login_path = path;
        }
        self.validate()
    }

    pub fn with_access_header_key(mut self, key: impl Into<String>) -> Self {
        self.access_header_key = key.into();
        self
    }

    pub fn with_enforcement(mut self, mode: EnforcementMode) -> Self {
        self.enforcement = mode;
        self
    }

    /// Redirect denied requests to `path`.
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.unauthorized = UnauthorizedConfig::Redirect {
            login_path: path.into(),
        };
        self
    }

    /// Answer denied requests with `403 Forbidden`.
    pub fn forbidden(mut self) -> Self {
        self.unauthorized = UnauthorizedConfig::Forbidden;
        self
    }

    pub fn with_resource(
        mut self,
        method: Option<&str>,
        path: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.resources.push(ResourceRule {
            method: method.map(str::to_string),
            path: path.into(),
            key: key.into(),
        });
        self
    }

    /// The configured access header as a typed header name.
    pub fn header_name(&self) -> Result<HeaderName, AccessControlError> {
        let key = self.access_header_key.trim();
        if key.is_empty() {
            return Err(AccessControlError::MissingArgument("access_header_key"));
        }
        HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            AccessControlError::InvalidConfig(format!("invalid access header key '{key}': {e}"))
        })
    }

    /// Build the resource table described by `resources`.
    pub fn resource_table(&self) -> Result<ResourceTable, AccessControlError> {
        let mut builder = ResourceTable::builder();
        for rule in &self.resources {
            let endpoint = match &rule.method {
                Some(method) => Endpoint::new(parse_method(method)?, rule.path.clone()),
                None => Endpoint::any(rule.path.clone()),
            };
            builder = builder.insert(endpoint, &rule.key);
        }
        builder.build()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), AccessControlError> {
        self.header_name()?;
        if let UnauthorizedConfig::Redirect { login_path } = &self.unauthorized {
            login_location(login_path)?;
        }
        self.resource_table()?;
        Ok(())
    }
}

/// Check a login path and turn it into a `Location` header value.
pub fn login_location(path: &str) -> Result<HeaderValue, AccessControlError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(AccessControlError::MissingArgument("login_path"));
    }
    HeaderValue::from_str(path).map_err(|_| {
        AccessControlError::InvalidConfig(format!(
            "invalid login path '{}': not a valid Location header value",
            path.escape_debug()
        ))
    })
}

fn parse_method(method: &str) -> Result<Method, AccessControlError> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| AccessControlError::InvalidConfig(format!("invalid HTTP method '{method}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_method_is_case_insensitive() {
        assert_eq!(parse_method("delete").unwrap(), Method::DELETE);
        assert!(parse_method("NOT A METHOD").is_err());
    }

    #[test]
    fn enforcement_mode_from_str() {
        assert_eq!("global".parse::<EnforcementMode>().unwrap(), EnforcementMode::Global);
        assert_eq!(
            "per-endpoint".parse::<EnforcementMode>().unwrap(),
            EnforcementMode::PerEndpoint
        );
        assert!("sometimes".parse::<EnforcementMode>().is_err());
    }

    #[test]
    fn login_location_rejects_empty_and_control_characters() {
        assert_eq!(login_location(" /Account/Login ").unwrap(), "/Account/Login");
        assert!(matches!(
            login_location("   "),
            Err(AccessControlError::MissingArgument("login_path"))
        ));
        assert!(matches!(
            login_location("/Account/Login\nX-Injected: yes"),
            Err(AccessControlError::InvalidConfig(_))
        ));
    }
}
