//! Error types for the access-control pipeline.
//!
//! A denied request is **not** an error: it is an [`AccessDecision`] with
//! `allowed == false`. Errors are reserved for misconfiguration and for
//! faults inside strategy implementations.
//!
//! [`AccessDecision`]: crate::decision::AccessDecision

use std::fmt;

/// Errors raised while configuring or running access control.
#[derive(Debug)]
pub enum AccessControlError {
    /// A required strategy was never registered. Fatal at startup.
    Configuration(String),
    /// A required argument was absent or empty.
    MissingArgument(&'static str),
    /// The configuration is malformed (bad header name, unknown method, YAML error).
    InvalidConfig(String),
    /// A strategy implementation failed unexpectedly.
    Strategy(StrategyError),
}

impl fmt::Display for AccessControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessControlError::Configuration(msg) => {
                write!(f, "Access control configuration error: {msg}")
            }
            AccessControlError::MissingArgument(name) => {
                write!(f, "Missing required argument: {name}")
            }
            AccessControlError::InvalidConfig(msg) => {
                write!(f, "Invalid access control config: {msg}")
            }
            AccessControlError::Strategy(err) => write!(f, "Access strategy failed: {err}"),
        }
    }
}

impl std::error::Error for AccessControlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AccessControlError::Strategy(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StrategyError> for AccessControlError {
    fn from(err: StrategyError) -> Self {
        AccessControlError::Strategy(err)
    }
}

impl From<serde_yaml::Error> for AccessControlError {
    fn from(err: serde_yaml::Error) -> Self {
        AccessControlError::InvalidConfig(err.to_string())
    }
}

/// An unexpected failure inside a strategy (store unreachable, timeout, ...).
///
/// Strategies return this instead of denying, so that faults surface as
/// server errors rather than silently turning into "access denied".
#[derive(Debug)]
pub struct StrategyError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StrategyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error, keeping it as the error source.
    pub fn from_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for StrategyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
