//! Rejections produced by the HTTP integration.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gatehouse_core::AccessControlError;
use std::fmt;

/// Marker placed in the extensions of a `500` response caused by a failing
/// access strategy, so host error handling can tell it apart from handler
/// errors.
#[derive(Debug, Clone)]
pub struct AccessFault {
    pub resource: Option<String>,
    pub message: String,
}

/// Why access control could not produce an answer.
///
/// This never represents a denial: denied requests are answered by the
/// configured unauthorized action.
#[derive(Debug)]
pub enum AccessRejection {
    /// A strategy failed while evaluating `resource`.
    Fault {
        resource: Option<String>,
        error: AccessControlError,
    },
    /// An extractor ran on a request that never went through the access
    /// control layer.
    MissingLayer(&'static str),
}

impl AccessRejection {
    pub fn fault(resource: Option<&str>, error: AccessControlError) -> Self {
        AccessRejection::Fault {
            resource: resource.map(str::to_string),
            error,
        }
    }
}

impl fmt::Display for AccessRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessRejection::Fault { error, .. } => write!(f, "{error}"),
            AccessRejection::MissingLayer(what) => {
                write!(f, "{what} requires the access control layer on this route")
            }
        }
    }
}

impl std::error::Error for AccessRejection {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AccessRejection::Fault { error, .. } => Some(error),
            AccessRejection::MissingLayer(_) => None,
        }
    }
}

impl IntoResponse for AccessRejection {
    fn into_response(self) -> Response {
        match self {
            AccessRejection::Fault { resource, error } => {
                tracing::error!(
                    error = %error,
                    resource = resource.as_deref().unwrap_or(""),
                    "authorization check failed"
                );
                let mut response = (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(serde_json::json!({ "error": "Authorization check failed" })),
                )
                    .into_response();
                response.extensions_mut().insert(AccessFault {
                    resource,
                    message: error.to_string(),
                });
                response
            }
            AccessRejection::MissingLayer(what) => {
                tracing::error!(extractor = what, "access control layer is not installed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(serde_json::json!({
                        "error": format!("{what} requires the access control layer")
                    })),
                )
                    .into_response()
            }
        }
    }
}
