//! Shared error-to-response mapping for route handlers.

use axum::http::StatusCode;
use axum::Json;
use lk_core::Error;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type RouteError = (StatusCode, Json<ErrorResponse>);

pub fn route_error(status: StatusCode, error: impl Into<String>) -> RouteError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

pub fn bad_request(error: impl Into<String>) -> RouteError {
    route_error(StatusCode::BAD_REQUEST, error)
}

pub fn not_found(error: impl Into<String>) -> RouteError {
    route_error(StatusCode::NOT_FOUND, error)
}

/// Map the core error taxonomy onto status codes: disabled capabilities and
/// bad input are client errors, missing records are 404, bad credentials are
/// 401, everything upstream or misconfigured is a 500. Nothing propagates as
/// an unhandled fault.
pub fn from_core(err: Error) -> RouteError {
    let status = match &err {
        Error::CapabilityDisabled(_) | Error::InvalidInput(_) | Error::UnknownCapability(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::ProviderNotConfigured(_) | Error::Upstream(_) | Error::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    route_error(status, err.to_string())
}

/// Reject blank required fields before touching a provider.
pub fn require_field(value: &str, name: &str) -> Result<(), RouteError> {
    if value.trim().is_empty() {
        return Err(bad_request(format!("Missing required field '{}'", name)));
    }
    Ok(())
}
