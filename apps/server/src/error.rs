//! Error types for the enrollment backend.
//!
//! Two kinds of failure travel through the service layer:
//! - [`Error`] is raised (returned through `?`) for invalid input, missing
//!   identifiers, stale updates and infrastructure failures.
//! - [`ErrorResponse`] is a typed, expected domain outcome (permission denial,
//!   duplicate email, a full workshop) that services hand back as a value.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

/// Result of an operation that may end in an expected, typed domain failure.
pub type Typed<T> = std::result::Result<T, ErrorResponse>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    OutOfRange(String),

    #[error("{0}")]
    Concurrency(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::OutOfRange(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Concurrency(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::OutOfRange(_) => "out_of_range",
            Self::Concurrency(_) => "concurrency",
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::ExternalService(_) => "external_service",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::ExternalService(error.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Never leak driver details to clients.
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "Database error while handling request");
                "A database error occurred".to_string()
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error while handling request");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "status": status.as_u16(),
            "error": self.kind(),
            "message": message,
        }));

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Machine-readable detail attached to a typed error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub group: String,
    pub code: String,
    pub description: String,
}

impl ApiError {
    pub fn new(group: &str, code: &str, description: impl Into<String>) -> Self {
        Self {
            group: group.to_string(),
            code: code.to_string(),
            description: description.into(),
        }
    }
}

/// Typed failure returned by services instead of raising an [`Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub api_errors: Vec<ApiError>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: Option<String>) -> Self {
        Self {
            status: status.as_u16(),
            message,
            api_errors: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, Some(message.into()))
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, None)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, Some(message.into()))
    }

    pub fn with_api_error(mut self, api_error: ApiError) -> Self {
        self.api_errors.push(api_error);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_http_statuses() {
        assert_eq!(
            Error::InvalidArgument("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::OutOfRange("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Concurrency("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::ExternalService("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn typed_response_keeps_api_errors() {
        let response = ErrorResponse::bad_request("Workshop is full")
            .with_api_error(ApiError::new("Application", "WorkshopIsFull", "no seats"));
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.api_errors.len(), 1);

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["apiErrors"][0]["code"], "WorkshopIsFull");
        assert_eq!(value["status"], 400);
    }

    #[test]
    fn unknown_status_falls_back_to_internal_error() {
        let response = ErrorResponse {
            status: 1000,
            message: None,
            api_errors: Vec::new(),
        };
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
