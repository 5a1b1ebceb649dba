//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::ValidationError;
use crate::services::{ActionError, CatalogError, GatewayError, SessionError};

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found
    NotFound(String),
    /// Invalid request (validation error)
    BadRequest(String),
    /// The request conflicts with work already in progress
    Conflict(String),
    /// Internal server error
    Internal(String),
    /// Catalog lookup error
    Catalog(CatalogError),
    /// Remote backend error
    Gateway(GatewayError),
    /// Site has nothing to locate
    NoCoordinates(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ApiError::new("CONFLICT", msg)),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INTERNAL_ERROR", msg),
            ),
            AppError::Catalog(e) => {
                let msg = e.to_string();
                match e {
                    CatalogError::IndexOutOfRange { .. } => {
                        (StatusCode::NOT_FOUND, ApiError::new("INDEX_ERROR", msg))
                    }
                    CatalogError::StaleGeneration { current, .. } => (
                        StatusCode::GONE,
                        ApiError::new("STALE_INDEX", msg)
                            .with_details(format!("current generation: {}", current)),
                    ),
                    CatalogError::Empty => {
                        (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg))
                    }
                    CatalogError::Serialization(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiError::new("INTERNAL_ERROR", msg),
                    ),
                }
            }
            AppError::Gateway(e) => {
                let code = match e {
                    GatewayError::Network(_) => "NETWORK_ERROR",
                    GatewayError::Application(_) => "APPLICATION_ERROR",
                    GatewayError::Decode(_) => "DECODE_ERROR",
                };
                (StatusCode::BAD_GATEWAY, ApiError::new(code, e.message()))
            }
            AppError::NoCoordinates(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiError::new("NO_COORDINATES", msg),
            ),
        };

        (status, Json(error)).into_response()
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        AppError::Catalog(err)
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Gateway(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<ActionError> for AppError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::Catalog(e) => AppError::Catalog(e),
            ActionError::Gateway(e) => AppError::Gateway(e),
            ActionError::Blocked(_) => AppError::Conflict(err.to_string()),
            ActionError::NoPanel(_) => AppError::BadRequest(err.to_string()),
            ActionError::NoCoordinates { .. } => AppError::NoCoordinates(err.to_string()),
            ActionError::Interrupted(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Validation(e) => e.into(),
            SessionError::Gateway(e) => AppError::Gateway(e),
            SessionError::Catalog(e) => AppError::Catalog(e),
            SessionError::ExtractionInProgress => AppError::Conflict(err.to_string()),
            SessionError::NoDocument => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
