//! HTTP error handling and response types.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::models::WindowError;

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
///
/// Store failures never reach a handler as errors: `/flux` reports them by
/// ending the body stream and `/health` folds them into its status.
#[derive(Debug)]
pub enum AppError {
    /// Malformed window
    BadRequest(String),
    /// Body that is not the expected JSON
    InvalidBody(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => {
                debug!("Rejected request: {}", msg);
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::InvalidBody(details) => {
                debug!("Rejected request body: {}", details);
                (
                    StatusCode::BAD_REQUEST,
                    ApiError::new("BAD_REQUEST", "Invalid JSON body").with_details(details),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<WindowError> for AppError {
    fn from(err: WindowError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidBody(rejection.body_text())
    }
}
