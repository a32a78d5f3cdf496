//! Error types shared across the crate.
//!
//! Three layers exist:
//!
//! - [`ConfigError`] for settings that cannot be loaded or validated at startup
//! - [`SpotifyError`] for everything that can go wrong inside the OAuth client;
//!   it never leaves the client's public API, which logs it and returns `None`
//! - [`ApiError`] for the HTTP surface, rendered as the JSON error envelope

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use thiserror::Error;

use crate::types::ErrorResponse;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required settings: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },

    #[error("SECRET_KEY must be changed in production environment")]
    InsecureSecretKey,

    #[error("Failed to load env file {path}: {reason}")]
    EnvFile { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("Spotify OAuth credentials not configured")]
    NotConfigured,

    #[error("request to Spotify failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Spotify returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed Spotify response: {0}")]
    Malformed(String),

    #[error("state does not match any pending authorization")]
    UnknownState,

    #[error("authorization state expired")]
    StateExpired,

    #[error("state mismatch between authorization request and callback")]
    StateMismatch,
}

impl SpotifyError {
    /// Whether another attempt at the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SpotifyError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            SpotifyError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Validation { message: String, details: Value },

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let details = match &self {
            ApiError::Validation { details, .. } => Some(details.clone()),
            ApiError::Internal(reason) => {
                tracing::error!("Unhandled error: {}", reason);
                None
            }
            _ => None,
        };

        let body = ErrorResponse::new(self.to_string(), status.as_u16(), details);
        (status, Json(body)).into_response()
    }
}
