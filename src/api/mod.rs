//! # API Module
//!
//! HTTP handlers for the Playlist Migrator API.
//!
//! ## Endpoints
//!
//! ### Monitoring
//!
//! - [`root`] - `GET /`, basic service information
//! - [`health`] - `GET /health`, health check for load balancers
//!
//! ### Authentication
//!
//! - [`login`] - `GET /auth/spotify/login`, returns the authorization URL and
//!   the state the callback must echo back
//! - [`callback`] - `GET /auth/spotify/callback`, verifies the state and
//!   exchanges the code for a token
//! - [`refresh`] - `POST /auth/spotify/refresh`, rotates an access token
//!
//! ### Spotify reads
//!
//! - [`me`] - `GET /spotify/me`, profile of the bearer token's owner
//! - [`playlists`] - `GET /spotify/playlists?limit=N`, first page of playlists
//!
//! Tokens are returned to the caller and never stored server-side. Failures
//! are rendered through [`crate::error::ApiError`] as the JSON error envelope.

mod auth;
mod health;
mod spotify;

pub use auth::{callback, login, refresh};
pub use health::{health, root};
pub use spotify::{bearer_token, me, playlists};

use crate::error::ApiError;

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}
