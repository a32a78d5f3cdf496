//! # Spotify Integration Module
//!
//! The OAuth handshake client for the Spotify accounts service and the two
//! authenticated reads the API exposes.
//!
//! ## Architecture
//!
//! ```text
//! HTTP handlers (api)
//!          ↓
//! SpotifyOAuth
//!     ├── auth  - authorization URL, pending states, code exchange, refresh
//!     └── user  - profile and playlist reads
//!          ↓
//! send(): timeout + bounded retry (reqwest)
//!          ↓
//! accounts.spotify.com / api.spotify.com
//! ```
//!
//! ## Failure policy
//!
//! Internally every step returns `Result<_, SpotifyError>`. The public
//! operations log the error and return `None`; deciding how to present a
//! failure (status code, retry) is left to the caller.
//!
//! ## Sharing
//!
//! One `SpotifyOAuth` is built at startup and shared behind an `Arc`. The
//! credentials and HTTP client are immutable; the only mutable state is the
//! set of pending authorization states, guarded by an async mutex.

use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    config::{HttpSettings, Settings, SpotifyCredentials},
    error::{ConfigError, SpotifyError},
    utils::{self, RetryPolicy},
};

use pending::{MAX_PENDING_STATES, PendingStates};

pub mod auth;
mod pending;
pub mod user;

pub use auth::{STATE_TTL_SECS, verify_state};
pub use user::{DEFAULT_PLAYLIST_LIMIT, MAX_PLAYLIST_LIMIT};

pub const SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const SPOTIFY_API_URL: &str = "https://api.spotify.com";

const ERROR_BODY_SNIPPET_CHARS: usize = 240;

/// Upstream endpoints. Production code always uses [`Endpoints::spotify`];
/// [`Endpoints::custom`] exists so tests can point the client at a stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorize: Url,
    pub token: Url,
    pub profile: Url,
    pub playlists: Url,
}

impl Endpoints {
    pub fn spotify() -> Self {
        Self::custom(SPOTIFY_ACCOUNTS_URL, SPOTIFY_API_URL).expect("static Spotify URLs are valid")
    }

    pub fn custom(accounts_base: &str, api_base: &str) -> Result<Self, ConfigError> {
        let accounts = accounts_base.trim_end_matches('/');
        let api = api_base.trim_end_matches('/');
        Ok(Endpoints {
            authorize: parse_url(format!("{accounts}/authorize"))?,
            token: parse_url(format!("{accounts}/api/token"))?,
            profile: parse_url(format!("{api}/v1/me"))?,
            playlists: parse_url(format!("{api}/v1/me/playlists"))?,
        })
    }
}

fn parse_url(raw: String) -> Result<Url, ConfigError> {
    Url::parse(&raw).map_err(|e| ConfigError::Invalid {
        key: "endpoint".to_string(),
        value: format!("{raw} ({e})"),
    })
}

/// Spotify OAuth client holding the application's credentials.
pub struct SpotifyOAuth {
    credentials: SpotifyCredentials,
    endpoints: Endpoints,
    http: Client,
    retry: RetryPolicy,
    pending: Mutex<PendingStates>,
}

impl SpotifyOAuth {
    pub fn new(credentials: SpotifyCredentials, http: HttpSettings) -> Self {
        if !credentials.is_configured() {
            tracing::warn!("Spotify OAuth credentials not configured");
        }

        let client = Client::builder()
            .timeout(http.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        SpotifyOAuth {
            credentials,
            endpoints: Endpoints::spotify(),
            http: client,
            retry: http.retry,
            pending: Mutex::new(PendingStates::new(MAX_PENDING_STATES)),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.spotify.clone(), settings.http)
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_configured()
    }

    pub fn credentials(&self) -> &SpotifyCredentials {
        &self.credentials
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn require_credentials(&self) -> Result<(&str, &str), SpotifyError> {
        match (
            self.credentials.client_id.as_deref(),
            self.credentials.client_secret.as_deref(),
        ) {
            (Some(id), Some(secret)) if !id.trim().is_empty() && !secret.trim().is_empty() => {
                Ok((id, secret))
            }
            _ => Err(SpotifyError::NotConfigured),
        }
    }

    /// Sends the request produced by `build` and decodes a JSON body.
    ///
    /// Non-2xx statuses become [`SpotifyError::Status`]; transport errors,
    /// 429 and 5xx are retried according to `policy`.
    async fn send<F>(&self, policy: RetryPolicy, build: F) -> Result<Value, SpotifyError>
    where
        F: Fn() -> RequestBuilder,
    {
        utils::retry_with_backoff(policy, SpotifyError::is_retryable, || {
            let request = build();
            async move {
                let response = request.send().await?;
                let status = response.status();
                let body = response.text().await?;

                if !status.is_success() {
                    return Err(SpotifyError::Status {
                        status: status.as_u16(),
                        body: body.chars().take(ERROR_BODY_SNIPPET_CHARS).collect(),
                    });
                }

                let value = serde_json::from_str::<Value>(&body)
                    .map_err(|e| SpotifyError::Malformed(e.to_string()))?;
                Ok::<Value, SpotifyError>(value)
            }
        })
        .await
    }
}
