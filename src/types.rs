use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{error::ApiError, utils};

/// A single OAuth grant as handed back to the caller.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Builds a token issued at `issued_at`, computing its absolute expiry.
    pub fn issued_at(
        access_token: String,
        token_type: Option<String>,
        expires_in: u64,
        refresh_token: Option<String>,
        scope: Option<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let expires_at = expiry_for(issued_at, expires_in).unwrap_or(DateTime::<Utc>::MAX_UTC);

        Token {
            access_token,
            token_type: token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in,
            refresh_token,
            scope,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|rt| !rt.trim().is_empty())
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        match (self.is_expired_at(now), self.can_refresh()) {
            (false, _) => TokenState::Active,
            (true, true) => TokenState::Expired,
            (true, false) => TokenState::Terminal,
        }
    }
}

/// `issued_at + expires_in`, or `None` when the sum leaves chrono's range.
pub fn expiry_for(issued_at: DateTime<Utc>, expires_in: u64) -> Option<DateTime<Utc>> {
    let lifetime = Duration::try_seconds(i64::try_from(expires_in).ok()?)?;
    issued_at.checked_add_signed(lifetime)
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &utils::mask_value(&self.access_token))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field(
                "refresh_token",
                &self.refresh_token.as_deref().map(utils::mask_value),
            )
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Where a token stands relative to its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Active,
    /// Lifetime elapsed, but a refresh token can renew it.
    Expired,
    /// Lifetime elapsed and nothing can renew it.
    Terminal,
}

/// One outstanding authorization attempt.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRequest {
    #[serde(rename = "authorization_url")]
    pub url: String,
    pub state: String,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub followers: Option<Followers>,
    #[serde(default)]
    pub images: Vec<Image>,
    pub product: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Followers {
    pub href: Option<String>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistsPage {
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

impl HealthResponse {
    pub fn healthy(message: impl Into<String>) -> Self {
        HealthResponse {
            message: message.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            status: "healthy".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, status_code: u16, details: Option<Value>) -> Self {
        ErrorResponse {
            error: error.into(),
            status_code,
            timestamp: Utc::now(),
            details,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistCreate {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackCreate {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    /// Duration in seconds.
    pub duration: Option<u32>,
    pub external_id: Option<String>,
}

const NAME_MAX: usize = 200;
const DESCRIPTION_MAX: usize = 500;

fn check_length(
    errors: &mut Map<String, Value>,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.chars().count();
    if len < min {
        errors.insert(
            field.to_string(),
            Value::String(format!("must be at least {min} characters")),
        );
    } else if len > max {
        errors.insert(
            field.to_string(),
            Value::String(format!("must be at most {max} characters")),
        );
    }
}

fn into_result(errors: Map<String, Value>) -> Result<(), ApiError> {
    if errors.is_empty() {
        return Ok(());
    }
    Err(ApiError::Validation {
        message: "Validation failed".to_string(),
        details: Value::Object(errors),
    })
}

impl PlaylistCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Map::new();
        check_length(&mut errors, "name", &self.name, 1, NAME_MAX);
        if let Some(description) = &self.description {
            check_length(&mut errors, "description", description, 0, DESCRIPTION_MAX);
        }
        into_result(errors)
    }
}

impl PlaylistUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Map::new();
        if let Some(name) = &self.name {
            check_length(&mut errors, "name", name, 1, NAME_MAX);
        }
        if let Some(description) = &self.description {
            check_length(&mut errors, "description", description, 0, DESCRIPTION_MAX);
        }
        into_result(errors)
    }
}

impl TrackCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Map::new();
        check_length(&mut errors, "title", &self.title, 1, NAME_MAX);
        check_length(&mut errors, "artist", &self.artist, 1, NAME_MAX);
        if let Some(album) = &self.album {
            check_length(&mut errors, "album", album, 0, NAME_MAX);
        }
        into_result(errors)
    }
}
