use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::{
    error::SpotifyError,
    types::{AuthorizationRequest, Token, expiry_for},
    utils::{self, RetryPolicy},
};

use super::SpotifyOAuth;

/// Pending states older than this are rejected at callback time.
pub const STATE_TTL_SECS: i64 = 600;

/// Compares the state issued with an authorization request against the one
/// returned on the callback without short-circuiting on the first mismatch.
pub fn verify_state(expected: &str, returned: &str) -> Result<(), SpotifyError> {
    let (a, b) = (expected.as_bytes(), returned.as_bytes());
    let diff = a
        .iter()
        .zip(b.iter())
        .fold(a.len() ^ b.len(), |acc, (x, y)| acc | usize::from(x ^ y));

    if diff == 0 && !expected.is_empty() {
        Ok(())
    } else {
        Err(SpotifyError::StateMismatch)
    }
}

impl SpotifyOAuth {
    /// Builds the authorization URL, generating a state when none is given.
    ///
    /// A non-empty caller-supplied state is returned exactly as passed in.
    pub fn authorization_url(&self, state: Option<&str>) -> (String, String) {
        let state = match state {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => utils::generate_state(),
        };

        let mut url = self.endpoints.authorize.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair(
                "client_id",
                self.credentials.client_id.as_deref().unwrap_or_default(),
            )
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.credentials.redirect_uri)
            .append_pair("scope", &self.credentials.scope_string())
            .append_pair("state", &state)
            .append_pair("show_dialog", "true");

        (url.to_string(), state)
    }

    /// Starts an authorization attempt and remembers its state for the callback.
    pub async fn begin_authorization(&self) -> AuthorizationRequest {
        let (url, state) = self.authorization_url(None);
        let created_at = Utc::now();

        self.pending
            .lock()
            .await
            .insert(state.clone(), created_at);

        tracing::debug!(state = %utils::mask_value(&state), "Authorization started");
        AuthorizationRequest {
            url,
            state,
            created_at,
        }
    }

    /// Finishes an attempt started by [`begin_authorization`](Self::begin_authorization).
    ///
    /// The state is consumed whether or not the exchange succeeds. An unknown,
    /// reused or expired state fails without contacting Spotify.
    pub async fn complete_authorization(&self, code: &str, state: &str) -> Option<Token> {
        if let Err(e) = self.consume_state(state, Utc::now()).await {
            tracing::error!("Rejected authorization callback: {}", e);
            return None;
        }
        self.exchange_code(code).await
    }

    /// Forgets a pending state without exchanging anything, e.g. after the
    /// user denied access. Returns whether the state was pending.
    pub async fn cancel_authorization(&self, state: &str) -> bool {
        self.pending.lock().await.take(state).is_some()
    }

    pub async fn pending_authorizations(&self) -> usize {
        let mut pending = self.pending.lock().await;
        pending.prune(Utc::now());
        pending.len()
    }

    async fn consume_state(&self, state: &str, now: DateTime<Utc>) -> Result<(), SpotifyError> {
        let created_at = self
            .pending
            .lock()
            .await
            .take(state)
            .ok_or(SpotifyError::UnknownState)?;

        if now - created_at > Duration::seconds(STATE_TTL_SECS) {
            return Err(SpotifyError::StateExpired);
        }
        Ok(())
    }

    /// Exchanges an authorization code for a token.
    ///
    /// Codes are single-use upstream, so this request is never retried.
    pub async fn exchange_code(&self, code: &str) -> Option<Token> {
        match self.try_exchange_code(code.trim()).await {
            Ok(token) => {
                tracing::info!(scope = ?token.scope, expires_at = %token.expires_at, "Exchanged authorization code");
                Some(token)
            }
            Err(e) => {
                tracing::error!("Failed to exchange code for token: {}", e);
                None
            }
        }
    }

    async fn try_exchange_code(&self, code: &str) -> Result<Token, SpotifyError> {
        let (client_id, client_secret) = self.require_credentials()?;
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];

        let json = self
            .send(RetryPolicy::none(), || {
                self.http.post(self.endpoints.token.clone()).form(&form)
            })
            .await?;

        parse_token_response(&json, Utc::now(), None)
    }

    /// Trades a refresh token for a new access token.
    ///
    /// If Spotify does not rotate the refresh token, the one passed in is
    /// carried over to the returned token.
    pub async fn refresh(&self, refresh_token: &str) -> Option<Token> {
        match self.try_refresh(refresh_token.trim()).await {
            Ok(token) => {
                tracing::info!(expires_at = %token.expires_at, "Refreshed access token");
                Some(token)
            }
            Err(e) => {
                tracing::error!("Failed to refresh access token: {}", e);
                None
            }
        }
    }

    async fn try_refresh(&self, refresh_token: &str) -> Result<Token, SpotifyError> {
        let (client_id, client_secret) = self.require_credentials()?;
        if refresh_token.is_empty() {
            return Err(SpotifyError::Malformed("empty refresh token".to_string()));
        }

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];

        let json = self
            .send(self.retry, || {
                self.http.post(self.endpoints.token.clone()).form(&form)
            })
            .await?;

        parse_token_response(&json, Utc::now(), Some(refresh_token))
    }
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_u64_lossy(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Turns a token endpoint response into a [`Token`] issued at `issued_at`.
///
/// `fallback_refresh` is used when the response carries no refresh token.
pub(crate) fn parse_token_response(
    json: &Value,
    issued_at: DateTime<Utc>,
    fallback_refresh: Option<&str>,
) -> Result<Token, SpotifyError> {
    let access_token = non_empty_str(json, "access_token")
        .ok_or_else(|| SpotifyError::Malformed("missing access_token".to_string()))?;
    let expires_in = json
        .get("expires_in")
        .and_then(parse_u64_lossy)
        .ok_or_else(|| SpotifyError::Malformed("missing expires_in".to_string()))?;
    if expiry_for(issued_at, expires_in).is_none() {
        return Err(SpotifyError::Malformed(format!(
            "expires_in out of range: {expires_in}"
        )));
    }
    let refresh_token =
        non_empty_str(json, "refresh_token").or_else(|| fallback_refresh.map(str::to_string));

    Ok(Token::issued_at(
        access_token,
        non_empty_str(json, "token_type"),
        expires_in,
        refresh_token,
        non_empty_str(json, "scope"),
        issued_at,
    ))
}
