use chrono::{DateTime, Duration, Utc};

use crate::{
    spotify::SpotifyOAuth,
    types::{Token, TokenState},
};

/// Refresh this many seconds before the token actually expires.
pub const REFRESH_LEAD_SECS: i64 = 240;

/// Keeps one caller's token usable, refreshing it when it nears expiry.
///
/// Nothing is persisted: the manager lives as long as the caller keeps it.
pub struct TokenManager {
    token: Token,
    terminal: bool,
}

impl TokenManager {
    pub fn new(token: Token) -> Self {
        TokenManager {
            token,
            terminal: false,
        }
    }

    pub fn current_token(&self) -> &Token {
        &self.token
    }

    pub fn into_token(self) -> Token {
        self.token
    }

    pub fn state(&self) -> TokenState {
        self.state_at(Utc::now())
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.terminal {
            return TokenState::Terminal;
        }
        self.token.state_at(now)
    }

    pub fn is_expired(&self) -> bool {
        self.needs_refresh_at(Utc::now())
    }

    fn needs_refresh_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_LEAD_SECS) >= self.token.expires_at
    }

    /// Returns an access token that is valid for at least the refresh lead,
    /// refreshing first if needed. `None` once the grant is terminal.
    pub async fn get_valid_token(&mut self, oauth: &SpotifyOAuth) -> Option<String> {
        let now = Utc::now();
        if self.terminal {
            return None;
        }
        if !self.needs_refresh_at(now) {
            return Some(self.token.access_token.clone());
        }

        let Some(refresh_token) = self.token.refresh_token.clone().filter(|rt| !rt.is_empty())
        else {
            if self.token.is_expired_at(now) {
                self.terminal = true;
                return None;
            }
            return Some(self.token.access_token.clone());
        };

        match oauth.refresh(&refresh_token).await {
            Some(new_token) => {
                self.token = new_token;
                Some(self.token.access_token.clone())
            }
            None => {
                tracing::warn!("Token refresh failed; grant is no longer usable");
                self.terminal = true;
                None
            }
        }
    }
}
