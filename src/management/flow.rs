//! Caller-side view of one authentication attempt.
//!
//! ```text
//! Initiated ──callback(state ok)──▶ CallbackReceived ──exchange──▶ TokenExchanged
//!     │                                                      ▲            │
//!     └─ state mismatch ─▶ Terminal           refresh ok ────┘         activate
//!                                                                         ▼
//!             Terminal ◀── no refresh token / refresh failed ── Expired ◀─ Active
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    error::SpotifyError,
    spotify::{SpotifyOAuth, verify_state},
    types::Token,
};

#[derive(Debug, Clone, PartialEq)]
pub enum AuthPhase {
    Initiated { state: String },
    CallbackReceived { code: String },
    TokenExchanged(Token),
    Active(Token),
    Expired(Token),
    Terminal,
}

impl AuthPhase {
    pub fn name(&self) -> &'static str {
        match self {
            AuthPhase::Initiated { .. } => "initiated",
            AuthPhase::CallbackReceived { .. } => "callback_received",
            AuthPhase::TokenExchanged(_) => "token_exchanged",
            AuthPhase::Active(_) => "active",
            AuthPhase::Expired(_) => "expired",
            AuthPhase::Terminal => "terminal",
        }
    }
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },

    #[error(transparent)]
    Spotify(#[from] SpotifyError),

    #[error("token exchange failed")]
    ExchangeFailed,

    #[error("token refresh failed")]
    RefreshFailed,
}

#[derive(Debug)]
pub struct AuthFlow {
    phase: AuthPhase,
}

impl AuthFlow {
    /// Starts tracking an attempt for which `state` was issued.
    pub fn initiated(state: impl Into<String>) -> Self {
        AuthFlow {
            phase: AuthPhase::Initiated {
                state: state.into(),
            },
        }
    }

    pub fn phase(&self) -> &AuthPhase {
        &self.phase
    }

    pub fn token(&self) -> Option<&Token> {
        match &self.phase {
            AuthPhase::TokenExchanged(t) | AuthPhase::Active(t) | AuthPhase::Expired(t) => Some(t),
            _ => None,
        }
    }

    fn invalid(&self, action: &'static str) -> FlowError {
        FlowError::InvalidTransition {
            action,
            phase: self.phase.name(),
        }
    }

    /// Accepts the provider callback. A state mismatch ends the attempt.
    pub fn receive_callback(&mut self, code: &str, returned_state: &str) -> Result<(), FlowError> {
        let AuthPhase::Initiated { state } = &self.phase else {
            return Err(self.invalid("receive callback"));
        };

        if let Err(e) = verify_state(state, returned_state) {
            self.phase = AuthPhase::Terminal;
            return Err(e.into());
        }

        self.phase = AuthPhase::CallbackReceived {
            code: code.to_string(),
        };
        Ok(())
    }

    pub async fn exchange(&mut self, oauth: &SpotifyOAuth) -> Result<&Token, FlowError> {
        let AuthPhase::CallbackReceived { code } = &self.phase else {
            return Err(self.invalid("exchange code"));
        };

        match oauth.exchange_code(code).await {
            Some(token) => {
                self.phase = AuthPhase::TokenExchanged(token);
                self.token().ok_or(FlowError::ExchangeFailed)
            }
            None => {
                self.phase = AuthPhase::Terminal;
                Err(FlowError::ExchangeFailed)
            }
        }
    }

    pub fn activate(&mut self) -> Result<(), FlowError> {
        match std::mem::replace(&mut self.phase, AuthPhase::Terminal) {
            AuthPhase::TokenExchanged(token) => {
                self.phase = AuthPhase::Active(token);
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.invalid("activate"))
            }
        }
    }

    /// Moves an active token to `Expired` (or `Terminal` when it cannot be
    /// renewed) once its lifetime has elapsed at `now`.
    pub fn observe(&mut self, now: DateTime<Utc>) {
        let AuthPhase::Active(token) = &self.phase else {
            return;
        };
        if !token.is_expired_at(now) {
            return;
        }
        self.phase = if token.can_refresh() {
            AuthPhase::Expired(token.clone())
        } else {
            AuthPhase::Terminal
        };
    }

    pub async fn refresh(&mut self, oauth: &SpotifyOAuth) -> Result<&Token, FlowError> {
        let AuthPhase::Expired(token) = &self.phase else {
            return Err(self.invalid("refresh"));
        };
        let Some(refresh_token) = token.refresh_token.clone() else {
            self.phase = AuthPhase::Terminal;
            return Err(FlowError::RefreshFailed);
        };

        match oauth.refresh(&refresh_token).await {
            Some(new_token) => {
                self.phase = AuthPhase::TokenExchanged(new_token);
                self.token().ok_or(FlowError::RefreshFailed)
            }
            None => {
                self.phase = AuthPhase::Terminal;
                Err(FlowError::RefreshFailed)
            }
        }
    }
}
