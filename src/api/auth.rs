use std::sync::Arc;

use axum::{
    Extension,
    extract::{Query, rejection::JsonRejection},
    response::Json,
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    spotify::SpotifyOAuth,
    types::{AuthorizationRequest, Token},
};

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn login(
    Extension(oauth): Extension<Arc<SpotifyOAuth>>,
) -> Result<Json<AuthorizationRequest>, ApiError> {
    if !oauth.is_configured() {
        return Err(ApiError::Unavailable(
            "Spotify OAuth is not configured".to_string(),
        ));
    }
    Ok(Json(oauth.begin_authorization().await))
}

pub async fn callback(
    Query(params): Query<CallbackParams>,
    Extension(oauth): Extension<Arc<SpotifyOAuth>>,
) -> Result<Json<Token>, ApiError> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "Spotify denied authorization");
        if let Some(state) = params.state.as_deref() {
            oauth.cancel_authorization(state).await;
        }
        return Err(ApiError::BadRequest(format!(
            "Authorization denied: {error}"
        )));
    }

    let (Some(code), Some(state)) = (params.code, params.state) else {
        return Err(ApiError::BadRequest(
            "Missing code or state parameter".to_string(),
        ));
    };

    oauth
        .complete_authorization(&code, &state)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::Unauthorized("Spotify authentication failed".to_string()))
}

pub async fn refresh(
    Extension(oauth): Extension<Arc<SpotifyOAuth>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<Token>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if request.refresh_token.trim().is_empty() {
        return Err(ApiError::BadRequest("refresh_token is required".to_string()));
    }

    oauth
        .refresh(&request.refresh_token)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::Unauthorized("Token refresh failed".to_string()))
}
