use std::sync::Arc;

use axum::{
    Extension,
    extract::{Query, rejection::QueryRejection},
    http::{HeaderMap, header},
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    error::ApiError,
    spotify::{DEFAULT_PLAYLIST_LIMIT, MAX_PLAYLIST_LIMIT, SpotifyOAuth},
    types::UserProfile,
};

#[derive(Debug, Deserialize)]
pub struct PlaylistParams {
    pub limit: Option<u32>,
}

/// Pulls the access token out of an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim_start().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))
}

pub async fn me(
    headers: HeaderMap,
    Extension(oauth): Extension<Arc<SpotifyOAuth>>,
) -> Result<Json<UserProfile>, ApiError> {
    let token = bearer_token(&headers)?;
    oauth
        .fetch_profile(token)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::BadGateway("Failed to fetch Spotify profile".to_string()))
}

pub async fn playlists(
    headers: HeaderMap,
    params: Result<Query<PlaylistParams>, QueryRejection>,
    Extension(oauth): Extension<Arc<SpotifyOAuth>>,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers)?;
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PLAYLIST_LIMIT)
        .clamp(1, MAX_PLAYLIST_LIMIT);

    let items = oauth
        .list_playlists(token, limit)
        .await
        .ok_or_else(|| ApiError::BadGateway("Failed to fetch Spotify playlists".to_string()))?;

    Ok(Json(json!({
        "total": items.len(),
        "limit": limit,
        "items": items,
    })))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer AT1"));
        assert_eq!(bearer_token(&headers).unwrap(), "AT1");
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        for value in ["bearer AT1", "BEARER AT1", "BeArEr  AT1"] {
            let mut headers = HeaderMap::new();
            headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
            assert_eq!(bearer_token(&headers).unwrap(), "AT1");
        }
    }

    #[test]
    fn missing_or_foreign_scheme_is_rejected() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(bearer_token(&headers).is_err());
    }
}
