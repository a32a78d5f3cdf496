use serde_json::Value;

use crate::{
    error::SpotifyError,
    types::{PlaylistsPage, UserProfile},
};

use super::SpotifyOAuth;

pub const DEFAULT_PLAYLIST_LIMIT: u32 = 50;
/// Spotify rejects page sizes above this.
pub const MAX_PLAYLIST_LIMIT: u32 = 50;

impl SpotifyOAuth {
    /// Reads the profile of the user owning `access_token`.
    ///
    /// The token is not checked locally; an expired one is rejected by Spotify
    /// and surfaces as `None` like any other failure.
    pub async fn fetch_profile(&self, access_token: &str) -> Option<UserProfile> {
        match self.try_fetch_profile(access_token).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::error!("Failed to get user profile: {}", e);
                None
            }
        }
    }

    async fn try_fetch_profile(&self, access_token: &str) -> Result<UserProfile, SpotifyError> {
        let json = self
            .send(self.retry, || {
                self.http
                    .get(self.endpoints.profile.clone())
                    .bearer_auth(access_token)
            })
            .await?;

        serde_json::from_value(json).map_err(|e| SpotifyError::Malformed(e.to_string()))
    }

    /// Returns one page (the first) of the user's playlists.
    ///
    /// `limit` is clamped to `1..=MAX_PLAYLIST_LIMIT`.
    pub async fn list_playlists(&self, access_token: &str, limit: u32) -> Option<Vec<Value>> {
        let limit = limit.clamp(1, MAX_PLAYLIST_LIMIT);
        match self.try_list_playlists(access_token, limit).await {
            Ok(items) => {
                tracing::debug!(count = items.len(), limit = limit, "Fetched playlists");
                Some(items)
            }
            Err(e) => {
                tracing::error!("Failed to get user playlists: {}", e);
                None
            }
        }
    }

    async fn try_list_playlists(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Result<Vec<Value>, SpotifyError> {
        let json = self
            .send(self.retry, || {
                self.http
                    .get(self.endpoints.playlists.clone())
                    .bearer_auth(access_token)
                    .query(&[("limit", limit)])
            })
            .await?;

        let page: PlaylistsPage =
            serde_json::from_value(json).map_err(|e| SpotifyError::Malformed(e.to_string()))?;
        Ok(page.items)
    }
}
