use std::sync::Arc;

use axum::{
    Extension, Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;

use crate::{
    Res, api,
    config::Settings,
    middleware::{self, CorsPolicy},
    spotify::SpotifyOAuth,
};

/// Assembles every route and middleware layer around a shared OAuth client.
pub fn router(oauth: Arc<SpotifyOAuth>, allowed_origins: Vec<String>) -> Router {
    Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health))
        .route("/auth/spotify/login", get(api::login))
        .route("/auth/spotify/callback", get(api::callback))
        .route("/auth/spotify/refresh", post(api::refresh))
        .route("/spotify/me", get(api::me))
        .route("/spotify/playlists", get(api::playlists))
        .fallback(api::not_found)
        .layer(Extension(oauth))
        .layer(axum_middleware::from_fn(middleware::catch_panics))
        .layer(axum_middleware::from_fn(middleware::security_headers))
        .layer(axum_middleware::from_fn_with_state(
            CorsPolicy::new(allowed_origins),
            middleware::cors,
        ))
        .layer(axum_middleware::from_fn(middleware::log_requests))
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn start_api_server(settings: &Settings, oauth: Arc<SpotifyOAuth>) -> Res<()> {
    let listener = TcpListener::bind(settings.bind_addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");

    let app = router(oauth, settings.allowed_origins.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down Playlist Migrator API");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
