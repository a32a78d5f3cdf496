#![allow(dead_code)]

use std::{
    collections::HashMap,
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use playlist_migrator::{
    config::{HttpSettings, SpotifyCredentials},
    spotify::{Endpoints, SpotifyOAuth},
    utils::RetryPolicy,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

pub const CLIENT_ID: &str = "test-client-id";
pub const CLIENT_SECRET: &str = "test-client-secret";
pub const REDIRECT_URI: &str = "http://127.0.0.1:8000/auth/spotify/callback";
pub const VALID_ACCESS_TOKEN: &str = "AT1";

/// Behaviour of the stubbed Spotify accounts and API service.
#[derive(Clone)]
pub struct StubConfig {
    pub token_status: StatusCode,
    pub token_body: Value,
    /// Answer this many token requests with 503 before behaving normally.
    pub fail_first: usize,
}

impl Default for StubConfig {
    fn default() -> Self {
        StubConfig {
            token_status: StatusCode::OK,
            token_body: json!({
                "access_token": "AT1",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "RT1",
                "scope": "user-read-email playlist-read-private"
            }),
            fail_first: 0,
        }
    }
}

#[derive(Clone)]
struct StubState {
    config: StubConfig,
    token_forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
    token_hits: Arc<AtomicUsize>,
    playlist_limits: Arc<Mutex<Vec<String>>>,
}

pub struct StubSpotify {
    pub base_url: String,
    token_forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
    token_hits: Arc<AtomicUsize>,
    playlist_limits: Arc<Mutex<Vec<String>>>,
}

impl StubSpotify {
    pub fn token_hits(&self) -> usize {
        self.token_hits.load(Ordering::SeqCst)
    }

    pub fn token_forms(&self) -> Vec<HashMap<String, String>> {
        self.token_forms.lock().unwrap().clone()
    }

    pub fn playlist_limits(&self) -> Vec<String> {
        self.playlist_limits.lock().unwrap().clone()
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::custom(&self.base_url, &self.base_url).unwrap()
    }
}

async fn token(State(state): State<StubState>, Form(form): Form<HashMap<String, String>>) -> Response {
    let hit = state.token_hits.fetch_add(1, Ordering::SeqCst);
    state.token_forms.lock().unwrap().push(form);

    if hit < state.config.fail_first {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "temporarily_unavailable"})),
        )
            .into_response();
    }
    (state.config.token_status, Json(state.config.token_body.clone())).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {VALID_ACCESS_TOKEN}");
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str())
}

async fn profile(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"status": 401, "message": "Invalid access token"}})),
        )
            .into_response();
    }
    Json(json!({
        "id": "user-1",
        "display_name": "Test User",
        "email": "test@example.com",
        "country": "DE",
        "followers": {"href": null, "total": 7},
        "images": [{"url": "https://i.scdn.co/image/abc", "height": 64, "width": 64}],
        "product": "premium"
    }))
    .into_response()
}

async fn playlists(
    State(state): State<StubState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state
        .playlist_limits
        .lock()
        .unwrap()
        .push(params.get("limit").cloned().unwrap_or_default());

    Json(json!({
        "items": [
            {"id": "pl-1", "name": "Road trip"},
            {"id": "pl-2", "name": "Focus"}
        ],
        "limit": params.get("limit"),
        "total": 2
    }))
    .into_response()
}

pub async fn spawn_stub(config: StubConfig) -> StubSpotify {
    let state = StubState {
        config,
        token_forms: Arc::new(Mutex::new(Vec::new())),
        token_hits: Arc::new(AtomicUsize::new(0)),
        playlist_limits: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/api/token", post(token))
        .route("/v1/me", get(profile))
        .route("/v1/me/playlists", get(playlists))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubSpotify {
        base_url: format!("http://{addr}"),
        token_forms: state.token_forms,
        token_hits: state.token_hits,
        playlist_limits: state.playlist_limits,
    }
}

pub fn credentials() -> SpotifyCredentials {
    SpotifyCredentials {
        client_id: Some(CLIENT_ID.to_string()),
        client_secret: Some(CLIENT_SECRET.to_string()),
        redirect_uri: REDIRECT_URI.to_string(),
        scopes: vec![
            "user-read-email".to_string(),
            "playlist-read-private".to_string(),
        ],
    }
}

pub fn fast_http() -> HttpSettings {
    HttpSettings {
        timeout: Duration::from_secs(5),
        retry: RetryPolicy::new(2, Duration::from_millis(1)),
    }
}

pub fn oauth_for(stub: &StubSpotify) -> SpotifyOAuth {
    SpotifyOAuth::new(credentials(), fast_http()).with_endpoints(stub.endpoints())
}

/// Collects formatted `tracing` output of the current thread.
///
/// Only sees events from tasks polled on the test thread, which holds for the
/// default single-threaded `#[tokio::test]` runtime.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

pub struct LogWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            buffer: self.buffer.clone(),
        }
    }
}

impl LogCapture {
    /// Installs the capture as this thread's subscriber until the guard drops.
    pub fn install() -> (LogCapture, DefaultGuard) {
        let capture = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }

    /// Lines logged at ERROR level.
    pub fn errors(&self) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.contains("ERROR"))
            .map(str::to_string)
            .collect()
    }
}
