mod common;

use std::sync::Arc;

use axum::{Router, middleware::from_fn, routing::get};
use playlist_migrator::{
    config::SpotifyCredentials, middleware::catch_panics, server, spotify::SpotifyOAuth,
};
use reqwest::{Client, StatusCode, Url, header};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use common::*;

const ALLOWED_ORIGIN: &str = "http://localhost:3000";

struct TestApp {
    base_url: String,
    client: Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn spawn_app(oauth: SpotifyOAuth) -> TestApp {
    let app = server::router(Arc::new(oauth), vec![ALLOWED_ORIGIN.to_string()]);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{addr}"),
        client: Client::new(),
    }
}

fn assert_error_envelope(body: &Value, status: StatusCode) {
    assert_eq!(body["status_code"], status.as_u16());
    assert!(body["error"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_root_and_health() {
    let stub = spawn_stub(StubConfig::default()).await;
    let app = spawn_app(oauth_for(&stub)).await;

    let response = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Playlist Migrator API is running");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Service is healthy");

    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
    assert!(headers.contains_key("strict-transport-security"));
    assert!(headers.contains_key("x-process-time"));
}

#[tokio::test]
async fn test_unknown_route_uses_error_envelope() {
    let stub = spawn_stub(StubConfig::default()).await;
    let app = spawn_app(oauth_for(&stub)).await;

    let response = app.client.get(app.url("/nope")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_error_envelope(&body, StatusCode::NOT_FOUND);
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_login_then_callback() {
    let stub = spawn_stub(StubConfig::default()).await;
    let app = spawn_app(oauth_for(&stub)).await;

    let login: Value = app
        .client
        .get(app.url("/auth/spotify/login"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let state = login["state"].as_str().unwrap().to_string();
    let authorization_url = Url::parse(login["authorization_url"].as_str().unwrap()).unwrap();
    assert!(
        authorization_url
            .query_pairs()
            .any(|(k, v)| k == "state" && v == state)
    );

    let response = app
        .client
        .get(app.url("/auth/spotify/callback"))
        .query(&[("code", "validcode"), ("state", state.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token: Value = response.json().await.unwrap();
    assert_eq!(token["access_token"], "AT1");
    assert_eq!(token["refresh_token"], "RT1");
    assert_eq!(token["expires_in"], 3600);
    assert!(token["expires_at"].is_string());

    // the same state cannot be used twice
    let response = app
        .client
        .get(app.url("/auth/spotify/callback"))
        .query(&[("code", "validcode"), ("state", state.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(stub.token_hits(), 1);
}

#[tokio::test]
async fn test_callback_rejects_bad_input() {
    let stub = spawn_stub(StubConfig::default()).await;
    let app = spawn_app(oauth_for(&stub)).await;

    let response = app
        .client
        .get(app.url("/auth/spotify/callback?code=abc"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_error_envelope(&body, StatusCode::BAD_REQUEST);

    let response = app
        .client
        .get(app.url("/auth/spotify/callback?error=access_denied&state=s1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .get(app.url("/auth/spotify/callback?code=abc&state=never-issued"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Spotify authentication failed");

    assert_eq!(stub.token_hits(), 0);
}

#[tokio::test]
async fn test_denied_callback_consumes_state() {
    let stub = spawn_stub(StubConfig::default()).await;
    let app = spawn_app(oauth_for(&stub)).await;

    let login: Value = app
        .client
        .get(app.url("/auth/spotify/login"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let state = login["state"].as_str().unwrap().to_string();

    let response = app
        .client
        .get(app.url("/auth/spotify/callback"))
        .query(&[("error", "access_denied"), ("state", state.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // the denied attempt's state is gone
    let response = app
        .client
        .get(app.url("/auth/spotify/callback"))
        .query(&[("code", "validcode"), ("state", state.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(stub.token_hits(), 0);
}

#[tokio::test]
async fn test_refresh_endpoint() {
    let stub = spawn_stub(StubConfig {
        token_body: json!({"access_token": "AT2", "expires_in": 3600}),
        ..StubConfig::default()
    })
    .await;
    let app = spawn_app(oauth_for(&stub)).await;

    let response = app
        .client
        .post(app.url("/auth/spotify/refresh"))
        .json(&json!({"refresh_token": "RT1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token: Value = response.json().await.unwrap();
    assert_eq!(token["access_token"], "AT2");
    assert_eq!(token["refresh_token"], "RT1");

    let response = app
        .client
        .post(app.url("/auth/spotify/refresh"))
        .header(header::CONTENT_TYPE, "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .post(app.url("/auth/spotify/refresh"))
        .json(&json!({"refresh_token": " "}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(stub.token_hits(), 1);
}

#[tokio::test]
async fn test_refresh_failure_is_unauthorized() {
    let stub = spawn_stub(StubConfig {
        token_status: StatusCode::BAD_REQUEST,
        token_body: json!({"error": "invalid_grant"}),
        ..StubConfig::default()
    })
    .await;
    let app = spawn_app(oauth_for(&stub)).await;

    let response = app
        .client
        .post(app.url("/auth/spotify/refresh"))
        .json(&json!({"refresh_token": "revoked"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_requires_bearer_token() {
    let stub = spawn_stub(StubConfig::default()).await;
    let app = spawn_app(oauth_for(&stub)).await;

    let response = app.client.get(app.url("/spotify/me")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // scheme matching ignores case
    let response = app
        .client
        .get(app.url("/spotify/me"))
        .header(header::AUTHORIZATION, format!("BEARER {VALID_ACCESS_TOKEN}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .get(app.url("/spotify/me"))
        .bearer_auth(VALID_ACCESS_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let profile: Value = response.json().await.unwrap();
    assert_eq!(profile["id"], "user-1");
    assert_eq!(profile["followers"]["total"], 7);

    let response = app
        .client
        .get(app.url("/spotify/me"))
        .bearer_auth("expired-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_playlists() {
    let stub = spawn_stub(StubConfig::default()).await;
    let app = spawn_app(oauth_for(&stub)).await;

    let response = app
        .client
        .get(app.url("/spotify/playlists?limit=10"))
        .bearer_auth(VALID_ACCESS_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total"], 2);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["items"][1]["name"], "Focus");

    let response = app
        .client
        .get(app.url("/spotify/playlists?limit=lots"))
        .bearer_auth(VALID_ACCESS_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(stub.playlist_limits(), vec!["10"]);
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let stub = spawn_stub(StubConfig::default()).await;
    let app = spawn_app(oauth_for(&stub)).await;

    let response = app
        .client
        .get(app.url("/health"))
        .header(header::ORIGIN, ALLOWED_ORIGIN)
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ALLOWED_ORIGIN
    );

    let response = app
        .client
        .get(app.url("/health"))
        .header(header::ORIGIN, "http://evil.example")
        .send()
        .await
        .unwrap();
    assert!(
        !response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );

    let response = app
        .client
        .request(reqwest::Method::OPTIONS, app.url("/auth/spotify/refresh"))
        .header(header::ORIGIN, ALLOWED_ORIGIN)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "content-type");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}

#[tokio::test]
async fn test_login_without_credentials_is_unavailable() {
    let stub = spawn_stub(StubConfig::default()).await;
    let oauth = SpotifyOAuth::new(
        SpotifyCredentials {
            client_id: None,
            client_secret: None,
            ..credentials()
        },
        fast_http(),
    )
    .with_endpoints(stub.endpoints());
    let app = spawn_app(oauth).await;

    let response = app
        .client
        .get(app.url("/auth/spotify/login"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_error_envelope(&body, StatusCode::SERVICE_UNAVAILABLE);
}

async fn exploding_handler() -> &'static str {
    panic!("upstream lifetime overflowed")
}

#[tokio::test]
async fn test_handler_panic_becomes_internal_error() {
    let app = Router::new()
        .route("/boom", get(exploding_handler))
        .route("/fine", get(|| async { "ok" }))
        .layer(from_fn(catch_panics));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let client = Client::new();

    let response = client
        .get(format!("http://{addr}/boom"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_error_envelope(&body, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert!(!body.to_string().contains("overflowed"));

    // the server keeps serving after a panic
    let response = client
        .get(format!("http://{addr}/fine"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
