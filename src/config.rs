//! Configuration management for the Playlist Migrator API.
//!
//! Settings come from two places:
//! 1. Environment variables (highest priority)
//! 2. A `.env` file, by default in the working directory
//!
//! Everything else falls back to the defaults below. [`Settings::from_lookup`]
//! takes any key lookup so tests can build settings without touching the
//! process environment.

use std::{env, fmt, path::Path, str::FromStr, time::Duration};

use crate::{error::ConfigError, utils::RetryPolicy};

pub const DEFAULT_SECRET_KEY: &str = "your-secret-key-change-in-production";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8000/auth/spotify/callback";
pub const DEFAULT_SCOPES: &str = "playlist-read-private playlist-read-collaborative playlist-modify-public playlist-modify-private user-read-private user-read-email";
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:8080",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8080",
];

/// Loads variables from a `.env` file into the process environment.
///
/// Variables that are already set are left untouched. A missing file is not an
/// error when no explicit path was given: the caller gets `Ok(false)` and can
/// warn that defaults are in use.
pub fn load_env(path: Option<&Path>) -> Result<bool, ConfigError> {
    match path {
        Some(path) => dotenv::from_path(path)
            .map(|_| true)
            .map_err(|e| ConfigError::EnvFile {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        None => match dotenv::dotenv() {
            Ok(_) => Ok(true),
            Err(e) if e.not_found() => Ok(false),
            Err(e) => Err(ConfigError::EnvFile {
                path: ".env".to_string(),
                reason: e.to_string(),
            }),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::Invalid {
                key: "ENVIRONMENT".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        f.write_str(name)
    }
}

/// OAuth client credentials. The secret never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl SpotifyCredentials {
    pub fn is_configured(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.client_id) && present(&self.client_secret)
    }

    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

impl fmt::Debug for SpotifyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpotifyCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Outbound HTTP behaviour for calls to Spotify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name: String,
    pub version: String,
    pub environment: Environment,
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub secret_key: String,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
    pub spotify: SpotifyCredentials,
    pub http: HttpSettings,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds and validates settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let environment = match get("ENVIRONMENT") {
            Some(v) => v.parse()?,
            None => Environment::Development,
        };

        let allowed_origins = match get("ALLOWED_ORIGINS") {
            Some(raw) => parse_origins(&raw),
            None => DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
        };

        let retry = RetryPolicy::new(
            parse_or("HTTP_MAX_RETRIES", get("HTTP_MAX_RETRIES"), 2)?,
            Duration::from_millis(parse_or(
                "HTTP_RETRY_BASE_DELAY_MS",
                get("HTTP_RETRY_BASE_DELAY_MS"),
                250,
            )?),
        );

        let mut settings = Settings {
            app_name: or_default("APP_NAME", "Playlist Migrator API"),
            version: or_default("VERSION", env!("CARGO_PKG_VERSION")),
            environment,
            debug: parse_bool("DEBUG", get("DEBUG"), true)?,
            host: or_default("HOST", "0.0.0.0"),
            port: parse_or("PORT", get("PORT"), 8000)?,
            secret_key: lookup("SECRET_KEY").unwrap_or_else(|| DEFAULT_SECRET_KEY.to_string()),
            allowed_origins,
            log_level: or_default("LOG_LEVEL", "INFO"),
            spotify: SpotifyCredentials {
                client_id: get("SPOTIFY_CLIENT_ID"),
                client_secret: get("SPOTIFY_CLIENT_SECRET"),
                redirect_uri: or_default("SPOTIFY_REDIRECT_URI", DEFAULT_REDIRECT_URI),
                scopes: or_default("SPOTIFY_SCOPES", DEFAULT_SCOPES)
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
            },
            http: HttpSettings {
                timeout: Duration::from_secs(parse_or(
                    "HTTP_TIMEOUT_SECS",
                    get("HTTP_TIMEOUT_SECS"),
                    10,
                )?),
                retry,
            },
        };

        settings.apply_environment_profile();
        settings.validate()?;
        Ok(settings)
    }

    fn apply_environment_profile(&mut self) {
        match self.environment {
            Environment::Production => {
                self.debug = false;
                self.log_level = "WARNING".to_string();
            }
            Environment::Testing => {
                self.debug = true;
                self.log_level = "DEBUG".to_string();
            }
            Environment::Development => {}
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<&str> = [
            ("SECRET_KEY", &self.secret_key),
            ("APP_NAME", &self.app_name),
            ("VERSION", &self.version),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect();

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing.join(", ")));
        }

        if self.environment == Environment::Production && self.secret_key == DEFAULT_SECRET_KEY {
            return Err(ConfigError::InsecureSecretKey);
        }

        Ok(())
    }

    /// Maps `LOG_LEVEL` onto a `tracing` filter directive.
    pub fn tracing_level(&self) -> &'static str {
        match self.log_level.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" | "ERROR" => "error",
            "WARNING" | "WARN" => "warn",
            "DEBUG" => "debug",
            "TRACE" => "trace",
            _ => "info",
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
    }
}

fn parse_bool(key: &str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: raw.unwrap_or_default(),
        }),
    }
}
