//! Playlist Migrator API Library
//!
//! This library provides the web API scaffold for migrating playlists between
//! streaming services. Today it covers the Spotify side of the story: the OAuth
//! authorization-code handshake, authenticated profile and playlist reads, and
//! the HTTP surface (health, auth routes, middleware) that exposes them.
//!
//! # Modules
//!
//! - `api` - HTTP handlers for health, auth and Spotify read endpoints
//! - `config` - Settings loaded from the environment and `.env` files
//! - `error` - Error types and the JSON error envelope
//! - `management` - Caller-side token lifecycle tracking
//! - `middleware` - Request logging, security headers and CORS
//! - `server` - Router assembly and the HTTP listener
//! - `spotify` - Spotify OAuth client implementation
//! - `types` - Data structures and response models
//! - `utils` - Utility functions and helpers
//!
//! # Example
//!
//! ```ignore
//! use playlist_migrator::{config::Settings, spotify::SpotifyOAuth};
//!
//! let settings = Settings::from_env()?;
//! let oauth = SpotifyOAuth::from_settings(&settings);
//! let request = oauth.begin_authorization().await;
//! println!("{}", request.url);
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod management;
pub mod middleware;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

/// A convenient Result type alias for operations that may fail.
///
/// Used at the outer edges of the application (binary entry point, server
/// startup) where any error simply needs to be reported. Library code uses the
/// typed errors from [`error`].
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// Used for console status lines of the binary, such as the startup banner.
/// Structured runtime logging goes through `tracing` instead.
///
/// # Example
///
/// ```ignore
/// info!("Listening on {}", addr);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only for fatal startup errors (invalid configuration, unbindable address).
/// Code after this macro does not run.
///
/// # Example
///
/// ```ignore
/// error!("Configuration error: {}", e);
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
