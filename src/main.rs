use std::{path::PathBuf, sync::Arc};

use clap::{
    Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use tracing_subscriber::EnvFilter;

use playlist_migrator::{
    config::{self, Settings},
    error, info, server,
    spotify::SpotifyOAuth,
    success, warning,
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    /// Path to a .env file (defaults to ./.env when present)
    #[clap(long, global = true)]
    env_file: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the API server (default)
    Serve(ServeOptions),

    /// Print a Spotify authorization URL
    AuthUrl(AuthUrlOptions),
}

#[derive(Parser, Debug, Clone, Default)]
pub struct ServeOptions {
    /// Override HOST
    #[clap(long)]
    host: Option<String>,

    /// Override PORT
    #[clap(long)]
    port: Option<u16>,
}

#[derive(Parser, Debug, Clone)]
pub struct AuthUrlOptions {
    /// Use this state instead of a generated one
    #[clap(long)]
    state: Option<String>,

    /// Open the URL in the default browser
    #[clap(long)]
    open: bool,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.tracing_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(settings.debug)
        .init();
}

fn print_banner(settings: &Settings) {
    info!("{}", "=".repeat(50));
    info!("Starting {}", settings.app_name);
    info!("Version: {}", settings.version);
    info!("Environment: {}", settings.environment);
    info!("Debug Mode: {}", settings.debug);
    info!("Host: {}", settings.host);
    info!("Port: {}", settings.port);
    info!("{}", "=".repeat(50));
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match config::load_env(cli.env_file.as_deref()) {
        Ok(true) => {}
        Ok(false) => {
            warning!(".env file not found. Using default settings.");
            warning!("Copy env.example to .env and configure your settings.");
        }
        Err(e) => error!("Cannot load environment. Err: {}", e),
    }

    let mut settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => error!("Configuration error: {}", e),
    };

    init_tracing(&settings);

    match cli.command.unwrap_or(Command::Serve(ServeOptions::default())) {
        Command::Serve(opt) => {
            if let Some(host) = opt.host {
                settings.host = host;
            }
            if let Some(port) = opt.port {
                settings.port = port;
            }

            print_banner(&settings);
            let oauth = Arc::new(SpotifyOAuth::from_settings(&settings));
            if let Err(e) = server::start_api_server(&settings, oauth).await {
                error!("Error starting server: {}", e);
            }
        }
        Command::AuthUrl(opt) => {
            let oauth = SpotifyOAuth::from_settings(&settings);
            if !oauth.is_configured() {
                warning!("SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET are not set");
            }

            let (url, state) = oauth.authorization_url(opt.state.as_deref());
            success!("State: {}", state);
            info!("{}", url);

            if opt.open && webbrowser::open(&url).is_err() {
                warning!(
                    "Failed to open browser. Please navigate to the following URL manually:\n{}",
                    url
                )
            }
        }
    }
}
