//! pubgame - command line front end for the pub game backend.
//!
//! Lets an operator sign in, inspect the session, call API paths directly
//! and watch the realtime feed, all through the session-aware core client.

mod commands;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use pubgame_core::auth::{open_token_store, HistoryNavigator, TokenStore};
use pubgame_core::realtime::{Message, RealtimeConnector};
use pubgame_core::{ApiClient, Config, RequestOptions};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{Command, USAGE};

/// Directory for the optional log file
const LOG_DIR_ENV: &str = "PUBGAME_LOG_DIR";

const LOG_FILE: &str = "pubgame.log";

/// Where one-off API commands start; never the login page, so a rejected
/// session always produces a redirect.
const REQUEST_LOCATION: &str = "/";

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the log file on drop.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load().context("Failed to load configuration")?;
    let store = open_token_store(&config)?;
    debug!(api_base = %config.api_base, "Configuration loaded");

    match command {
        Command::Help => Ok(()),
        Command::Login { email } => login(&mut config, store, email).await,
        Command::Logout => {
            let client = client_at(&config, store, REQUEST_LOCATION)?.0;
            client.logout();
            println!("Logged out.");
            Ok(())
        }
        Command::Status => {
            status(&config, store.as_ref());
            Ok(())
        }
        Command::Request { method, path, body } => {
            let options = RequestOptions {
                method,
                body,
                ..RequestOptions::default()
            };
            request(&config, store, &path, options).await
        }
        Command::Listen { path } => listen(&config, store, &path).await,
    }
}

/// Client whose navigator starts at `location`
fn client_at(
    config: &Config,
    store: Arc<dyn TokenStore>,
    location: &str,
) -> Result<(ApiClient, Arc<HistoryNavigator>)> {
    let navigator = Arc::new(HistoryNavigator::new(location));
    let client = ApiClient::from_config(config, store, navigator.clone())
        .context("Failed to create API client")?;
    Ok((client, navigator))
}

async fn login(config: &mut Config, store: Arc<dyn TokenStore>, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))
        .context("Failed to read password")?;

    let login_path = config.login_path.clone();
    let (client, _) = client_at(config, store, &login_path)?;
    client.login(&email, &password).await?;

    config.last_email = Some(email.clone());
    config.save().context("Failed to save configuration")?;
    info!("Session stored");
    println!("Logged in as {}.", email);
    Ok(())
}

fn status(config: &Config, store: &dyn TokenStore) {
    println!("API base:      {}", config.api_base);
    println!("Realtime base: {}", config.ws_base());
    println!("Token backend: {:?}", config.token_backend);
    println!("Session:       {}", session_summary(store));
}

fn session_summary(store: &dyn TokenStore) -> String {
    if !store.has_session() {
        return "none (run `pubgame login`)".to_string();
    }
    match store.saved_at() {
        Some(saved_at) => format!("active (since {})", saved_at.format("%Y-%m-%d %H:%M UTC")),
        None => "active".to_string(),
    }
}

async fn request(
    config: &Config,
    store: Arc<dyn TokenStore>,
    path: &str,
    options: RequestOptions,
) -> Result<()> {
    let (client, navigator) = client_at(config, store, REQUEST_LOCATION)?;

    match client.execute(path, options).await {
        Ok(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Err(err) => {
            if err.is_unauthorized() && !navigator.history().is_empty() {
                eprintln!("Session expired. Run `pubgame login` to sign in again.");
            }
            let status = err.status().map(|s| s.as_u16().to_string());
            Err(err).with_context(|| match status {
                Some(status) => format!("Request to {} failed with status {}", path, status),
                None => format!("Request to {} failed", path),
            })
        }
    }
}

async fn listen(config: &Config, store: Arc<dyn TokenStore>, path: &str) -> Result<()> {
    let connector = RealtimeConnector::new(&config.ws_base(), store);
    let mut stream = connector.connect(path).await?;
    println!("Connected to {}. Press Ctrl+C to stop.", path);

    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => println!("{}", text),
            Message::Binary(data) => println!("<{} bytes>", data.len()),
            Message::Close(frame) => {
                debug!(?frame, "Realtime channel closed by server");
                break;
            }
            _ => {}
        }
    }

    println!("Connection closed.");
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("No value entered");
    }
    Ok(value)
}
