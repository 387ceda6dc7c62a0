//! token-fetch
//!
//! Embedding application for the token manager:
//! 1. Loads credentials and manager settings from TOML (+ env secret)
//! 2. Reuses the persisted token if it is still usable
//! 3. Otherwise acquires/refreshes one via the identity provider
//! 4. Prints the `Authorization` header value on stdout
//!
//! Logs are JSON on stderr so stdout can be captured by scripts.

mod config;

use anyhow::{Context, Result};
use token_manager::TokenManager;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let credentials = config
        .credentials()
        .context("invalid credential configuration")?;
    let settings = config.settings();

    info!(
        client_id = credentials.client_id(),
        token_endpoint = credentials.token_endpoint(),
        token_file = %settings.token_file.display(),
        refresh_buffer_secs = settings.refresh_buffer.as_secs(),
        "configuration loaded"
    );

    let manager = TokenManager::with_http_client(credentials, settings)
        .await
        .context("failed to build token manager")?;

    let header = manager
        .authorization_header()
        .await
        .context("failed to obtain access token")?;

    if let Some(record) = manager.snapshot().await {
        info!(
            expires_at = record.expires_at(),
            has_refresh_token = record.refresh_token().is_some(),
            "access token ready"
        );
    }

    println!("{header}");
    Ok(())
}
