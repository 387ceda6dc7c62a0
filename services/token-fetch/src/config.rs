//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is resolved from OAUTH_CLIENT_SECRET, then
//! client_secret_file, then an inline client_secret as a last resort.

use common::Secret;
use oauth_auth::Credentials;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use token_manager::ManagerSettings;

/// Env var holding the client secret
pub const CLIENT_SECRET_ENV: &str = "OAUTH_CLIENT_SECRET";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
}

/// Identity of the confidential client
#[derive(Debug, Deserialize)]
pub struct CredentialsConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub scope: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    /// Overrides the endpoint derived from tenant_id
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default, rename = "client_secret")]
    inline_client_secret: Option<String>,
}

/// Cache and exchange tuning
#[derive(Debug, Deserialize)]
pub struct ManagerConfig {
    #[serde(default = "default_token_file")]
    pub token_file_path: PathBuf,
    #[serde(default = "default_refresh_buffer")]
    pub refresh_buffer_seconds: u64,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            token_file_path: default_token_file(),
            refresh_buffer_seconds: default_refresh_buffer(),
            request_timeout_seconds: default_timeout(),
        }
    }
}

fn default_token_file() -> PathBuf {
    PathBuf::from(token_manager::settings::DEFAULT_TOKEN_FILE)
}

fn default_refresh_buffer() -> u64 {
    token_manager::settings::DEFAULT_REFRESH_BUFFER.as_secs()
}

fn default_timeout() -> u64 {
    token_manager::settings::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

impl Config {
    /// Load configuration from a TOML file, then resolve the client secret.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.manager.request_timeout_seconds == 0 {
            return Err(common::Error::Config(
                "request_timeout_seconds must be greater than 0".into(),
            ));
        }

        let inline = config.credentials.inline_client_secret.take();
        let env_secret = std::env::var(CLIENT_SECRET_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty());
        let secret = if let Some(secret) = env_secret {
            Some(secret)
        } else if let Some(ref secret_file) = config.credentials.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            Some(secret.trim().to_owned())
        } else {
            inline
        };
        config.credentials.client_secret = secret
            .filter(|s| !s.trim().is_empty())
            .map(Secret::new);

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("token-fetch.toml")
    }

    /// Validated credentials; fails if any field (including the secret) is empty.
    pub fn credentials(&self) -> oauth_auth::Result<Credentials> {
        let creds = &self.credentials;
        let secret = creds.client_secret.clone().ok_or_else(|| {
            oauth_auth::Error::Config(format!(
                "client_secret must not be empty (set {CLIENT_SECRET_ENV} or client_secret_file)"
            ))
        })?;
        let credentials = Credentials::new(
            creds.tenant_id.clone(),
            creds.client_id.clone(),
            secret,
            creds.scope.clone(),
        )?;
        match &creds.token_endpoint {
            Some(endpoint) => credentials.with_token_endpoint(endpoint.clone()),
            None => Ok(credentials),
        }
    }

    pub fn settings(&self) -> ManagerSettings {
        ManagerSettings {
            refresh_buffer: Duration::from_secs(self.manager.refresh_buffer_seconds),
            request_timeout: Duration::from_secs(self.manager.request_timeout_seconds),
            token_file: self.manager.token_file_path.clone(),
        }
    }
}
