//! Token endpoint exchange
//!
//! One form-encoded POST per call, for either grant type. The client holds
//! no state between calls and performs no retries; classifying a failure as
//! an invalid grant is left to the caller.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::constants::{GRANT_CLIENT_CREDENTIALS, GRANT_REFRESH_TOKEN};
use crate::credentials::Credentials;
use crate::error::{Error, Result};

/// Which grant the exchange performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantFlow {
    ClientCredentials,
    RefreshToken,
}

impl GrantFlow {
    /// Value of the `grant_type` form field.
    pub fn grant_type(self) -> &'static str {
        match self {
            GrantFlow::ClientCredentials => GRANT_CLIENT_CREDENTIALS,
            GrantFlow::RefreshToken => GRANT_REFRESH_TOKEN,
        }
    }
}

impl fmt::Display for GrantFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.grant_type())
    }
}

/// Decoded token endpoint response.
///
/// `expires_in` is a delta in seconds; some endpoints send it as a numeric
/// string, which is accepted.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

fn deserialize_expires_in<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Seconds(secs)) => Ok(Some(secs)),
        Some(Raw::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Strictly decode a 2xx token endpoint body.
///
/// Non-JSON, a missing `access_token`, or an empty `access_token` all yield
/// `Error::MalformedResponse`.
pub fn decode_token_response(body: &str) -> Result<TokenResponse> {
    let response: TokenResponse = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("invalid token response: {e}")))?;
    if response.access_token.trim().is_empty() {
        return Err(Error::MalformedResponse("access_token is empty".into()));
    }
    Ok(response)
}

/// Boxed future returned by `GrantClient::exchange`.
pub type GrantFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenResponse>> + Send + 'a>>;

/// Performs a single exchange with the token endpoint.
///
/// Uses `Pin<Box<dyn Future>>` so managers can hold `Arc<dyn GrantClient>`
/// and tests can substitute a scripted double.
pub trait GrantClient: Send + Sync {
    /// Exchange credentials (and a refresh token for `RefreshToken`) for a
    /// token response.
    fn exchange<'a>(
        &'a self,
        flow: GrantFlow,
        credentials: &'a Credentials,
        refresh_token: Option<&'a str>,
    ) -> GrantFuture<'a>;
}

/// `GrantClient` backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpGrantClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpGrantClient {
    /// Build a client whose every exchange is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("building HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    /// Reuse an existing reqwest client; `timeout` is applied per request.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn post_grant(
        &self,
        flow: GrantFlow,
        credentials: &Credentials,
        refresh_token: Option<&str>,
    ) -> Result<TokenResponse> {
        let mut form = vec![
            ("grant_type", flow.grant_type()),
            ("client_id", credentials.client_id()),
            ("client_secret", credentials.client_secret().expose().as_str()),
            ("scope", credentials.scope()),
        ];
        if flow == GrantFlow::RefreshToken {
            let refresh = refresh_token.ok_or_else(|| {
                Error::Config("refresh_token grant requires a refresh token".into())
            })?;
            form.push(("refresh_token", refresh));
        }

        debug!(%flow, endpoint = credentials.token_endpoint(), "posting token request");

        let response = self
            .client
            .post(credentials.token_endpoint())
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.network_error(e))?;
        decode_token_response(&body)
    }

    fn network_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Network(format!(
                "token request timed out after {}s",
                self.timeout.as_secs_f64()
            ))
        } else {
            Error::Network(format!("token request failed: {err}"))
        }
    }
}

impl GrantClient for HttpGrantClient {
    fn exchange<'a>(
        &'a self,
        flow: GrantFlow,
        credentials: &'a Credentials,
        refresh_token: Option<&'a str>,
    ) -> GrantFuture<'a> {
        Box::pin(self.post_grant(flow, credentials, refresh_token))
    }
}
